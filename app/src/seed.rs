// app/src/seed.rs

//! The starter catalog written to an empty database when `SEED_DB` is set.

use crate::errors::Result;
use rust_decimal::Decimal;
use storefront::boundary::{NewCategoryRow, NewProductRow};
use storefront::catalog::default_categories;
use storefront::gateway::PersistenceGateway;
use storefront::StoreError;
use tracing::{info, instrument, warn};

struct SampleProduct {
  name: &'static str,
  description: &'static str,
  price: Decimal,
  sku: &'static str,
  stock: i64,
  category: &'static str,
  image_url: &'static str,
  rating: Decimal,
}

const SAMPLE_PRODUCTS: [SampleProduct; 6] = [
  SampleProduct {
    name: "ProGrade 20V Cordless Hammer Drill",
    description: "High-performance brushless motor delivers up to 2,000 RPM. Includes two 5.0Ah batteries and charger.",
    price: Decimal::from_parts(15999, 0, 0, false, 0),
    sku: "DRL-20V-PRO",
    stock: 45,
    category: "Drills",
    image_url: "https://images.unsplash.com/photo-1504148455328-c376907d081c?auto=format&fit=crop&q=80&w=800",
    rating: Decimal::from_parts(48, 0, 0, false, 1),
  },
  SampleProduct {
    name: "Heavy Duty Circular Saw 7-1/4\"",
    description: "15 Amp motor delivers power for even the toughest cuts. Lightweight magnesium shoe.",
    price: Decimal::from_parts(10999, 0, 0, false, 0),
    sku: "SAW-CIRC-714",
    stock: 12,
    category: "Saws",
    image_url: "https://images.unsplash.com/photo-1572981779307-38b8cabb2407?auto=format&fit=crop&q=80&w=800",
    rating: Decimal::from_parts(46, 0, 0, false, 1),
  },
  SampleProduct {
    name: "Compact Angle Grinder 4-1/2\"",
    description: "11 Amp AC/DC 11,000 RPM motor designed for faster material removal and higher overload protection.",
    price: Decimal::from_parts(6799, 0, 0, false, 0),
    sku: "GRD-AG-450",
    stock: 30,
    category: "Grinders",
    image_url: "https://images.unsplash.com/photo-1581147036324-c17ac41d1685?auto=format&fit=crop&q=80&w=800",
    rating: Decimal::from_parts(45, 0, 0, false, 1),
  },
  SampleProduct {
    name: "Industrial Wet/Dry Shop Vacuum",
    description: "12 Gallon 5.0 Peak HP. Stainless steel drum construction with easy-to-clean filter.",
    price: Decimal::from_parts(8499, 0, 0, false, 0),
    sku: "VAC-WD-12G",
    stock: 8,
    category: "Vacuums",
    image_url: "https://images.unsplash.com/photo-1558317374-a35498f3ffa7?auto=format&fit=crop&q=80&w=800",
    rating: Decimal::from_parts(42, 0, 0, false, 1),
  },
  SampleProduct {
    name: "Precision Laser Level Kit",
    description: "Self-leveling cross-line laser with clamp and carrying case. Visibility up to 50ft.",
    price: Decimal::from_parts(12999, 0, 0, false, 0),
    sku: "LVL-LSR-KIT",
    stock: 15,
    category: "Measuring",
    image_url: "https://images.unsplash.com/photo-1566932769119-7a1fb6d7ce23?auto=format&fit=crop&q=80&w=800",
    rating: Decimal::from_parts(49, 0, 0, false, 1),
  },
  SampleProduct {
    name: "254-Piece Mechanics Tool Set",
    description: "Chrome vanadium steel construction. Includes ratchets, sockets, wrenches, and hex keys.",
    price: Decimal::from_parts(16999, 0, 0, false, 0),
    sku: "SET-MECH-254",
    stock: 5,
    category: "Hand Tools",
    image_url: "https://images.unsplash.com/photo-1616423640778-2cfd9b932e4d?auto=format&fit=crop&q=80&w=800",
    rating: Decimal::from_parts(47, 0, 0, false, 1),
  },
];

/// Seeds categories and products. A table that already has rows is left alone.
#[instrument(name = "seed_catalog", skip(db), err(Display))]
pub async fn seed_catalog(db: &dyn PersistenceGateway) -> Result<()> {
  let existing = db.list_categories().await.map_err(|e| StoreError::classify("categories", e))?;
  if existing.is_empty() {
    for category in default_categories() {
      if let Err(e) = db.insert_category(NewCategoryRow { name: category.name.clone() }).await {
        warn!(category = %category.name, error = %e, "Skipping category seed.");
      }
    }
  }

  let products = db.list_products().await.map_err(|e| StoreError::classify("products", e))?;
  if !products.is_empty() {
    info!(count = products.len(), "Catalog already populated, skipping product seed.");
    return Ok(());
  }

  for sample in &SAMPLE_PRODUCTS {
    let row = NewProductRow {
      name: sample.name.to_string(),
      description: sample.description.to_string(),
      price: sample.price,
      currency: "INR".to_string(),
      sku: sample.sku.to_string(),
      stock: sample.stock,
      category: sample.category.to_string(),
      image_url: sample.image_url.to_string(),
      rating: sample.rating,
    };
    db.insert_product(row)
      .await
      .map_err(|e| StoreError::classify("products", e))?;
  }
  info!(count = SAMPLE_PRODUCTS.len(), "Sample catalog seeded.");
  Ok(())
}
