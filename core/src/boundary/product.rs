// core/src/boundary/product.rs

use crate::model::{Category, Money, Product, ProductDraft, ProductPatch};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub price: Decimal,
  #[serde(default)]
  pub currency: Option<String>,
  #[serde(default)]
  pub sku: Option<String>,
  #[serde(default)]
  pub stock: i64,
  #[serde(default)]
  pub category: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub rating: Option<Decimal>,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
  fn from(row: ProductRow) -> Self {
    Product {
      id: row.id,
      name: row.name,
      description: row.description.unwrap_or_default(),
      price: Money::from_decimal(row.price),
      currency: row.currency.unwrap_or_else(|| "INR".to_string()),
      sku: row.sku.unwrap_or_default(),
      stock: u32::try_from(row.stock.max(0)).unwrap_or(u32::MAX),
      category: row.category.unwrap_or_default(),
      image_url: row.image_url.unwrap_or_default(),
      rating: row
        .rating
        .and_then(|rating| rating.to_f32())
        .unwrap_or(0.0)
        .clamp(0.0, 5.0),
      created_at: row.created_at,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProductRow {
  pub name: String,
  pub description: String,
  pub price: Decimal,
  pub currency: String,
  pub sku: String,
  pub stock: i64,
  pub category: String,
  pub image_url: String,
  pub rating: Decimal,
}

impl NewProductRow {
  /// Rating every new product starts with.
  pub const INITIAL_RATING: Decimal = Decimal::from_parts(5, 0, 0, false, 0);
}

impl From<&ProductDraft> for NewProductRow {
  fn from(draft: &ProductDraft) -> Self {
    NewProductRow {
      name: draft.name.trim().to_string(),
      description: draft.description.clone(),
      price: draft.price.to_decimal(),
      currency: draft.currency.clone(),
      sku: draft.sku.clone(),
      stock: i64::from(draft.stock),
      category: draft.category.clone(),
      image_url: draft.image_url.clone(),
      rating: Self::INITIAL_RATING,
    }
  }
}

/// Only the columns that are `Some` get written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatchRow {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub price: Option<Decimal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub currency: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub sku: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub stock: Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub category: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image_url: Option<String>,
}

impl From<&ProductPatch> for ProductPatchRow {
  fn from(patch: &ProductPatch) -> Self {
    ProductPatchRow {
      name: patch.name.as_ref().map(|n| n.trim().to_string()),
      description: patch.description.clone(),
      price: patch.price.map(Money::to_decimal),
      currency: patch.currency.clone(),
      sku: patch.sku.clone(),
      stock: patch.stock.map(i64::from),
      category: patch.category.clone(),
      image_url: patch.image_url.clone(),
    }
  }
}

impl ProductPatchRow {
  /// Applies the patch to an existing row in place.
  pub fn apply_to(&self, row: &mut ProductRow) {
    if let Some(name) = &self.name {
      row.name = name.clone();
    }
    if let Some(description) = &self.description {
      row.description = Some(description.clone());
    }
    if let Some(price) = self.price {
      row.price = price;
    }
    if let Some(currency) = &self.currency {
      row.currency = Some(currency.clone());
    }
    if let Some(sku) = &self.sku {
      row.sku = Some(sku.clone());
    }
    if let Some(stock) = self.stock {
      row.stock = stock;
    }
    if let Some(category) = &self.category {
      row.category = Some(category.clone());
    }
    if let Some(image_url) = &self.image_url {
      row.image_url = Some(image_url.clone());
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRow {
  pub id: String,
  pub name: String,
}

impl From<CategoryRow> for Category {
  fn from(row: CategoryRow) -> Self {
    Category::new(row.id, row.name)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategoryRow {
  pub name: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn product_row_fills_missing_columns() {
    let row: ProductRow = serde_json::from_value(serde_json::json!({
      "id": "7",
      "name": "Impact Driver",
      "price": "7499.505",
      "stock": -3,
      "rating": 9.0
    }))
    .unwrap();
    let product = Product::from(row);
    assert_eq!(product.price.minor(), 749_951);
    assert_eq!(product.stock, 0);
    assert_eq!(product.rating, 5.0);
    assert_eq!(product.currency, "INR");
    assert!(product.description.is_empty());
  }

  #[test]
  fn patch_row_serializes_only_set_columns() {
    let patch = ProductPatch {
      stock: Some(4),
      ..Default::default()
    };
    let json = serde_json::to_value(ProductPatchRow::from(&patch)).unwrap();
    assert_eq!(json, serde_json::json!({ "stock": 4 }));
  }
}
