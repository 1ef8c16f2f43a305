// core/src/model/product.rs

use super::Money;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
  pub id: String,
  pub name: String,
  pub description: String,
  pub price: Money,
  pub currency: String,
  pub sku: String,
  /// Informational only; checkout never decrements it.
  pub stock: u32,
  pub category: String,
  pub image_url: String,
  pub rating: f32,
  pub created_at: Option<DateTime<Utc>>,
}

/// Categories are referenced from products by name, not id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
  pub id: String,
  pub name: String,
}

impl Category {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
    }
  }
}

/// A new product as entered by an admin, before the backend assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductDraft {
  pub name: String,
  pub description: String,
  pub price: Money,
  pub currency: String,
  pub sku: String,
  pub stock: u32,
  pub category: String,
  pub image_url: String,
}

impl ProductDraft {
  pub fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(StoreError::Validation("Product name is required".to_string()));
    }
    if self.price.is_negative() {
      return Err(StoreError::Validation("Price cannot be negative".to_string()));
    }
    Ok(())
  }
}

/// A partial product update. `None` leaves the field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
  pub name: Option<String>,
  pub description: Option<String>,
  pub price: Option<Money>,
  pub currency: Option<String>,
  pub sku: Option<String>,
  pub stock: Option<u32>,
  pub category: Option<String>,
  pub image_url: Option<String>,
}

impl ProductPatch {
  pub fn validate(&self) -> Result<()> {
    if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
      return Err(StoreError::Validation("Product name is required".to_string()));
    }
    if self.price.is_some_and(Money::is_negative) {
      return Err(StoreError::Validation("Price cannot be negative".to_string()));
    }
    Ok(())
  }

  pub fn is_empty(&self) -> bool {
    *self == ProductPatch::default()
  }
}
