// core/src/model/cart_item.rs

use super::{Money, Product};
use serde::{Deserialize, Serialize};

/// A product snapshot plus how many of it the shopper wants. Quantity is at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
  pub product: Product,
  pub quantity: u32,
}

impl CartItem {
  pub fn line_total(&self) -> Money {
    self.product.price.times(self.quantity)
  }
}
