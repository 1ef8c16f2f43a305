// core/src/cart.rs

//! The shopper's cart. Every mutation is mirrored to the local cache so the
//! cart survives a restart.

use crate::cache::{CacheStore, Cached, CART_CACHE_KEY};
use crate::model::{CartItem, Money, Product};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

pub struct CartStore {
  cache: Cached<Vec<CartItem>>,
  items: RwLock<Vec<CartItem>>,
}

impl CartStore {
  /// An empty cart that persists to `cache`.
  pub fn new(cache: Arc<dyn CacheStore>) -> Self {
    Self {
      cache: Cached::new(cache, CART_CACHE_KEY),
      items: RwLock::new(Vec::new()),
    }
  }

  /// A cart rehydrated from `cache`. A corrupt entry yields an empty cart.
  pub fn restore(cache: Arc<dyn CacheStore>) -> Self {
    let store = Self::new(cache);
    if let Some(mut items) = store.cache.load() {
      items.retain(|item: &CartItem| item.quantity >= 1);
      debug!(lines = items.len(), "Cart restored from cache.");
      *store.items.write() = items;
    }
    store
  }

  /// Applies `f` to the lines, then persists the result.
  fn mutate(&self, f: impl FnOnce(&mut Vec<CartItem>)) {
    let snapshot = {
      let mut items = self.items.write();
      f(&mut *items);
      items.clone()
    };
    self.cache.save_or_warn(&snapshot);
  }

  /// Adds `qty` of `product`, merging into an existing line for the same product.
  pub fn add_to_cart(&self, product: &Product, qty: u32) {
    let qty = qty.max(1);
    self.mutate(|items| match items.iter_mut().find(|i| i.product.id == product.id) {
      Some(line) => line.quantity = line.quantity.saturating_add(qty),
      None => items.push(CartItem {
        product: product.clone(),
        quantity: qty,
      }),
    });
  }

  /// Sets the quantity of a line. Values below 1 are raised to 1; use `remove_from_cart` to drop a line.
  pub fn update_quantity(&self, product_id: &str, qty: u32) {
    self.mutate(|items| {
      if let Some(line) = items.iter_mut().find(|i| i.product.id == product_id) {
        line.quantity = qty.max(1);
      }
    });
  }

  pub fn increment(&self, product_id: &str) {
    if let Some(current) = self.quantity_of(product_id) {
      self.update_quantity(product_id, current.saturating_add(1));
    }
  }

  /// Never removes the line.
  pub fn decrement(&self, product_id: &str) {
    if let Some(current) = self.quantity_of(product_id) {
      self.update_quantity(product_id, current.saturating_sub(1));
    }
  }

  pub fn remove_from_cart(&self, product_id: &str) {
    self.mutate(|items| items.retain(|i| i.product.id != product_id));
  }

  pub fn clear_cart(&self) {
    self.mutate(Vec::clear);
  }

  pub fn items(&self) -> Vec<CartItem> {
    self.items.read().clone()
  }

  pub fn quantity_of(&self, product_id: &str) -> Option<u32> {
    self
      .items
      .read()
      .iter()
      .find(|i| i.product.id == product_id)
      .map(|i| i.quantity)
  }

  /// Recomputed from the lines on every call.
  pub fn total(&self) -> Money {
    self.items.read().iter().map(CartItem::line_total).sum()
  }

  /// Total units across all lines.
  pub fn item_count(&self) -> u32 {
    self.items.read().iter().map(|i| i.quantity).fold(0u32, u32::saturating_add)
  }

  pub fn is_empty(&self) -> bool {
    self.items.read().is_empty()
  }
}
