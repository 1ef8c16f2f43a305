// core/src/gateway/memory.rs

//! An in-process persistence backend. Used by the test suite and by the
//! binary when no database is configured. Faults can be injected to drive
//! the error paths the stores must handle.

use super::{ChangeEvent, ChangeKind, GatewayResult, PersistenceGateway};
use crate::boundary::{
  CategoryRow, NewCategoryRow, NewProductRow, OrderItemRow, OrderRow, OrderStatusPatchRow, ProductPatchRow,
  ProductRow, ProfileRow,
};
use crate::error::{GatewayError, FOREIGN_KEY_VIOLATION, UNDEFINED_TABLE};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, instrument};
use uuid::Uuid;

const UNIQUE_VIOLATION: &str = "23505";

/// Failures the memory backend should simulate.
#[derive(Debug, Clone, Default)]
pub struct MemoryFaults {
  pub products_error: Option<GatewayError>,
  pub categories_error: Option<GatewayError>,
  pub order_items_error: Option<GatewayError>,
  pub order_update_error: Option<GatewayError>,
  pub profile_error: Option<GatewayError>,
  /// Fails product and category listings only; writes still go through.
  pub listing_error: Option<GatewayError>,
  /// Added before every profile lookup returns.
  pub profile_delay: Option<Duration>,
  /// Deletes match no rows, as a row-level security policy would do for non-admins.
  pub deny_deletes: bool,
}

impl MemoryFaults {
  pub fn table_missing(table: &str) -> GatewayError {
    GatewayError::new(
      Some(UNDEFINED_TABLE),
      format!("relation \"public.{}\" does not exist", table),
    )
  }
}

#[derive(Debug, Default)]
struct Tables {
  products: Vec<ProductRow>,
  categories: Vec<CategoryRow>,
  orders: Vec<OrderRow>,
  order_items: Vec<OrderItemRow>,
  profiles: HashMap<String, ProfileRow>,
  objects: HashMap<(String, String), Vec<u8>>,
}

pub struct MemoryBackend {
  tables: RwLock<Tables>,
  faults: RwLock<MemoryFaults>,
  orders_feed: broadcast::Sender<ChangeEvent>,
  public_url_base: String,
}

impl Default for MemoryBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryBackend {
  pub fn new() -> Self {
    let (orders_feed, _) = broadcast::channel(64);
    Self {
      tables: RwLock::new(Tables::default()),
      faults: RwLock::new(MemoryFaults::default()),
      orders_feed,
      public_url_base: "memory://storage".to_string(),
    }
  }

  pub fn with_products(self, products: Vec<ProductRow>) -> Self {
    self.tables.write().products = products;
    self
  }

  pub fn with_categories(self, categories: Vec<CategoryRow>) -> Self {
    self.tables.write().categories = categories;
    self
  }

  pub fn set_faults(&self, faults: MemoryFaults) {
    *self.faults.write() = faults;
  }

  pub fn update_faults(&self, f: impl FnOnce(&mut MemoryFaults)) {
    f(&mut *self.faults.write());
  }

  pub fn put_profile(&self, row: ProfileRow) {
    self.tables.write().profiles.insert(row.id.clone(), row);
  }

  pub fn order_item_rows(&self) -> Vec<OrderItemRow> {
    self.tables.read().order_items.clone()
  }

  pub fn order_count(&self) -> usize {
    self.tables.read().orders.len()
  }

  pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
    self
      .tables
      .read()
      .objects
      .get(&(bucket.to_string(), path.to_string()))
      .cloned()
  }

  fn fault(&self, pick: impl FnOnce(&MemoryFaults) -> Option<GatewayError>) -> GatewayResult<()> {
    match pick(&self.faults.read()) {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }

  fn notify_orders(&self, kind: ChangeKind) {
    // No receivers is fine.
    let _ = self.orders_feed.send(ChangeEvent {
      table: "orders".to_string(),
      kind,
    });
  }
}

#[async_trait]
impl PersistenceGateway for MemoryBackend {
  async fn list_products(&self) -> GatewayResult<Vec<ProductRow>> {
    self.fault(|f| f.products_error.clone().or_else(|| f.listing_error.clone()))?;
    let mut rows = self.tables.read().products.clone();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
  }

  #[instrument(skip(self, row), fields(name = %row.name), err(Display))]
  async fn insert_product(&self, row: NewProductRow) -> GatewayResult<()> {
    self.fault(|f| f.products_error.clone())?;
    let stored = ProductRow {
      id: Uuid::new_v4().to_string(),
      name: row.name,
      description: Some(row.description),
      price: row.price,
      currency: Some(row.currency),
      sku: Some(row.sku),
      stock: row.stock,
      category: Some(row.category),
      image_url: Some(row.image_url),
      rating: Some(row.rating),
      created_at: Some(Utc::now()),
    };
    self.tables.write().products.push(stored);
    Ok(())
  }

  async fn update_product(&self, id: &str, patch: ProductPatchRow) -> GatewayResult<()> {
    self.fault(|f| f.products_error.clone())?;
    let mut tables = self.tables.write();
    if let Some(row) = tables.products.iter_mut().find(|p| p.id == id) {
      patch.apply_to(row);
    }
    Ok(())
  }

  async fn delete_product(&self, id: &str) -> GatewayResult<Vec<ProductRow>> {
    self.fault(|f| f.products_error.clone())?;
    if self.faults.read().deny_deletes {
      return Ok(Vec::new());
    }

    let mut tables = self.tables.write();
    // order_items.product_id is ON DELETE RESTRICT.
    if tables.order_items.iter().any(|i| i.product_id.as_deref() == Some(id)) {
      return Err(GatewayError::new(
        Some(FOREIGN_KEY_VIOLATION),
        "update or delete on table \"products\" violates foreign key constraint \"order_items_product_id_fkey\"",
      ));
    }
    let (deleted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut tables.products)
      .into_iter()
      .partition(|p| p.id == id);
    tables.products = kept;
    Ok(deleted)
  }

  async fn list_categories(&self) -> GatewayResult<Vec<CategoryRow>> {
    self.fault(|f| f.categories_error.clone().or_else(|| f.listing_error.clone()))?;
    let mut rows = self.tables.read().categories.clone();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
  }

  async fn insert_category(&self, row: NewCategoryRow) -> GatewayResult<()> {
    self.fault(|f| f.categories_error.clone())?;
    let mut tables = self.tables.write();
    if tables.categories.iter().any(|c| c.name == row.name) {
      return Err(GatewayError::new(
        Some(UNIQUE_VIOLATION),
        format!("duplicate key value violates unique constraint \"categories_name_key\" ({})", row.name),
      ));
    }
    tables.categories.push(CategoryRow {
      id: Uuid::new_v4().to_string(),
      name: row.name,
    });
    Ok(())
  }

  async fn delete_category(&self, id: &str) -> GatewayResult<Vec<CategoryRow>> {
    self.fault(|f| f.categories_error.clone())?;
    if self.faults.read().deny_deletes {
      return Ok(Vec::new());
    }
    let mut tables = self.tables.write();
    let (deleted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut tables.categories)
      .into_iter()
      .partition(|c| c.id == id);
    tables.categories = kept;
    Ok(deleted)
  }

  async fn list_orders(&self) -> GatewayResult<Vec<OrderRow>> {
    let tables = self.tables.read();
    let image_for = |product_id: &Option<String>| {
      product_id.as_ref().and_then(|pid| {
        tables
          .products
          .iter()
          .find(|p| &p.id == pid)
          .and_then(|p| p.image_url.clone())
      })
    };

    let mut rows: Vec<OrderRow> = tables
      .orders
      .iter()
      .map(|order| {
        let mut row = order.clone();
        row.items = tables
          .order_items
          .iter()
          .filter(|item| item.order_id == order.id)
          .map(|item| OrderItemRow {
            image_url: image_for(&item.product_id),
            ..item.clone()
          })
          .collect();
        row
      })
      .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
  }

  #[instrument(skip(self, row), fields(order_number = %row.order_number), err(Display))]
  async fn insert_order(&self, row: OrderRow) -> GatewayResult<()> {
    {
      let mut tables = self.tables.write();
      if tables
        .orders
        .iter()
        .any(|o| o.id == row.id || o.order_number == row.order_number)
      {
        return Err(GatewayError::new(
          Some(UNIQUE_VIOLATION),
          "duplicate key value violates unique constraint \"orders_order_number_key\"",
        ));
      }
      tables.orders.push(OrderRow { items: Vec::new(), ..row });
    } // guard dropped
    debug!("Order header stored.");
    self.notify_orders(ChangeKind::Insert);
    Ok(())
  }

  async fn insert_order_items(&self, rows: Vec<OrderItemRow>) -> GatewayResult<()> {
    self.fault(|f| f.order_items_error.clone())?;
    let mut tables = self.tables.write();
    if let Some(orphan) = rows.iter().find(|r| !tables.orders.iter().any(|o| o.id == r.order_id)) {
      return Err(GatewayError::new(
        Some(FOREIGN_KEY_VIOLATION),
        format!("order_items.order_id {} has no matching order", orphan.order_id),
      ));
    }
    tables.order_items.extend(rows);
    Ok(())
  }

  async fn update_order(&self, id: Uuid, patch: OrderStatusPatchRow) -> GatewayResult<()> {
    self.fault(|f| f.order_update_error.clone())?;
    let updated = {
      let mut tables = self.tables.write();
      match tables.orders.iter_mut().find(|o| o.id == id) {
        Some(order) => {
          order.status = patch.status;
          if patch.tracking_number.is_some() {
            order.tracking_number = patch.tracking_number;
          }
          if patch.courier_name.is_some() {
            order.courier_name = patch.courier_name;
          }
          true
        }
        None => false,
      }
    };
    if updated {
      self.notify_orders(ChangeKind::Update);
    }
    Ok(())
  }

  async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<ProfileRow>> {
    let delay = self.faults.read().profile_delay;
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }
    self.fault(|f| f.profile_error.clone())?;
    Ok(self.tables.read().profiles.get(user_id).cloned())
  }

  async fn upload_object(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> GatewayResult<String> {
    self
      .tables
      .write()
      .objects
      .insert((bucket.to_string(), path.to_string()), bytes);
    Ok(format!("{}/{}/{}", self.public_url_base, bucket, path))
  }

  fn subscribe_orders(&self) -> broadcast::Receiver<ChangeEvent> {
    self.orders_feed.subscribe()
  }
}
