// core/src/admin.rs

//! Admin-only operations: order fulfilment, inventory editing and the
//! dashboard figures. Every action checks the session's role first.

use crate::catalog::{CatalogStore, LOW_STOCK_THRESHOLD};
use crate::error::{Result, StoreError};
use crate::model::{Money, Order, OrderStatus, ProductDraft, ProductPatch, Transition};
use crate::orders::OrderBook;
use crate::session::SessionManager;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const COURIERS: [&str; 4] = ["FedEx", "BlueDart", "Delhivery", "DTDC"];
pub const DEFAULT_COURIER: &str = COURIERS[0];
pub const DEFAULT_PRODUCT_CATEGORY: &str = "Spare Parts";

/// Turns a failed product deletion into the alert text an admin sees.
pub fn delete_failure_message(err: &StoreError) -> String {
  match err {
    StoreError::ReferencedByOrders => "Cannot delete: Product is part of an existing order history.".to_string(),
    StoreError::PermissionDenied(_) => "Failed to delete: Permission denied.".to_string(),
    other => format!("Failed to delete: {}", other.user_message()),
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DashboardStats {
  pub total_revenue: Money,
  pub total_orders: usize,
  /// Paid orders waiting to ship.
  pub pending_shipments: usize,
  pub low_stock_items: usize,
}

impl DashboardStats {
  pub fn compute(orders: &[Order], products: &[crate::model::Product]) -> Self {
    DashboardStats {
      total_revenue: orders.iter().map(|o| o.total_amount).sum(),
      total_orders: orders.len(),
      pending_shipments: orders.iter().filter(|o| o.status == OrderStatus::Paid).count(),
      low_stock_items: products.iter().filter(|p| p.stock < LOW_STOCK_THRESHOLD).count(),
    }
  }
}

/// The inventory form as typed. Blank fields take defaults when converted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductForm {
  pub name: String,
  pub description: String,
  pub price: Option<Money>,
  pub currency: String,
  pub sku: String,
  pub stock: u32,
  pub category: String,
  pub image_url: String,
}

impl ProductForm {
  pub fn into_draft(self) -> Result<ProductDraft> {
    let price = match self.price {
      Some(price) if price != Money::ZERO => price,
      _ => return Err(StoreError::Validation("Name and Price are required".to_string())),
    };
    if self.name.trim().is_empty() {
      return Err(StoreError::Validation("Name and Price are required".to_string()));
    }
    let or_default = |value: String, default: String| {
      if value.trim().is_empty() {
        default
      } else {
        value.trim().to_string()
      }
    };
    let draft = ProductDraft {
      name: self.name.trim().to_string(),
      description: self.description,
      price,
      currency: or_default(self.currency, "INR".to_string()),
      sku: or_default(self.sku, format!("SKU-{}", Utc::now().timestamp_millis())),
      stock: self.stock,
      category: or_default(self.category, DEFAULT_PRODUCT_CATEGORY.to_string()),
      image_url: self.image_url,
    };
    draft.validate()?;
    Ok(draft)
  }

  /// Prefills the form from an existing product for editing.
  pub fn from_product(product: &crate::model::Product) -> Self {
    ProductForm {
      name: product.name.clone(),
      description: product.description.clone(),
      price: Some(product.price),
      currency: product.currency.clone(),
      sku: product.sku.clone(),
      stock: product.stock,
      category: product.category.clone(),
      image_url: product.image_url.clone(),
    }
  }

  /// Every field of the form as a full update.
  pub fn into_patch(self) -> Result<ProductPatch> {
    let draft = self.into_draft()?;
    Ok(ProductPatch {
      name: Some(draft.name),
      description: Some(draft.description),
      price: Some(draft.price),
      currency: Some(draft.currency),
      sku: Some(draft.sku),
      stock: Some(draft.stock),
      category: Some(draft.category),
      image_url: Some(draft.image_url),
    })
  }
}

/// Flips a "show troubleshooting" flag when an admin auth check runs longer
/// than the hint delay. The check itself is never cancelled.
pub struct AdminAuthWatch {
  slow: Arc<AtomicBool>,
  timer: JoinHandle<()>,
}

impl AdminAuthWatch {
  pub fn start(hint_after: Duration) -> Self {
    let slow = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&slow);
    let timer = tokio::spawn(async move {
      tokio::time::sleep(hint_after).await;
      flag.store(true, Ordering::SeqCst);
      warn!(after_ms = hint_after.as_millis() as u64, "Admin auth check is slow; showing troubleshooting hint.");
    });
    Self { slow, timer }
  }

  pub fn troubleshoot_visible(&self) -> bool {
    self.slow.load(Ordering::SeqCst)
  }

  /// The check resolved; stop the timer.
  pub fn finish(self) -> bool {
    self.timer.abort();
    self.troubleshoot_visible()
  }
}

pub struct AdminConsole {
  session: Arc<SessionManager>,
  orders: Arc<OrderBook>,
  catalog: Arc<CatalogStore>,
}

impl AdminConsole {
  pub fn new(session: Arc<SessionManager>, orders: Arc<OrderBook>, catalog: Arc<CatalogStore>) -> Self {
    Self {
      session,
      orders,
      catalog,
    }
  }

  fn require_admin(&self) -> Result<()> {
    if self.session.is_admin() {
      Ok(())
    } else {
      Err(StoreError::Auth(crate::session::ADMIN_ONLY_MESSAGE.to_string()))
    }
  }

  fn order(&self, order_id: Uuid) -> Result<Order> {
    self
      .orders
      .get_order_by_id(order_id)
      .ok_or_else(|| StoreError::NotFound(format!("order {}", order_id)))
  }

  pub fn search_orders(&self, term: &str) -> Result<Vec<Order>> {
    self.require_admin()?;
    Ok(self.orders.search(term))
  }

  pub fn dashboard_stats(&self) -> Result<DashboardStats> {
    self.require_admin()?;
    Ok(DashboardStats::compute(&self.orders.orders(), &self.catalog.products()))
  }

  /// PAID -> SHIPPED with tracking details.
  #[instrument(skip(self), err(Display))]
  pub async fn ship_order(&self, order_id: Uuid, tracking_number: &str, courier: Option<&str>) -> Result<()> {
    self.require_admin()?;
    let tracking_number = tracking_number.trim();
    if tracking_number.is_empty() {
      return Err(StoreError::Validation("Please enter a tracking number".to_string()));
    }
    let courier = courier.map(str::trim).filter(|c| !c.is_empty()).unwrap_or(DEFAULT_COURIER);
    let courier = COURIERS
      .iter()
      .copied()
      .find(|known| known.eq_ignore_ascii_case(courier))
      .ok_or_else(|| StoreError::Validation(format!("Unknown courier '{}'", courier)))?;

    let order = self.order(order_id)?;
    if order.status != OrderStatus::Paid {
      return Err(StoreError::Validation(format!(
        "Order {} is {} and cannot be shipped",
        order.order_number, order.status
      )));
    }

    self
      .orders
      .update_order_status(order_id, OrderStatus::Shipped, Some(tracking_number), Some(courier))
      .await?;
    info!(order_number = %order.order_number, %courier, "Order shipped.");
    Ok(())
  }

  /// SHIPPED -> DELIVERED.
  #[instrument(skip(self), err(Display))]
  pub async fn complete_order(&self, order_id: Uuid) -> Result<()> {
    self.require_admin()?;
    let order = self.order(order_id)?;
    if order.status.transition(OrderStatus::Delivered) != Transition::Allowed {
      return Err(StoreError::Validation(format!(
        "Order {} is {} and cannot be marked delivered",
        order.order_number, order.status
      )));
    }
    self
      .orders
      .update_order_status(order_id, OrderStatus::Delivered, None, None)
      .await
  }

  /// Creates a product, or updates `editing` when set.
  pub async fn save_product(&self, form: ProductForm, editing: Option<&str>) -> Result<()> {
    self.require_admin()?;
    match editing {
      Some(id) => self.catalog.update_product(id, &form.into_patch()?).await,
      None => self.catalog.add_product(&form.into_draft()?).await,
    }
  }

  /// Deletes a product. `delete_failure_message` turns a failure into the alert text.
  pub async fn delete_product(&self, id: &str) -> Result<()> {
    self.require_admin()?;
    self.catalog.delete_product(id).await
  }

  pub async fn add_category(&self, name: &str) -> Result<()> {
    self.require_admin()?;
    self.catalog.add_category(name).await
  }

  pub async fn delete_category(&self, id: &str) -> Result<()> {
    self.require_admin()?;
    self.catalog.delete_category(id).await
  }

  pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
    self.require_admin()?;
    self.catalog.upload_image(file_name, bytes).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn form_requires_name_and_price() {
    let form = ProductForm {
      name: "Bench Grinder".into(),
      ..Default::default()
    };
    assert!(form.into_draft().is_err());

    let form = ProductForm {
      name: "Bench Grinder".into(),
      price: Some(Money::from_minor(459_900)),
      ..Default::default()
    };
    let draft = form.into_draft().unwrap();
    assert_eq!(draft.category, DEFAULT_PRODUCT_CATEGORY);
    assert_eq!(draft.currency, "INR");
    assert!(draft.sku.starts_with("SKU-"));
  }

  #[test]
  fn deletion_messages() {
    assert_eq!(
      delete_failure_message(&StoreError::ReferencedByOrders),
      "Cannot delete: Product is part of an existing order history."
    );
    assert_eq!(
      delete_failure_message(&StoreError::PermissionDenied("x".into())),
      "Failed to delete: Permission denied."
    );
  }

  #[tokio::test]
  async fn auth_watch_flags_slow_checks() {
    let watch = AdminAuthWatch::start(Duration::from_millis(20));
    assert!(!watch.troubleshoot_visible());
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(watch.finish());

    let quick = AdminAuthWatch::start(Duration::from_secs(30));
    assert!(!quick.finish());
  }
}
