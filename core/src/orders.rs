// core/src/orders.rs

//! The loaded order list: creation, status updates and lookups, kept fresh
//! by the backend's orders change feed.

use crate::boundary::{OrderRow, OrderStatusPatchRow};
use crate::error::{Result, StoreError};
use crate::gateway::PersistenceGateway;
use crate::model::{Order, OrderStatus};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub struct OrderBook {
  db: Arc<dyn PersistenceGateway>,
  orders: RwLock<Vec<Order>>,
}

impl OrderBook {
  pub fn new(db: Arc<dyn PersistenceGateway>) -> Self {
    Self {
      db,
      orders: RwLock::new(Vec::new()),
    }
  }

  /// Newest first.
  pub fn orders(&self) -> Vec<Order> {
    self.orders.read().clone()
  }

  /// Replaces the list with the backend's. Rows with an unknown status are skipped.
  #[instrument(name = "OrderBook::refresh", skip(self), err(Display))]
  pub async fn refresh(&self) -> Result<()> {
    let rows = self
      .db
      .list_orders()
      .await
      .map_err(|e| StoreError::classify("orders", e))?;

    let orders: Vec<Order> = rows
      .into_iter()
      .filter_map(|row| {
        let number = row.order_number.clone();
        match Order::try_from(row) {
          Ok(order) => Some(order),
          Err(e) => {
            warn!(order_number = %number, error = %e, "Skipping unreadable order row.");
            None
          }
        }
      })
      .collect();

    debug!(count = orders.len(), "Orders refreshed.");
    *self.orders.write() = orders;
    Ok(())
  }

  /// Writes the header row, then the item rows keyed to it, then refetches.
  ///
  /// Either write failing returns that error. A failed refetch is only logged.
  #[instrument(skip(self, order), fields(order_number = %order.order_number), err(Display))]
  pub async fn create_order(&self, order: &Order) -> Result<()> {
    let (header, items) = OrderRow::from_order(order);
    self
      .db
      .insert_order(header)
      .await
      .map_err(|e| StoreError::classify("orders", e))?;
    self
      .db
      .insert_order_items(items)
      .await
      .map_err(|e| StoreError::classify("order_items", e))?;
    info!(total = %order.total_amount, "Order created.");

    if let Err(e) = self.refresh().await {
      warn!(error = %e, "Order list refresh after create failed.");
    }
    Ok(())
  }

  /// Writes the status plus any tracking details given, then refetches.
  #[instrument(skip(self), err(Display))]
  pub async fn update_order_status(
    &self,
    order_id: Uuid,
    status: OrderStatus,
    tracking_number: Option<&str>,
    courier_name: Option<&str>,
  ) -> Result<()> {
    let patch = OrderStatusPatchRow {
      status: status.as_str().to_string(),
      tracking_number: tracking_number.map(str::to_string),
      courier_name: courier_name.map(str::to_string),
    };
    self
      .db
      .update_order(order_id, patch)
      .await
      .map_err(|e| StoreError::classify("orders", e))?;
    self.refresh().await
  }

  pub fn get_order_by_id(&self, order_id: Uuid) -> Option<Order> {
    self.orders.read().iter().find(|o| o.id == order_id).cloned()
  }

  pub fn get_order_by_number(&self, order_number: &str) -> Option<Order> {
    let wanted = order_number.trim();
    self
      .orders
      .read()
      .iter()
      .find(|o| o.order_number.eq_ignore_ascii_case(wanted))
      .cloned()
  }

  /// Case-insensitive match on order number or customer email. An empty term matches all.
  pub fn search(&self, term: &str) -> Vec<Order> {
    let needle = term.trim().to_lowercase();
    self
      .orders
      .read()
      .iter()
      .filter(|o| {
        needle.is_empty()
          || o.order_number.to_lowercase().contains(&needle)
          || o.customer_email.to_lowercase().contains(&needle)
      })
      .cloned()
      .collect()
  }

  /// Orders placed by `user_id`, newest first.
  pub fn orders_for_user(&self, user_id: &str) -> Vec<Order> {
    self
      .orders
      .read()
      .iter()
      .filter(|o| o.user_id.as_deref() == Some(user_id))
      .cloned()
      .collect()
  }

  /// Refetches the whole list on every change notification until the feed closes.
  pub fn spawn_change_listener(self: &Arc<Self>) -> JoinHandle<()> {
    let mut changes = self.db.subscribe_orders();
    let book = Arc::clone(self);
    tokio::spawn(async move {
      loop {
        match changes.recv().await {
          Ok(change) => debug!(table = %change.table, kind = ?change.kind, "Order change received."),
          Err(RecvError::Lagged(skipped)) => debug!(skipped, "Order change feed lagged."),
          Err(RecvError::Closed) => break,
        }
        if let Err(e) = book.refresh().await {
          error!(error = %e, "Order refresh after change failed.");
        }
      }
    })
  }
}
