// core/src/checkout/context.rs

//! Data carried through the checkout pipeline.

use crate::cart::CartStore;
use crate::config::StoreConfig;
use crate::gateway::{PaymentGateway, PaymentMethod, PaymentReceipt};
use crate::model::{CartItem, Money, Order, ShippingDetails, User};
use crate::orders::OrderBook;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Stores and gateways the checkout steps talk to.
#[derive(Clone)]
pub struct CheckoutDeps {
  pub cart: Arc<CartStore>,
  pub orders: Arc<OrderBook>,
  pub payments: Arc<dyn PaymentGateway>,
  pub config: Arc<StoreConfig>,
}

#[derive(Clone)]
pub struct CheckoutCtxData {
  pub deps: CheckoutDeps,
  pub user: Option<User>,
  pub shipping: ShippingDetails,
  pub method: PaymentMethod,

  // Set by compute_totals
  pub order_id: Uuid,
  pub order_number: String,
  pub created_at: DateTime<Utc>,
  pub lines: Vec<CartItem>,
  pub subtotal: Money,
  pub grand_total: Money,

  pub gateway_order_id: Option<String>,
  pub receipt: Option<PaymentReceipt>,
  pub placed_order: Option<Order>,
}

impl CheckoutCtxData {
  pub fn new(deps: CheckoutDeps, user: Option<User>, shipping: ShippingDetails, method: PaymentMethod) -> Self {
    Self {
      deps,
      user,
      shipping,
      method,
      order_id: Uuid::nil(),
      order_number: String::new(),
      created_at: Utc::now(),
      lines: Vec::new(),
      subtotal: Money::ZERO,
      grand_total: Money::ZERO,
      gateway_order_id: None,
      receipt: None,
      placed_order: None,
    }
  }
}
