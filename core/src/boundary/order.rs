// core/src/boundary/order.rs

use crate::error::{Result, StoreError};
use crate::model::{Money, Order, OrderLine, OrderStatus, ShippingDetails};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The JSON stored in `orders.shipping_details`. Keys are camelCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingDetailsRow {
  #[serde(default)]
  pub full_name: String,
  #[serde(default)]
  pub email: String,
  #[serde(default)]
  pub address: String,
  #[serde(default)]
  pub city: String,
  #[serde(default)]
  pub zip_code: String,
  #[serde(default)]
  pub country: String,
}

impl From<&ShippingDetails> for ShippingDetailsRow {
  fn from(details: &ShippingDetails) -> Self {
    ShippingDetailsRow {
      full_name: details.full_name.clone(),
      email: details.email.clone(),
      address: details.address.clone(),
      city: details.city.clone(),
      zip_code: details.zip_code.clone(),
      country: details.country.clone(),
    }
  }
}

impl From<ShippingDetailsRow> for ShippingDetails {
  fn from(row: ShippingDetailsRow) -> Self {
    ShippingDetails {
      full_name: row.full_name,
      email: row.email,
      address: row.address,
      city: row.city,
      zip_code: row.zip_code,
      country: row.country,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItemRow {
  pub order_id: Uuid,
  #[serde(default)]
  pub product_id: Option<String>,
  pub name: String,
  pub quantity: i64,
  pub unit_price: Decimal,
  /// Joined in from the product on read; never written.
  #[serde(default, skip_serializing)]
  pub image_url: Option<String>,
}

impl From<OrderItemRow> for OrderLine {
  fn from(row: OrderItemRow) -> Self {
    OrderLine {
      product_id: row.product_id,
      name: row.name,
      quantity: u32::try_from(row.quantity.max(1)).unwrap_or(u32::MAX),
      unit_price: Money::from_decimal(row.unit_price),
      image_url: row.image_url,
    }
  }
}

/// An `orders` row. On read, `items` holds the joined `order_items`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRow {
  pub id: Uuid,
  pub order_number: String,
  #[serde(default)]
  pub user_id: Option<String>,
  pub customer_email: String,
  pub total_amount: Decimal,
  pub currency: String,
  pub status: String,
  pub shipping_details: ShippingDetailsRow,
  #[serde(default)]
  pub tracking_number: Option<String>,
  #[serde(default)]
  pub courier_name: Option<String>,
  #[serde(default)]
  pub payment_id: Option<String>,
  pub created_at: DateTime<Utc>,
  #[serde(default, skip_serializing)]
  pub items: Vec<OrderItemRow>,
}

impl OrderRow {
  /// Splits an order into its header row and item rows, in write order.
  pub fn from_order(order: &Order) -> (OrderRow, Vec<OrderItemRow>) {
    let header = OrderRow {
      id: order.id,
      order_number: order.order_number.clone(),
      user_id: order.user_id.clone(),
      customer_email: order.customer_email.clone(),
      total_amount: order.total_amount.to_decimal(),
      currency: order.currency.clone(),
      status: order.status.as_str().to_string(),
      shipping_details: ShippingDetailsRow::from(&order.shipping_details),
      tracking_number: order.tracking_number.clone(),
      courier_name: order.courier_name.clone(),
      payment_id: order.payment_id.clone(),
      created_at: order.created_at,
      items: Vec::new(),
    };
    let items = order
      .items
      .iter()
      .map(|line| OrderItemRow {
        order_id: order.id,
        product_id: line.product_id.clone(),
        name: line.name.clone(),
        quantity: i64::from(line.quantity),
        unit_price: line.unit_price.to_decimal(),
        image_url: None,
      })
      .collect();
    (header, items)
  }
}

impl TryFrom<OrderRow> for Order {
  type Error = StoreError;

  fn try_from(row: OrderRow) -> Result<Self> {
    let status = row.status.parse::<OrderStatus>()?;
    Ok(Order {
      id: row.id,
      order_number: row.order_number,
      user_id: row.user_id,
      customer_email: row.customer_email,
      shipping_details: row.shipping_details.into(),
      items: row.items.into_iter().map(OrderLine::from).collect(),
      total_amount: Money::from_decimal(row.total_amount),
      currency: row.currency,
      status,
      tracking_number: row.tracking_number,
      courier_name: row.courier_name,
      payment_id: row.payment_id,
      created_at: row.created_at,
    })
  }
}

/// Status update for one order. Tracking and courier are only written when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusPatchRow {
  pub status: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tracking_number: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub courier_name: Option<String>,
}
