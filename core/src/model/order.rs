// core/src/model/order.rs

use super::Money;
use crate::error::{Result, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
  Pending,
  Paid,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

/// How a status change is treated by the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
  /// Driven by the checkout or the admin ship/complete actions.
  Allowed,
  /// Representable, but only reachable through admin tooling.
  Modeled,
  Rejected,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 6] = [
    OrderStatus::Pending,
    OrderStatus::Paid,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "PENDING",
      OrderStatus::Paid => "PAID",
      OrderStatus::Processing => "PROCESSING",
      OrderStatus::Shipped => "SHIPPED",
      OrderStatus::Delivered => "DELIVERED",
      OrderStatus::Cancelled => "CANCELLED",
    }
  }

  pub fn transition(self, to: OrderStatus) -> Transition {
    use OrderStatus::*;
    match (self, to) {
      (Pending, Paid) | (Paid, Shipped) | (Shipped, Delivered) => Transition::Allowed,
      (Paid, Processing) | (Processing, Shipped) => Transition::Modeled,
      (Pending | Paid | Processing, Cancelled) => Transition::Modeled,
      _ => Transition::Rejected,
    }
  }

  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
  }

  /// Position on the tracking progress bar. Cancelled orders have none.
  pub fn tracking_step(self) -> Option<usize> {
    match self {
      OrderStatus::Pending => Some(0),
      OrderStatus::Paid => Some(1),
      OrderStatus::Processing => Some(2),
      OrderStatus::Shipped => Some(3),
      OrderStatus::Delivered => Some(4),
      OrderStatus::Cancelled => None,
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = StoreError;

  fn from_str(s: &str) -> Result<Self> {
    OrderStatus::ALL
      .into_iter()
      .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| StoreError::Validation(format!("Unknown order status '{}'", s)))
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
  pub full_name: String,
  pub email: String,
  pub address: String,
  pub city: String,
  pub zip_code: String,
  pub country: String,
}

impl ShippingDetails {
  pub const DEFAULT_COUNTRY: &'static str = "India";

  pub fn validate(&self) -> Result<()> {
    let required = [
      ("Full name", &self.full_name),
      ("Email", &self.email),
      ("Address", &self.address),
      ("City", &self.city),
      ("ZIP code", &self.zip_code),
      ("Country", &self.country),
    ];
    if let Some((label, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
      return Err(StoreError::Validation(format!("{} is required", label)));
    }
    if !self.email.contains('@') {
      return Err(StoreError::Validation("Please enter a valid email address".to_string()));
    }
    Ok(())
  }
}

/// One purchased product, frozen at order time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
  /// `None` once the product has been deleted from the catalog.
  pub product_id: Option<String>,
  pub name: String,
  pub quantity: u32,
  pub unit_price: Money,
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Option<String>,
  pub customer_email: String,
  pub shipping_details: ShippingDetails,
  pub items: Vec<OrderLine>,
  pub total_amount: Money,
  pub currency: String,
  pub status: OrderStatus,
  pub tracking_number: Option<String>,
  pub courier_name: Option<String>,
  pub payment_id: Option<String>,
  pub created_at: DateTime<Utc>,
}

impl Order {
  pub fn item_count(&self) -> u32 {
    self.items.iter().map(|line| line.quantity).fold(0u32, u32::saturating_add)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn transitions_are_classified() {
    use OrderStatus::*;
    assert_eq!(Paid.transition(Shipped), Transition::Allowed);
    assert_eq!(Shipped.transition(Delivered), Transition::Allowed);
    assert_eq!(Pending.transition(Paid), Transition::Allowed);
    assert_eq!(Paid.transition(Processing), Transition::Modeled);
    assert_eq!(Processing.transition(Cancelled), Transition::Modeled);
    assert_eq!(Paid.transition(Delivered), Transition::Rejected);
    for to in OrderStatus::ALL {
      assert_eq!(Delivered.transition(to), Transition::Rejected);
      assert_eq!(Cancelled.transition(to), Transition::Rejected);
    }
  }

  #[test]
  fn item_count_saturates() {
    let line = |quantity| OrderLine {
      product_id: Some("1".into()),
      name: "Drill".into(),
      quantity,
      unit_price: Money::from_minor(100),
      image_url: None,
    };
    let order = Order {
      id: Uuid::new_v4(),
      order_number: "ANS-20261017-000001".into(),
      user_id: None,
      customer_email: "asha@example.com".into(),
      shipping_details: ShippingDetails::default(),
      items: vec![line(u32::MAX - 1), line(3)],
      total_amount: Money::ZERO,
      currency: "INR".into(),
      status: OrderStatus::Paid,
      tracking_number: None,
      courier_name: None,
      payment_id: None,
      created_at: Utc::now(),
    };
    assert_eq!(order.item_count(), u32::MAX);
  }

  #[test]
  fn tracking_steps() {
    assert_eq!(OrderStatus::Pending.tracking_step(), Some(0));
    assert_eq!(OrderStatus::Delivered.tracking_step(), Some(4));
    assert_eq!(OrderStatus::Cancelled.tracking_step(), None);
  }

  #[test]
  fn status_parses_wire_values() {
    assert_eq!("PAID".parse::<OrderStatus>().ok(), Some(OrderStatus::Paid));
    assert_eq!("shipped".parse::<OrderStatus>().ok(), Some(OrderStatus::Shipped));
    assert!("LOST".parse::<OrderStatus>().is_err());
  }

  #[test]
  fn shipping_validation_names_the_missing_field() {
    let mut details = ShippingDetails {
      full_name: "Asha Rao".into(),
      email: "asha@example.com".into(),
      address: "12 MG Road".into(),
      city: "Bengaluru".into(),
      zip_code: "".into(),
      country: "India".into(),
    };
    let err = details.validate().unwrap_err();
    assert_eq!(err.to_string(), "ZIP code is required");
    details.zip_code = "560001".into();
    assert!(details.validate().is_ok());
  }
}
