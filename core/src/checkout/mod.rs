// core/src/checkout/mod.rs

//! Two-step checkout: shipping details, then payment. Placing the order runs
//! the checkout pipeline; a failed or cancelled payment leaves no order behind
//! and the cart untouched.

mod context;
mod order_number;
mod pipeline;

pub use context::{CheckoutCtxData, CheckoutDeps};
pub use order_number::{format_order_number, generate_order_number};
pub use pipeline::{build_checkout_pipeline, CHECKOUT_STEPS};

use crate::error::{Result, StoreError};
use crate::flow::{ContextData, Pipeline, PipelineResult};
use crate::gateway::PaymentMethod;
use crate::model::{Order, ShippingDetails, User};
use crate::routes::Route;
use tracing::{info, instrument};

/// Goods and services tax added on top of the cart subtotal.
pub const GST_PERCENT: u32 = 18;
/// Instruments the hosted checkout is opened with.
pub const ACCEPTED_METHODS: [PaymentMethod; 1] = [PaymentMethod::Upi];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStep {
  Shipping,
  Payment,
}

/// The shopper's progress through the checkout form. Nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
  step: CheckoutStep,
  shipping: ShippingDetails,
}

impl CheckoutSession {
  /// Starts at the shipping step, prefilled from the signed-in user.
  pub fn begin(user: Option<&User>) -> Self {
    let shipping = ShippingDetails {
      full_name: user.map(|u| u.name.clone()).unwrap_or_default(),
      email: user.map(|u| u.email.clone()).unwrap_or_default(),
      country: ShippingDetails::DEFAULT_COUNTRY.to_string(),
      ..Default::default()
    };
    Self {
      step: CheckoutStep::Shipping,
      shipping,
    }
  }

  pub fn step(&self) -> CheckoutStep {
    self.step
  }

  pub fn shipping(&self) -> &ShippingDetails {
    &self.shipping
  }

  /// Editing sends the shopper back to the shipping step.
  pub fn shipping_mut(&mut self) -> &mut ShippingDetails {
    self.step = CheckoutStep::Shipping;
    &mut self.shipping
  }

  /// Validates the shipping form and moves on to payment.
  pub fn submit_shipping(&mut self) -> Result<()> {
    self.shipping.validate()?;
    self.step = CheckoutStep::Payment;
    Ok(())
  }

  pub fn back(&mut self) {
    self.step = CheckoutStep::Shipping;
  }
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
  pub order: Order,
  /// Where the shopper lands next.
  pub confirmation: Route,
}

pub struct CheckoutWorkflow {
  pipeline: Pipeline<CheckoutCtxData, StoreError>,
  deps: CheckoutDeps,
}

impl CheckoutWorkflow {
  pub fn new(deps: CheckoutDeps) -> Self {
    Self {
      pipeline: build_checkout_pipeline(),
      deps,
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.pipeline.step_names()
  }

  /// Collects payment and records the order. Requires the session to be at the payment step.
  #[instrument(skip(self, session, user), fields(method = method.as_str()), err(Display))]
  pub async fn place_order(
    &self,
    session: &CheckoutSession,
    user: Option<User>,
    method: PaymentMethod,
  ) -> Result<PlacedOrder> {
    if session.step() != CheckoutStep::Payment {
      return Err(StoreError::Validation(
        "Please confirm your shipping details first".to_string(),
      ));
    }
    session.shipping().validate()?;

    let ctx = ContextData::new(CheckoutCtxData::new(
      self.deps.clone(),
      user,
      session.shipping().clone(),
      method,
    ));

    match self.pipeline.run(ctx.clone()).await? {
      PipelineResult::Completed => {}
      PipelineResult::Stopped => {
        return Err(StoreError::Internal("Checkout halted before the order was placed".to_string()));
      }
    }

    let order = ctx
      .read()
      .placed_order
      .clone()
      .ok_or_else(|| StoreError::Internal("Checkout finished without an order".to_string()))?;
    info!(order_number = %order.order_number, total = %order.total_amount, "Order placed.");
    Ok(PlacedOrder {
      confirmation: Route::OrderSuccess {
        order_number: order.order_number.clone(),
      },
      order,
    })
  }
}
