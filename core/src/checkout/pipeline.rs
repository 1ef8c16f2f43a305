// core/src/checkout/pipeline.rs

//! The checkout as a step pipeline:
//! verify_payment_method -> compute_totals -> precreate_gateway_order (optional)
//! -> collect_payment -> persist_order -> clear_cart.

use super::context::CheckoutCtxData;
use super::order_number::generate_order_number;
use super::{ACCEPTED_METHODS, GST_PERCENT};
use crate::error::{Result, StoreError};
use crate::flow::{ContextData, Pipeline, PipelineControl, SkipCondition};
use crate::gateway::{PaymentRequest, Prefill};
use crate::model::{CartItem, Money, Order, OrderLine, OrderStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub const CHECKOUT_STEPS: [&str; 6] = [
  "verify_payment_method",
  "compute_totals",
  "precreate_gateway_order",
  "collect_payment",
  "persist_order",
  "clear_cart",
];

pub fn build_checkout_pipeline() -> Pipeline<CheckoutCtxData, StoreError> {
  let precreate_disabled: SkipCondition<CheckoutCtxData> =
    Arc::new(|ctx: ContextData<CheckoutCtxData>| !ctx.read().deps.config.precreate_gateway_orders);

  let mut p = Pipeline::<CheckoutCtxData, StoreError>::new(&[
    (CHECKOUT_STEPS[0], false, None),
    (CHECKOUT_STEPS[1], false, None),
    (CHECKOUT_STEPS[2], true, Some(precreate_disabled)),
    (CHECKOUT_STEPS[3], false, None),
    (CHECKOUT_STEPS[4], false, None),
    (CHECKOUT_STEPS[5], false, None),
  ]);

  p.on_root("verify_payment_method", verify_payment_method);
  p.on_root("compute_totals", compute_totals);
  p.on_root("precreate_gateway_order", precreate_gateway_order);
  p.on_root("collect_payment", collect_payment);
  p.after_root("collect_payment", |ctx: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let guard = ctx.read();
      if let Some(receipt) = &guard.receipt {
        info!(order_number = %guard.order_number, payment_id = %receipt.payment_id, "Payment captured.");
      }
      Ok::<_, StoreError>(PipelineControl::Continue)
    })
  });
  p.on_root("persist_order", persist_order);
  p.on_root("clear_cart", clear_cart);
  p
}

#[instrument(name = "checkout::verify_payment_method", skip(ctx_data), err(Display))]
async fn verify_payment_method(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let method = ctx_data.read().method;
  if !ACCEPTED_METHODS.contains(&method) {
    return Err(StoreError::PaymentMethodUnsupported(method.as_str().to_string()));
  }
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::compute_totals", skip(ctx_data), err(Display))]
async fn compute_totals(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (lines, prefix) = {
    let guard = ctx_data.read();
    (guard.deps.cart.items(), guard.deps.config.order_number_prefix.clone())
  }; // guard dropped

  if lines.is_empty() {
    return Err(StoreError::Validation("Your cart is empty".to_string()));
  }

  let subtotal: Money = lines.iter().map(CartItem::line_total).sum();
  let grand_total = subtotal.with_tax(GST_PERCENT);
  let created_at = Utc::now();
  let order_number = generate_order_number(&prefix, created_at);

  let mut guard = ctx_data.write();
  info!(%order_number, %subtotal, %grand_total, "Totals computed.");
  guard.lines = lines;
  guard.subtotal = subtotal;
  guard.grand_total = grand_total;
  guard.created_at = created_at;
  guard.order_number = order_number;
  guard.order_id = Uuid::new_v4();
  Ok(PipelineControl::Continue)
}

/// Optional: without a backend order the hosted checkout still opens, just unlinked.
#[instrument(name = "checkout::precreate_gateway_order", skip(ctx_data), err(Display))]
async fn precreate_gateway_order(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (payments, amount, currency, receipt) = {
    let guard = ctx_data.read();
    (
      Arc::clone(&guard.deps.payments),
      guard.grand_total.minor(),
      guard.deps.config.currency.clone(),
      guard.order_number.clone(),
    )
  };

  let gateway_order = payments.precreate_order(amount, &currency, &receipt).await?;
  ctx_data.write().gateway_order_id = Some(gateway_order.id);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::collect_payment", skip(ctx_data), err(Display))]
async fn collect_payment(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (payments, request) = {
    let guard = ctx_data.read();
    let config = &guard.deps.config;
    let request = PaymentRequest {
      key_id: config.payment_key_id.clone(),
      amount_minor: guard.grand_total.minor(),
      currency: config.currency.clone(),
      merchant_name: config.merchant_name.clone(),
      description: config.merchant_description.clone(),
      gateway_order_id: guard.gateway_order_id.clone(),
      prefill: Prefill {
        name: guard.shipping.full_name.clone(),
        email: guard.shipping.email.clone(),
      },
      theme_color: config.theme_color.clone(),
      allowed_methods: ACCEPTED_METHODS.to_vec(),
    };
    (Arc::clone(&guard.deps.payments), request)
  };

  match payments.collect(request).await {
    Ok(receipt) => {
      ctx_data.write().receipt = Some(receipt);
      Ok(PipelineControl::Continue)
    }
    Err(failure) => {
      warn!(code = %failure.code, reason = ?failure.reason, "Payment not completed.");
      Err(StoreError::Payment {
        description: failure.description,
      })
    }
  }
}

#[instrument(name = "checkout::persist_order", skip(ctx_data), err(Display))]
async fn persist_order(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let (orders, order) = {
    let guard = ctx_data.read();
    let payment_id = guard.receipt.as_ref().map(|r| r.payment_id.clone());
    if payment_id.is_none() {
      return Err(StoreError::Internal("No payment receipt to attach to the order".to_string()));
    }
    let order = Order {
      id: guard.order_id,
      order_number: guard.order_number.clone(),
      user_id: guard.user.as_ref().map(|u| u.id.clone()),
      customer_email: guard.shipping.email.clone(),
      shipping_details: guard.shipping.clone(),
      items: guard
        .lines
        .iter()
        .map(|line| OrderLine {
          product_id: Some(line.product.id.clone()),
          name: line.product.name.clone(),
          quantity: line.quantity,
          unit_price: line.product.price,
          image_url: Some(line.product.image_url.clone()).filter(|url| !url.is_empty()),
        })
        .collect(),
      total_amount: guard.grand_total,
      currency: guard.deps.config.currency.clone(),
      status: OrderStatus::Paid,
      tracking_number: None,
      courier_name: None,
      payment_id,
      created_at: guard.created_at,
    };
    (Arc::clone(&guard.deps.orders), order)
  }; // guard dropped

  orders.create_order(&order).await?;
  ctx_data.write().placed_order = Some(order);
  Ok(PipelineControl::Continue)
}

#[instrument(name = "checkout::clear_cart", skip(ctx_data), err(Display))]
async fn clear_cart(ctx_data: ContextData<CheckoutCtxData>) -> Result<PipelineControl> {
  let cart = Arc::clone(&ctx_data.read().deps.cart);
  cart.clear_cart();
  Ok(PipelineControl::Continue)
}
