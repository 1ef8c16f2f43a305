// core/src/gateway/payment_mock.rs

//! A stand-in for the hosted payment checkout. It sleeps to simulate
//! network latency and resolves according to the configured outcome.

use super::{GatewayOrder, GatewayResult, PaymentFailure, PaymentGateway, PaymentReceipt, PaymentRequest};
use crate::error::GatewayError;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
  Succeed,
  /// The gateway reports a failure with this description.
  Decline(String),
  /// The shopper closes the checkout window.
  Dismiss,
}

struct MockState {
  outcome: MockOutcome,
  backend_available: bool,
  requests: Vec<PaymentRequest>,
  precreated: Vec<GatewayOrder>,
}

pub struct MockPaymentGateway {
  latency: Duration,
  state: RwLock<MockState>,
}

impl Default for MockPaymentGateway {
  fn default() -> Self {
    Self::new(Duration::from_millis(50))
  }
}

impl MockPaymentGateway {
  pub fn new(latency: Duration) -> Self {
    Self {
      latency,
      state: RwLock::new(MockState {
        outcome: MockOutcome::Succeed,
        backend_available: true,
        requests: Vec::new(),
        precreated: Vec::new(),
      }),
    }
  }

  pub fn set_outcome(&self, outcome: MockOutcome) {
    self.state.write().outcome = outcome;
  }

  /// When false, order pre-creation fails as if the backend function were not deployed.
  pub fn set_backend_available(&self, available: bool) {
    self.state.write().backend_available = available;
  }

  pub fn requests(&self) -> Vec<PaymentRequest> {
    self.state.read().requests.clone()
  }

  pub fn precreated_orders(&self) -> Vec<GatewayOrder> {
    self.state.read().precreated.clone()
  }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
  #[instrument(skip(self), err(Display))]
  async fn precreate_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> GatewayResult<GatewayOrder> {
    tokio::time::sleep(self.latency).await;
    if !self.state.read().backend_available {
      return Err(GatewayError::message("Payment backend unavailable"));
    }
    if amount_minor <= 0 {
      return Err(GatewayError::message("Amount must be greater than zero"));
    }
    let order = GatewayOrder {
      id: format!("order_mock_{}", Uuid::new_v4().simple()),
      amount_minor,
      currency: currency.to_string(),
      receipt: receipt.to_string(),
    };
    self.state.write().precreated.push(order.clone());
    info!(gateway_order_id = %order.id, "Mock gateway order created.");
    Ok(order)
  }

  #[instrument(skip(self, request), fields(amount_minor = request.amount_minor))]
  async fn collect(&self, request: PaymentRequest) -> Result<PaymentReceipt, PaymentFailure> {
    tokio::time::sleep(self.latency).await;
    let outcome = {
      let mut state = self.state.write();
      state.requests.push(request.clone());
      state.outcome.clone()
    };

    match outcome {
      MockOutcome::Succeed => {
        let receipt = PaymentReceipt {
          payment_id: format!("pay_mock_{}", Uuid::new_v4().simple()),
          gateway_order_id: request.gateway_order_id,
          signature: None,
        };
        info!(payment_id = %receipt.payment_id, "Mock payment succeeded.");
        Ok(receipt)
      }
      MockOutcome::Decline(description) => {
        info!(%description, "Mock payment declined.");
        Err(PaymentFailure {
          code: "BAD_REQUEST_ERROR".to_string(),
          description,
          reason: Some("payment_failed".to_string()),
        })
      }
      MockOutcome::Dismiss => Err(PaymentFailure {
        code: "PAYMENT_CANCELLED".to_string(),
        description: "Payment cancelled by user".to_string(),
        reason: Some("dismissed".to_string()),
      }),
    }
  }
}
