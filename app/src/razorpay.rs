// app/src/razorpay.rs

//! Razorpay over its REST API. Orders are pre-created with `POST /v1/orders`.
//! A terminal cannot host the checkout widget, so payment is collected through
//! a payment link that is polled until it settles.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use storefront::gateway::{
  GatewayOrder, GatewayResult, PaymentFailure, PaymentGateway, PaymentMethod, PaymentReceipt, PaymentRequest,
};
use storefront::GatewayError;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_API_BASE: &str = "https://api.razorpay.com";

#[derive(Clone)]
pub struct RazorpaySettings {
  pub key_id: String,
  pub key_secret: String,
  pub api_base: String,
  pub poll_interval: Duration,
  /// How long a payment link may stay unpaid before checkout gives up.
  pub checkout_timeout: Duration,
}

impl fmt::Debug for RazorpaySettings {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RazorpaySettings")
      .field("key_id", &self.key_id)
      .field("key_secret", &"<redacted>")
      .field("api_base", &self.api_base)
      .field("poll_interval", &self.poll_interval)
      .field("checkout_timeout", &self.checkout_timeout)
      .finish()
  }
}

pub struct RazorpayGateway {
  client: reqwest::Client,
  settings: RazorpaySettings,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
  amount: i64,
  currency: &'a str,
  receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
  id: String,
  amount: i64,
  currency: String,
  #[serde(default)]
  receipt: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkCustomer<'a> {
  name: &'a str,
  email: &'a str,
}

#[derive(Debug, Serialize)]
struct LinkNotify {
  sms: bool,
  email: bool,
}

#[derive(Debug, Serialize)]
struct LinkNotes<'a> {
  merchant: &'a str,
  #[serde(skip_serializing_if = "Option::is_none")]
  gateway_order_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct PaymentLinkBody<'a> {
  amount: i64,
  currency: &'a str,
  description: &'a str,
  accept_partial: bool,
  upi_link: bool,
  customer: LinkCustomer<'a>,
  notify: LinkNotify,
  notes: LinkNotes<'a>,
}

#[derive(Debug, Clone, Deserialize)]
struct LinkPayment {
  payment_id: String,
  #[serde(default)]
  status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentLink {
  id: String,
  status: String,
  #[serde(default)]
  short_url: Option<String>,
  #[serde(default)]
  order_id: Option<String>,
  #[serde(default)]
  payments: Option<Vec<LinkPayment>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
  error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
  #[serde(default)]
  code: Option<String>,
  #[serde(default)]
  description: Option<String>,
  #[serde(default)]
  reason: Option<String>,
}

/// Where a payment link stands after one poll.
#[derive(Debug, PartialEq)]
enum LinkState {
  Waiting,
  Paid(PaymentReceipt),
  Closed(PaymentFailure),
}

fn payment_link_body(request: &PaymentRequest) -> PaymentLinkBody<'_> {
  PaymentLinkBody {
    amount: request.amount_minor,
    currency: &request.currency,
    description: &request.description,
    accept_partial: false,
    upi_link: request.allowed_methods == [PaymentMethod::Upi],
    customer: LinkCustomer {
      name: &request.prefill.name,
      email: &request.prefill.email,
    },
    notify: LinkNotify { sms: false, email: false },
    notes: LinkNotes {
      merchant: &request.merchant_name,
      gateway_order_id: request.gateway_order_id.as_deref(),
    },
  }
}

fn link_state(link: &PaymentLink, fallback_order_id: Option<&str>) -> LinkState {
  match link.status.as_str() {
    "paid" => {
      let payments = link.payments.as_deref().unwrap_or_default();
      let payment = payments
        .iter()
        .find(|p| p.status.as_deref() == Some("captured"))
        .or_else(|| payments.first());
      match payment {
        Some(payment) => LinkState::Paid(PaymentReceipt {
          payment_id: payment.payment_id.clone(),
          gateway_order_id: link.order_id.clone().or_else(|| fallback_order_id.map(str::to_string)),
          signature: None,
        }),
        // Settled but the payment is not listed yet.
        None => LinkState::Waiting,
      }
    }
    "cancelled" => LinkState::Closed(PaymentFailure {
      code: "PAYMENT_CANCELLED".to_string(),
      description: "Payment cancelled by user".to_string(),
      reason: Some("payment_link_cancelled".to_string()),
    }),
    "expired" => LinkState::Closed(PaymentFailure {
      code: "PAYMENT_CANCELLED".to_string(),
      description: "The payment link expired before it was paid".to_string(),
      reason: Some("payment_link_expired".to_string()),
    }),
    _ => LinkState::Waiting,
  }
}

/// Reads Razorpay's `{"error": {...}}` envelope, falling back to the status line.
fn api_failure(status: StatusCode, body: &str) -> PaymentFailure {
  match serde_json::from_str::<ErrorEnvelope>(body) {
    Ok(envelope) => PaymentFailure {
      code: envelope.error.code.unwrap_or_else(|| "BAD_REQUEST_ERROR".to_string()),
      description: envelope
        .error
        .description
        .unwrap_or_else(|| format!("Payment gateway returned {}", status)),
      reason: envelope.error.reason,
    },
    Err(_) => PaymentFailure {
      code: "GATEWAY_ERROR".to_string(),
      description: format!("Payment gateway returned {}", status),
      reason: None,
    },
  }
}

fn network_failure(err: reqwest::Error) -> PaymentFailure {
  PaymentFailure {
    code: "NETWORK_ERROR".to_string(),
    description: format!("Could not reach the payment gateway: {}", err),
    reason: None,
  }
}

impl RazorpayGateway {
  pub fn new(settings: RazorpaySettings) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(20))
      .build()
      .map_err(|e| AppError::Config(format!("Cannot build the Razorpay HTTP client: {}", e)))?;
    Ok(Self { client, settings })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/v1/{}", self.settings.api_base.trim_end_matches('/'), path)
  }

  async fn send<T: serde::de::DeserializeOwned>(
    &self,
    builder: reqwest::RequestBuilder,
  ) -> std::result::Result<T, PaymentFailure> {
    let response = builder
      .basic_auth(&self.settings.key_id, Some(&self.settings.key_secret))
      .send()
      .await
      .map_err(network_failure)?;
    let status = response.status();
    let body = response.text().await.map_err(network_failure)?;
    if !status.is_success() {
      return Err(api_failure(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| PaymentFailure {
      code: "GATEWAY_ERROR".to_string(),
      description: format!("Unexpected payment gateway response: {}", e),
      reason: None,
    })
  }

  async fn cancel_link(&self, link_id: &str) {
    let request = self.client.post(self.url(&format!("payment_links/{}/cancel", link_id)));
    if let Err(failure) = self.send::<PaymentLink>(request).await {
      warn!(%link_id, error = %failure.description, "Failed to cancel the payment link.");
    }
  }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
  #[instrument(skip(self), err(Display))]
  async fn precreate_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> GatewayResult<GatewayOrder> {
    if amount_minor <= 0 {
      return Err(GatewayError::message("Amount must be greater than zero"));
    }
    let body = OrderBody {
      amount: amount_minor,
      currency,
      receipt,
    };
    let order: OrderResponse = self
      .send(self.client.post(self.url("orders")).json(&body))
      .await
      .map_err(|failure| GatewayError::new(Some(failure.code.as_str()), failure.description))?;
    info!(gateway_order_id = %order.id, "Razorpay order created.");
    Ok(GatewayOrder {
      id: order.id,
      amount_minor: order.amount,
      currency: order.currency,
      receipt: order.receipt.unwrap_or_else(|| receipt.to_string()),
    })
  }

  #[instrument(skip(self, request), fields(amount_minor = request.amount_minor))]
  async fn collect(&self, request: PaymentRequest) -> std::result::Result<PaymentReceipt, PaymentFailure> {
    let link: PaymentLink = self
      .send(self.client.post(self.url("payment_links")).json(&payment_link_body(&request)))
      .await?;
    match &link.short_url {
      Some(url) => info!(link_id = %link.id, %url, "Open the payment link to pay."),
      None => info!(link_id = %link.id, "Payment link created."),
    }

    let deadline = Instant::now() + self.settings.checkout_timeout;
    let mut current = link;
    loop {
      match link_state(&current, request.gateway_order_id.as_deref()) {
        LinkState::Paid(receipt) => {
          info!(payment_id = %receipt.payment_id, "Razorpay payment captured.");
          return Ok(receipt);
        }
        LinkState::Closed(failure) => return Err(failure),
        LinkState::Waiting => {}
      }
      if Instant::now() >= deadline {
        self.cancel_link(&current.id).await;
        return Err(PaymentFailure {
          code: "PAYMENT_CANCELLED".to_string(),
          description: "Payment was not completed in time".to_string(),
          reason: Some("timeout".to_string()),
        });
      }
      tokio::time::sleep(self.settings.poll_interval).await;
      debug!(link_id = %current.id, status = %current.status, "Polling payment link.");
      current = self
        .send(self.client.get(self.url(&format!("payment_links/{}", current.id))))
        .await?;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use storefront::gateway::Prefill;

  fn request(methods: Vec<PaymentMethod>) -> PaymentRequest {
    PaymentRequest {
      key_id: "rzp_test_key".into(),
      amount_minor: 1_887_882,
      currency: "INR".into(),
      merchant_name: "Ansar Tools".into(),
      description: "Secure Transaction".into(),
      gateway_order_id: Some("order_9A33XWu170gUtm".into()),
      prefill: Prefill {
        name: "Asha Rao".into(),
        email: "asha@example.com".into(),
      },
      theme_color: "#ea580c".into(),
      allowed_methods: methods,
    }
  }

  fn link(status: &str, payments: Option<Vec<LinkPayment>>) -> PaymentLink {
    PaymentLink {
      id: "plink_1".into(),
      status: status.into(),
      short_url: Some("https://rzp.io/i/abc".into()),
      order_id: None,
      payments,
    }
  }

  #[test]
  fn payment_link_body_carries_amount_prefill_and_upi_restriction() {
    let upi_only = request(vec![PaymentMethod::Upi]);
    let body = serde_json::to_value(payment_link_body(&upi_only)).unwrap();
    assert_eq!(body["amount"], 1_887_882);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["upi_link"], true);
    assert_eq!(body["accept_partial"], false);
    assert_eq!(body["customer"]["email"], "asha@example.com");
    assert_eq!(body["notes"]["gateway_order_id"], "order_9A33XWu170gUtm");

    let any = request(vec![PaymentMethod::Upi, PaymentMethod::Card]);
    let body = serde_json::to_value(payment_link_body(&any)).unwrap();
    assert_eq!(body["upi_link"], false);
  }

  #[test]
  fn order_body_is_in_minor_units() {
    let body = serde_json::to_value(OrderBody {
      amount: 1_887_882,
      currency: "INR",
      receipt: "ANS-20261017-000042",
    })
    .unwrap();
    assert_eq!(
      body,
      serde_json::json!({"amount": 1_887_882, "currency": "INR", "receipt": "ANS-20261017-000042"})
    );
  }

  #[test]
  fn link_states_follow_the_status() {
    assert_eq!(link_state(&link("created", None), None), LinkState::Waiting);
    assert_eq!(link_state(&link("paid", Some(Vec::new())), None), LinkState::Waiting);

    let paid = link(
      "paid",
      Some(vec![
        LinkPayment {
          payment_id: "pay_failed".into(),
          status: Some("failed".into()),
        },
        LinkPayment {
          payment_id: "pay_ok".into(),
          status: Some("captured".into()),
        },
      ]),
    );
    let LinkState::Paid(receipt) = link_state(&paid, Some("order_1")) else {
      panic!("expected a paid link");
    };
    assert_eq!(receipt.payment_id, "pay_ok");
    assert_eq!(receipt.gateway_order_id.as_deref(), Some("order_1"));

    let LinkState::Closed(failure) = link_state(&link("expired", None), None) else {
      panic!("expected a closed link");
    };
    assert_eq!(failure.reason.as_deref(), Some("payment_link_expired"));
    assert!(matches!(link_state(&link("cancelled", None), None), LinkState::Closed(_)));
  }

  #[test]
  fn api_errors_keep_the_gateway_description() {
    let body = r#"{"error":{"code":"BAD_REQUEST_ERROR","description":"The amount must be atleast INR 1.00","reason":"input_validation_failed"}}"#;
    let failure = api_failure(StatusCode::BAD_REQUEST, body);
    assert_eq!(failure.code, "BAD_REQUEST_ERROR");
    assert_eq!(failure.description, "The amount must be atleast INR 1.00");
    assert_eq!(failure.reason.as_deref(), Some("input_validation_failed"));

    let failure = api_failure(StatusCode::BAD_GATEWAY, "<html>");
    assert_eq!(failure.code, "GATEWAY_ERROR");
    assert!(failure.description.contains("502"));
  }

  #[test]
  fn urls_join_cleanly_and_debug_hides_the_secret() {
    let settings = RazorpaySettings {
      key_id: "rzp_test_key".into(),
      key_secret: "s3cr3t-value".into(),
      api_base: "https://api.razorpay.com/".into(),
      poll_interval: Duration::from_secs(3),
      checkout_timeout: Duration::from_secs(900),
    };
    assert!(!format!("{:?}", settings).contains("s3cr3t-value"));
    let gateway = RazorpayGateway::new(settings).unwrap();
    assert_eq!(gateway.url("orders"), "https://api.razorpay.com/v1/orders");
  }
}
