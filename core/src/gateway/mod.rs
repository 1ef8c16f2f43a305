// core/src/gateway/mod.rs

//! Seams to the external collaborators: the persistence backend, the auth
//! provider and the payment gateway. Each is a trait object so the stores
//! can run against PostgreSQL in the binary and in-memory doubles in tests.

pub mod auth_local;
pub mod credentials;
pub mod memory;
pub mod payment_mock;

use crate::boundary::{
  CategoryRow, NewCategoryRow, NewProductRow, OrderItemRow, OrderRow, OrderStatusPatchRow, ProductPatchRow,
  ProductRow, ProfileRow,
};
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub use auth_local::LocalAuthProvider;
pub use credentials::SessionSlot;
pub use memory::{MemoryBackend, MemoryFaults};
pub use payment_mock::{MockOutcome, MockPaymentGateway};

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Bucket product images are uploaded to.
pub const PRODUCT_IMAGE_BUCKET: &str = "product-images";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
  Insert,
  Update,
  Delete,
}

/// One notification from a table change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
  pub table: String,
  pub kind: ChangeKind,
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync + 'static {
  async fn list_products(&self) -> GatewayResult<Vec<ProductRow>>;
  async fn insert_product(&self, row: NewProductRow) -> GatewayResult<()>;
  async fn update_product(&self, id: &str, patch: ProductPatchRow) -> GatewayResult<()>;
  /// Returns the deleted rows. An empty vec means nothing matched or the caller lacks permission.
  async fn delete_product(&self, id: &str) -> GatewayResult<Vec<ProductRow>>;

  async fn list_categories(&self) -> GatewayResult<Vec<CategoryRow>>;
  async fn insert_category(&self, row: NewCategoryRow) -> GatewayResult<()>;
  async fn delete_category(&self, id: &str) -> GatewayResult<Vec<CategoryRow>>;

  /// Newest first, each with its item rows joined in.
  async fn list_orders(&self) -> GatewayResult<Vec<OrderRow>>;
  async fn insert_order(&self, row: OrderRow) -> GatewayResult<()>;
  async fn insert_order_items(&self, rows: Vec<OrderItemRow>) -> GatewayResult<()>;
  async fn update_order(&self, id: Uuid, patch: OrderStatusPatchRow) -> GatewayResult<()>;

  async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<ProfileRow>>;

  /// Stores an object and returns its public URL.
  async fn upload_object(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> GatewayResult<String>;

  fn subscribe_orders(&self) -> broadcast::Receiver<ChangeEvent>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
  pub name: Option<String>,
  pub role: Option<String>,
}

/// An authenticated identity as the auth provider reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub id: String,
  pub email: String,
  /// Set by the user at signup.
  pub user_metadata: IdentityMetadata,
  /// Set by operators only.
  pub app_metadata: IdentityMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
  pub identity: Identity,
  pub access_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
  InitialSession,
  SignedIn,
  SignedOut,
  TokenRefreshed,
  UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
  pub kind: AuthEventKind,
  pub session: Option<AuthSession>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
  async fn session(&self) -> GatewayResult<Option<AuthSession>>;
  async fn sign_in(&self, email: &str, password: &str) -> GatewayResult<AuthSession>;
  async fn sign_up(&self, email: &str, password: &str, metadata: IdentityMetadata) -> GatewayResult<Identity>;
  async fn sign_out(&self) -> GatewayResult<()>;
  fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Upi,
  Card,
  Netbanking,
  Wallet,
  Cod,
}

impl PaymentMethod {
  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethod::Upi => "upi",
      PaymentMethod::Card => "card",
      PaymentMethod::Netbanking => "netbanking",
      PaymentMethod::Wallet => "wallet",
      PaymentMethod::Cod => "cod",
    }
  }
}

/// An order pre-created on the payment backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
  pub id: String,
  pub amount_minor: i64,
  pub currency: String,
  pub receipt: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefill {
  pub name: String,
  pub email: String,
}

/// Everything the hosted checkout needs to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
  pub key_id: String,
  pub amount_minor: i64,
  pub currency: String,
  pub merchant_name: String,
  pub description: String,
  pub gateway_order_id: Option<String>,
  pub prefill: Prefill,
  pub theme_color: String,
  pub allowed_methods: Vec<PaymentMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
  pub payment_id: String,
  pub gateway_order_id: Option<String>,
  pub signature: Option<String>,
}

/// Why the hosted checkout did not produce a payment. `description` is shown verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentFailure {
  pub code: String,
  pub description: String,
  pub reason: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
  async fn precreate_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> GatewayResult<GatewayOrder>;
  async fn collect(&self, request: PaymentRequest) -> std::result::Result<PaymentReceipt, PaymentFailure>;
}
