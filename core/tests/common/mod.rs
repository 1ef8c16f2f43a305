// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every helper

use chrono::{Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use storefront::boundary::{CategoryRow, ProductRow, ProfileRow};
use storefront::cache::{CacheStore, MemoryCache};
use storefront::flow::{ContextData, FlowError, Handler, PipelineControl};
use storefront::gateway::{Identity, LocalAuthProvider, MemoryBackend, MockPaymentGateway};
use storefront::model::{Order, OrderLine, OrderStatus, Product, ShippingDetails};
use storefront::{Backends, StoreConfig, Storefront};
use tracing::Level;
use uuid::Uuid;

// --- Tracing ---
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

// --- Flow engine fixtures ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("flow error: {0}")]
  Flow(String),

  #[error("handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(fe.to_string())
  }
}

pub fn recording_handler(label: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.steps_executed.push(label.to_string());
      if guard.should_stop_at.as_deref() == Some(label) {
        return Ok(PipelineControl::Stop);
      }
      Ok(PipelineControl::Continue)
    })
  })
}

pub fn failing_handler(label: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(label.to_string());
      Err(TestError::Handler(format!("{} failed", label)))
    })
  })
}

// --- Storefront fixtures ---
pub const ADMIN_EMAIL: &str = "ops@ansartools.test";
pub const ADMIN_PASSWORD: &str = "admin-pass-1";
pub const CUSTOMER_EMAIL: &str = "asha@example.com";
pub const CUSTOMER_PASSWORD: &str = "customer-pass-1";

/// `price` in whole rupees, `rating_tenths` as 48 for 4.8.
pub fn product_row(id: &str, name: &str, price: i64, stock: i64, category: &str, rating_tenths: i64, age_days: i64) -> ProductRow {
  ProductRow {
    id: id.to_string(),
    name: name.to_string(),
    description: Some(format!("{} for professional use", name)),
    price: Decimal::from(price),
    currency: Some("INR".to_string()),
    sku: Some(format!("SKU-{}", id)),
    stock,
    category: Some(category.to_string()),
    image_url: Some(format!("https://img.example.com/{}.jpg", id)),
    rating: Some(Decimal::new(rating_tenths, 1)),
    created_at: Some(Utc::now() - ChronoDuration::days(age_days)),
  }
}

pub fn sample_product_rows() -> Vec<ProductRow> {
  vec![
    product_row("1", "20V MAX Cordless Drill", 15999, 45, "Drills", 48, 3),
    product_row("2", "7-1/4 in. Circular Saw", 10999, 12, "Saws", 46, 2),
    product_row("3", "4-1/2 in. Angle Grinder", 6799, 30, "Grinders", 45, 1),
    product_row("4", "12 Gallon Wet/Dry Vac", 8499, 8, "Vacuums", 42, 0),
  ]
}

pub fn sample_category_rows() -> Vec<CategoryRow> {
  ["Drills", "Grinders", "Saws", "Vacuums"]
    .iter()
    .enumerate()
    .map(|(i, name)| CategoryRow {
      id: format!("cat-{}", i + 1),
      name: name.to_string(),
    })
    .collect()
}

pub fn sample_product(id: &str) -> Product {
  sample_product_rows()
    .into_iter()
    .find(|row| row.id == id)
    .map(Product::from)
    .expect("sample product exists")
}

pub fn shipping() -> ShippingDetails {
  ShippingDetails {
    full_name: "Asha Rao".to_string(),
    email: CUSTOMER_EMAIL.to_string(),
    address: "12 MG Road".to_string(),
    city: "Bengaluru".to_string(),
    zip_code: "560001".to_string(),
    country: "India".to_string(),
  }
}

/// An order for `qty` of sample product `product_id`, placed `age_minutes` ago.
pub fn order_fixture(number: &str, email: &str, status: OrderStatus, product_id: &str, qty: u32, age_minutes: i64) -> Order {
  let product = sample_product(product_id);
  Order {
    id: Uuid::new_v4(),
    order_number: number.to_string(),
    user_id: None,
    customer_email: email.to_string(),
    shipping_details: ShippingDetails {
      email: email.to_string(),
      ..shipping()
    },
    items: vec![OrderLine {
      product_id: Some(product.id.clone()),
      name: product.name.clone(),
      quantity: qty,
      unit_price: product.price,
      image_url: None,
    }],
    total_amount: product.price.times(qty).with_tax(18),
    currency: "INR".to_string(),
    status,
    tracking_number: None,
    courier_name: None,
    payment_id: Some(format!("pay_{}", number)),
    created_at: Utc::now() - ChronoDuration::minutes(age_minutes),
  }
}

pub fn test_config() -> StoreConfig {
  StoreConfig {
    profile_timeout: Duration::from_millis(200),
    admin_auth_hint: Duration::from_millis(50),
    ..StoreConfig::default()
  }
}

pub struct Harness {
  pub db: Arc<MemoryBackend>,
  pub auth: Arc<LocalAuthProvider>,
  pub payments: Arc<MockPaymentGateway>,
  pub cache: Arc<MemoryCache>,
  pub store: Storefront,
}

impl Harness {
  pub fn new() -> Self {
    let db = MemoryBackend::new()
      .with_products(sample_product_rows())
      .with_categories(sample_category_rows());
    Self::with(test_config(), db, Arc::new(MemoryCache::new()))
  }

  pub fn with(config: StoreConfig, db: MemoryBackend, cache: Arc<MemoryCache>) -> Self {
    let db = Arc::new(db);
    let auth = Arc::new(LocalAuthProvider::new());
    let payments = Arc::new(MockPaymentGateway::new(Duration::from_millis(5)));

    // Profiles appear on signup, as the backend trigger would create them.
    let profiles = Arc::clone(&db);
    auth.set_signup_hook(Arc::new(move |identity: &Identity| {
      profiles.put_profile(ProfileRow {
        id: identity.id.clone(),
        email: Some(identity.email.clone()),
        full_name: identity.user_metadata.name.clone(),
        role: identity
          .user_metadata
          .role
          .clone()
          .or_else(|| identity.app_metadata.role.clone())
          .or_else(|| Some("CUSTOMER".to_string())),
      });
    }));

    let cache_store: Arc<dyn CacheStore> = cache.clone();
    let store = Storefront::new(
      config,
      Backends {
        db: db.clone(),
        auth: auth.clone(),
        payments: payments.clone(),
        cache: cache_store,
      },
    );
    Self {
      db,
      auth,
      payments,
      cache,
      store,
    }
  }

  pub fn register_admin(&self) {
    self
      .auth
      .register(ADMIN_EMAIL, ADMIN_PASSWORD, "Store Ops", Some("ADMIN"))
      .expect("admin registers");
  }

  pub fn register_customer(&self) {
    self
      .auth
      .register(CUSTOMER_EMAIL, CUSTOMER_PASSWORD, "Asha Rao", None)
      .expect("customer registers");
  }

  pub async fn login_admin(&self) {
    self.register_admin();
    self
      .store
      .session()
      .login_as_admin(ADMIN_EMAIL, ADMIN_PASSWORD)
      .await
      .expect("admin logs in");
  }

  pub async fn login_customer(&self) {
    self.register_customer();
    self
      .store
      .session()
      .login(CUSTOMER_EMAIL, CUSTOMER_PASSWORD)
      .await
      .expect("customer logs in");
  }

  /// Loads the catalog and orders without starting listeners.
  pub async fn load(&self) {
    self.store.catalog().load().await.expect("catalog loads");
    self.store.orders().refresh().await.expect("orders load");
  }
}

/// Polls `cond` until it holds or a second passes.
pub async fn eventually(mut cond: impl FnMut() -> bool) -> bool {
  for _ in 0..100 {
    if cond() {
      return true;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  cond()
}
