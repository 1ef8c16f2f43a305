// tests/storefront_tests.rs
mod common;

use common::*;
use serial_test::serial;
use std::sync::Arc;
use storefront::cache::MemoryCache;
use storefront::gateway::{AuthProvider, MemoryBackend, MemoryFaults, PersistenceGateway};
use storefront::model::OrderStatus;

fn seeded() -> MemoryBackend {
  MemoryBackend::new()
    .with_products(sample_product_rows())
    .with_categories(sample_category_rows())
}

#[tokio::test]
#[serial]
async fn test_cold_start_loads_everything() {
  setup_tracing();
  let h = Harness::new();
  let report = h.store.start().await;

  assert_eq!(report.user, None);
  assert!(report.catalog_revalidation.is_none());
  assert_eq!(report.catalog_error, None);
  assert!(report.orders_loaded);
  assert_eq!(h.store.catalog().products().len(), 4);
  assert!(!h.store.session().is_loading());
}

#[tokio::test]
#[serial]
async fn test_warm_start_serves_cache_and_restores_cart() {
  setup_tracing();
  let cache = Arc::new(MemoryCache::new());
  {
    let first = Harness::with(test_config(), seeded(), cache.clone());
    first.store.start().await;
    first.store.cart().add_to_cart(&sample_product("2"), 2);
    first.store.shutdown();
  }

  let second = Harness::with(test_config(), seeded(), cache);
  assert_eq!(second.store.cart().quantity_of("2"), Some(2));
  let report = second.store.start().await;
  let revalidation = report.catalog_revalidation.expect("served from cache");
  assert_eq!(second.store.catalog().products().len(), 4);
  revalidation.await.unwrap();
  assert_eq!(second.store.catalog().products().len(), 4);
}

#[tokio::test]
#[serial]
async fn test_start_reports_a_missing_schema() {
  setup_tracing();
  let db = seeded();
  db.update_faults(|f| f.products_error = Some(MemoryFaults::table_missing("products")));
  let h = Harness::with(test_config(), db, Arc::new(MemoryCache::new()));

  let report = h.store.start().await;
  let message = report.catalog_error.expect("catalog error shown");
  assert!(message.contains("products"));
  assert_eq!(h.store.catalog().error(), Some(message));
  // Orders are independent of the catalog.
  assert!(report.orders_loaded);
}

#[tokio::test]
#[serial]
async fn test_listeners_keep_session_and_orders_current() {
  setup_tracing();
  let h = Harness::new();
  h.register_customer();
  h.store.start().await;

  h.auth.sign_in(CUSTOMER_EMAIL, CUSTOMER_PASSWORD).await.unwrap();
  let session = h.store.session().clone();
  assert!(eventually(|| session.is_authenticated()).await);

  let other_client = order_fixture("ANS-20261012-000001", "walk-in@example.com", OrderStatus::Paid, "3", 1, 0);
  let (header, items) = storefront::boundary::OrderRow::from_order(&other_client);
  h.db.insert_order(header).await.unwrap();
  h.db.insert_order_items(items).await.unwrap();
  let orders = h.store.orders().clone();
  assert!(eventually(|| orders.get_order_by_id(other_client.id).is_some()).await);

  h.auth.sign_out().await.unwrap();
  assert!(eventually(|| !session.is_authenticated()).await);
  h.store.shutdown();
}

#[tokio::test]
#[serial]
async fn test_tracking_lookup() {
  setup_tracing();
  let h = Harness::new();
  let order = order_fixture("ANS-20261012-000042", CUSTOMER_EMAIL, OrderStatus::Shipped, "1", 1, 0);
  h.store.orders().create_order(&order).await.unwrap();

  let found = h.store.track(" ans-20261012-000042").expect("order tracked");
  assert_eq!(found.status.tracking_step(), Some(3));
  assert!(h.store.track("ANS-00000000-000000").is_none());
}
