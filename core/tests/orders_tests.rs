// tests/orders_tests.rs
mod common;

use common::*;
use serial_test::serial;
use storefront::boundary::OrderRow;
use storefront::gateway::{MemoryFaults, PersistenceGateway};
use storefront::model::OrderStatus;
use storefront::StoreError;

#[tokio::test]
#[serial]
async fn test_created_orders_are_listed_newest_first() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders();

  let older = order_fixture("ANS-20261001-000001", "a@example.com", OrderStatus::Paid, "1", 1, 30);
  let newer = order_fixture("ANS-20261001-000002", "b@example.com", OrderStatus::Paid, "2", 3, 5);
  book.create_order(&older).await.unwrap();
  book.create_order(&newer).await.unwrap();

  let listed = book.orders();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].order_number, newer.order_number);
  assert_eq!(listed[0].items[0].quantity, 3);
  assert_eq!(listed[0].total_amount, newer.total_amount);
  // Line images are joined from the product table on read.
  assert_eq!(
    listed[0].items[0].image_url.as_deref(),
    Some("https://img.example.com/2.jpg")
  );
  assert_eq!(book.get_order_by_id(older.id).map(|o| o.order_number), Some(older.order_number));
}

#[tokio::test]
#[serial]
async fn test_duplicate_order_numbers_are_refused() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders();
  let first = order_fixture("ANS-20261001-000007", "a@example.com", OrderStatus::Paid, "1", 1, 0);
  book.create_order(&first).await.unwrap();

  let clash = order_fixture("ANS-20261001-000007", "b@example.com", OrderStatus::Paid, "2", 1, 0);
  assert!(matches!(book.create_order(&clash).await, Err(StoreError::Gateway(_))));
  assert_eq!(h.db.order_count(), 1);
}

#[tokio::test]
#[serial]
async fn test_lookup_by_number_and_search() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders();
  for (n, email) in [(1, "asha@example.com"), (2, "ravi@example.com"), (3, "ASHA.R@corp.in")] {
    let order = order_fixture(&format!("ANS-20261002-00000{}", n), email, OrderStatus::Paid, "3", 1, n);
    book.create_order(&order).await.unwrap();
  }

  assert!(book.get_order_by_number("  ans-20261002-000002 ").is_some());
  assert!(book.get_order_by_number("ANS-20261002-000009").is_none());
  assert_eq!(book.search("asha").len(), 2);
  assert_eq!(book.search("000003").len(), 1);
  assert_eq!(book.search("").len(), 3);
  assert!(book.search("nobody").is_empty());
}

#[tokio::test]
#[serial]
async fn test_orders_for_user() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders();
  let mut mine = order_fixture("ANS-20261003-000001", CUSTOMER_EMAIL, OrderStatus::Paid, "1", 1, 2);
  mine.user_id = Some("user-1".to_string());
  let theirs = order_fixture("ANS-20261003-000002", "x@example.com", OrderStatus::Paid, "1", 1, 1);
  book.create_order(&mine).await.unwrap();
  book.create_order(&theirs).await.unwrap();

  let found = book.orders_for_user("user-1");
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].id, mine.id);
}

#[tokio::test]
#[serial]
async fn test_status_update_keeps_tracking_details() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders();
  let order = order_fixture("ANS-20261004-000001", "a@example.com", OrderStatus::Paid, "1", 1, 0);
  book.create_order(&order).await.unwrap();

  book
    .update_order_status(order.id, OrderStatus::Shipped, Some("TRK-1"), Some("DTDC"))
    .await
    .unwrap();
  book
    .update_order_status(order.id, OrderStatus::Delivered, None, None)
    .await
    .unwrap();

  let stored = book.get_order_by_id(order.id).unwrap();
  assert_eq!(stored.status, OrderStatus::Delivered);
  assert_eq!(stored.tracking_number.as_deref(), Some("TRK-1"));
  assert_eq!(stored.courier_name.as_deref(), Some("DTDC"));
}

#[tokio::test]
#[serial]
async fn test_update_failure_is_returned() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders();
  let order = order_fixture("ANS-20261004-000002", "a@example.com", OrderStatus::Paid, "1", 1, 0);
  book.create_order(&order).await.unwrap();
  h.db
    .update_faults(|f| f.order_update_error = Some(MemoryFaults::table_missing("orders")));

  let err = book
    .update_order_status(order.id, OrderStatus::Shipped, Some("TRK"), None)
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::SetupRequired { ref table, .. } if table == "orders"));
  assert_eq!(book.get_order_by_id(order.id).unwrap().status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_unknown_status_rows_are_skipped() {
  setup_tracing();
  let h = Harness::new();
  let good = order_fixture("ANS-20261005-000001", "a@example.com", OrderStatus::Paid, "1", 1, 0);
  let (mut bad, _) = OrderRow::from_order(&order_fixture(
    "ANS-20261005-000002",
    "b@example.com",
    OrderStatus::Paid,
    "2",
    1,
    0,
  ));
  bad.status = "ON_HOLD".to_string();
  h.db.insert_order(bad).await.unwrap();
  h.store.orders().create_order(&good).await.unwrap();

  let listed = h.store.orders().orders();
  assert_eq!(listed.len(), 1);
  assert_eq!(listed[0].id, good.id);
}

#[tokio::test]
#[serial]
async fn test_change_feed_triggers_a_refetch() {
  setup_tracing();
  let h = Harness::new();
  let book = h.store.orders().clone();
  let listener = book.spawn_change_listener();

  // Written by another client straight to the backend.
  let order = order_fixture("ANS-20261006-000001", "a@example.com", OrderStatus::Paid, "4", 2, 0);
  let (header, items) = OrderRow::from_order(&order);
  h.db.insert_order(header).await.unwrap();
  h.db.insert_order_items(items).await.unwrap();
  assert!(eventually(|| book.get_order_by_id(order.id).is_some()).await);

  let patch = storefront::boundary::OrderStatusPatchRow {
    status: "SHIPPED".to_string(),
    tracking_number: Some("BD-55".to_string()),
    courier_name: Some("BlueDart".to_string()),
  };
  h.db.update_order(order.id, patch).await.unwrap();
  assert!(eventually(|| book
    .get_order_by_id(order.id)
    .is_some_and(|o| o.status == OrderStatus::Shipped))
  .await);

  listener.abort();
}
