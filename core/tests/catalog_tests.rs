// tests/catalog_tests.rs
mod common;

use common::*;
use serial_test::serial;
use std::sync::Arc;
use storefront::boundary::{OrderRow, ProductRow};
use storefront::cache::{CacheStore, MemoryCache, CATEGORIES_CACHE_KEY, PRODUCTS_CACHE_KEY};
use storefront::catalog::{default_categories, Bootstrap, CatalogStore, DELETE_PRODUCT_DENIED};
use storefront::gateway::{MemoryBackend, MemoryFaults, PersistenceGateway, PRODUCT_IMAGE_BUCKET};
use storefront::model::{Category, Money, OrderStatus, ProductDraft, ProductPatch};
use storefront::{CatalogQuery, GatewayError, SortOrder, StoreError};

fn catalog(db: MemoryBackend) -> (Arc<CatalogStore>, Arc<MemoryBackend>, Arc<MemoryCache>) {
  let db = Arc::new(db);
  let cache = Arc::new(MemoryCache::new());
  let gateway: Arc<dyn PersistenceGateway> = db.clone();
  let store: Arc<dyn CacheStore> = cache.clone();
  (Arc::new(CatalogStore::new(gateway, store)), db, cache)
}

fn seeded() -> MemoryBackend {
  MemoryBackend::new()
    .with_products(sample_product_rows())
    .with_categories(sample_category_rows())
}

fn draft(name: &str) -> ProductDraft {
  ProductDraft {
    name: name.to_string(),
    description: "Variable speed".to_string(),
    price: Money::from_minor(349_900),
    currency: "INR".to_string(),
    sku: "SKU-NEW".to_string(),
    stock: 5,
    category: "Drills".to_string(),
    image_url: String::new(),
  }
}

#[tokio::test]
#[serial]
async fn test_live_load_fills_lists_and_cache() {
  setup_tracing();
  let (store, _db, cache) = catalog(seeded());

  let outcome = store.bootstrap().await.unwrap();
  assert!(matches!(outcome, Bootstrap::Live));
  assert!(!store.is_loading());
  assert_eq!(store.error(), None);

  // Backend order is newest first.
  let ids: Vec<String> = store.products().into_iter().map(|p| p.id).collect();
  assert_eq!(ids, vec!["4", "3", "2", "1"]);
  assert_eq!(store.categories().len(), 4);
  assert_eq!(store.categories()[0].name, "Drills");

  assert!(cache.read(PRODUCTS_CACHE_KEY).unwrap().is_some());
  assert!(cache.read(CATEGORIES_CACHE_KEY).unwrap().is_some());
}

#[tokio::test]
#[serial]
async fn test_cached_lists_are_served_then_revalidated() {
  setup_tracing();
  let (warm, _, cache) = catalog(seeded());
  warm.load().await.unwrap();

  // A second process finds the cache warm while the backend has moved on.
  let mut rows = sample_product_rows();
  rows.push(product_row("5", "Laser Distance Meter", 2999, 40, "Measuring", 47, -1));
  let db = Arc::new(MemoryBackend::new().with_products(rows).with_categories(sample_category_rows()));
  let gateway: Arc<dyn PersistenceGateway> = db.clone();
  let cache_store: Arc<dyn CacheStore> = cache.clone();
  let store = Arc::new(CatalogStore::new(gateway, cache_store));

  let outcome = store.bootstrap().await.unwrap();
  assert_eq!(store.products().len(), 4);
  match outcome {
    Bootstrap::FromCache { revalidation } => revalidation.await.unwrap(),
    Bootstrap::Live => panic!("expected the cached catalog"),
  }
  assert_eq!(store.products().len(), 5);
  assert_eq!(store.products()[0].id, "5");
}

#[tokio::test]
#[serial]
async fn test_missing_categories_table_falls_back_to_defaults() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  db.update_faults(|f| f.categories_error = Some(MemoryFaults::table_missing("categories")));

  store.load().await.unwrap();
  assert_eq!(store.products().len(), 4);
  assert_eq!(store.categories(), default_categories());
}

#[tokio::test]
#[serial]
async fn test_product_failure_surfaces_setup_error() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  db.update_faults(|f| f.products_error = Some(MemoryFaults::table_missing("products")));

  let err = store.load().await.unwrap_err();
  assert!(matches!(err, StoreError::SetupRequired { ref table, .. } if table == "products"));
  assert!(err.setup_script().unwrap().contains("CREATE TABLE"));
  assert!(store.error().is_some());
  assert!(!store.is_loading());

  db.update_faults(|f| f.products_error = None);
  store.retry().await.unwrap();
  assert_eq!(store.error(), None);
  assert_eq!(store.products().len(), 4);
}

#[tokio::test]
#[serial]
async fn test_refresh_failure_keeps_products_on_screen() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  store.load().await.unwrap();

  db.update_faults(|f| f.products_error = Some(GatewayError::message("connection reset")));
  assert!(store.load().await.is_err());
  assert_eq!(store.products().len(), 4);
  assert_eq!(store.error(), None);
}

#[tokio::test]
#[serial]
async fn test_product_crud_refetches() {
  setup_tracing();
  let (store, _db, _) = catalog(seeded());
  store.load().await.unwrap();

  store.add_product(&draft("Impact Driver")).await.unwrap();
  let added = store
    .products()
    .into_iter()
    .find(|p| p.name == "Impact Driver")
    .expect("new product listed");
  assert_eq!(added.rating, 5.0);
  assert_eq!(added.price, Money::from_minor(349_900));

  let patch = ProductPatch {
    stock: Some(2),
    price: Some(Money::from_minor(299_900)),
    ..Default::default()
  };
  store.update_product(&added.id, &patch).await.unwrap();
  let updated = store.product(&added.id).unwrap();
  assert_eq!(updated.stock, 2);
  assert_eq!(updated.price, Money::from_minor(299_900));
  assert_eq!(updated.name, "Impact Driver");
  assert!(store.low_stock().iter().any(|p| p.id == added.id));

  store.delete_product(&added.id).await.unwrap();
  assert!(store.product(&added.id).is_none());
}

#[tokio::test]
#[serial]
async fn test_invalid_drafts_never_reach_the_backend() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  store.load().await.unwrap();

  let err = store.add_product(&draft("  ")).await.unwrap_err();
  assert!(matches!(err, StoreError::Validation(_)));
  let negative = ProductPatch {
    price: Some(Money::from_minor(-100)),
    ..Default::default()
  };
  assert!(store.update_product("1", &negative).await.is_err());
  assert_eq!(db.list_products().await.unwrap().len(), 4);
}

#[tokio::test]
#[serial]
async fn test_delete_denied_and_referenced() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  store.load().await.unwrap();

  db.update_faults(|f| f.deny_deletes = true);
  let err = store.delete_product("1").await.unwrap_err();
  assert!(matches!(err, StoreError::PermissionDenied(ref m) if m == DELETE_PRODUCT_DENIED));
  assert!(store.product("1").is_some());
  assert!(store.delete_category("cat-1").await.is_err());
  assert_eq!(store.categories().len(), 4);
}

#[tokio::test]
#[serial]
async fn test_products_in_order_history_cannot_be_deleted() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  store.load().await.unwrap();

  let (header, items) = OrderRow::from_order(&order_fixture(
    "ANS-20261010-000001",
    CUSTOMER_EMAIL,
    OrderStatus::Paid,
    "1",
    1,
    0,
  ));
  db.insert_order(header).await.unwrap();
  db.insert_order_items(items).await.unwrap();

  let err = store.delete_product("1").await.unwrap_err();
  assert!(matches!(err, StoreError::ReferencedByOrders));
  assert_eq!(err.to_string(), "Cannot delete: Product is part of an existing order history.");
  assert!(store.product("1").is_some());
  assert!(db.list_products().await.unwrap().iter().any(|p| p.id == "1"));

  // Unreferenced products still go.
  store.delete_product("2").await.unwrap();
  assert!(store.product("2").is_none());
}

#[tokio::test]
#[serial]
async fn test_writes_succeed_when_the_reload_fails() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());
  store.load().await.unwrap();

  db.update_faults(|f| f.listing_error = Some(GatewayError::message("connection reset")));

  store.add_product(&draft("Impact Driver")).await.unwrap();
  store.add_category("Measuring").await.unwrap();
  let patch = ProductPatch {
    stock: Some(9),
    ..Default::default()
  };
  store.update_product("1", &patch).await.unwrap();

  // Lists stay as they were until a reload succeeds.
  assert_eq!(store.products().len(), 4);
  assert_eq!(store.error(), None);

  db.update_faults(|f| f.listing_error = None);
  store.load().await.unwrap();
  assert!(store.products().iter().any(|p| p.name == "Impact Driver"));
  assert!(store.categories().iter().any(|c| c.name == "Measuring"));
  assert_eq!(store.product("1").unwrap().stock, 9);
}

#[tokio::test]
#[serial]
async fn test_category_add_and_delete() {
  setup_tracing();
  let (store, _db, _) = catalog(seeded());
  store.load().await.unwrap();

  store.add_category("  Measuring ").await.unwrap();
  assert!(store.categories().iter().any(|c| c.name == "Measuring"));
  assert!(matches!(
    store.add_category("Measuring").await.unwrap_err(),
    StoreError::Gateway(_)
  ));
  assert!(matches!(store.add_category("").await.unwrap_err(), StoreError::Validation(_)));

  store.delete_category("cat-1").await.unwrap();
  assert!(!store.categories().contains(&Category::new("cat-1", "Drills")));
  // Products keep their category name.
  assert_eq!(store.product("1").unwrap().category, "Drills");
}

#[tokio::test]
#[serial]
async fn test_upload_keeps_extension() {
  setup_tracing();
  let (store, db, _) = catalog(seeded());

  let url = store.upload_image("Drill Photo.JPG", vec![1, 2, 3]).await.unwrap();
  assert!(url.starts_with(&format!("memory://storage/{}/", PRODUCT_IMAGE_BUCKET)));
  assert!(url.ends_with(".jpg"));
  let path = url.rsplit('/').next().unwrap();
  assert_eq!(db.object(PRODUCT_IMAGE_BUCKET, path), Some(vec![1, 2, 3]));

  assert!(store.upload_image("empty.png", Vec::new()).await.is_err());
}

#[tokio::test]
#[serial]
async fn test_query_over_loaded_products() {
  setup_tracing();
  let (store, _db, _) = catalog(seeded());
  store.load().await.unwrap();

  let featured = store.query(&CatalogQuery {
    sort: SortOrder::Featured,
    ..Default::default()
  });
  assert_eq!(featured.items[0].id, "1");

  let saws = store.query(&CatalogQuery {
    category: Some("Saws".to_string()),
    search: "circular".to_string(),
    ..Default::default()
  });
  assert_eq!(saws.total_items, 1);

  let rows: Vec<ProductRow> = sample_product_rows();
  assert_eq!(store.low_stock().len(), rows.iter().filter(|r| r.stock < 10).count());
}
