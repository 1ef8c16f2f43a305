// core/src/catalog.rs

//! Products and categories: loaded from the backend, served from the local
//! cache while a background revalidation runs, and edited by admins with
//! write-through followed by a full refetch.

use crate::boundary::{NewCategoryRow, NewProductRow, ProductPatchRow};
use crate::cache::{CacheStore, Cached, CATEGORIES_CACHE_KEY, PRODUCTS_CACHE_KEY};
use crate::error::{Result, StoreError};
use crate::gateway::{PersistenceGateway, PRODUCT_IMAGE_BUCKET};
use crate::model::{Category, Product, ProductDraft, ProductPatch};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

pub const PAGE_SIZE: usize = 24;
pub const LOW_STOCK_THRESHOLD: u32 = 10;
/// Matches every category in a `CatalogQuery`.
pub const ALL_CATEGORIES: &str = "All";

pub const DELETE_PRODUCT_DENIED: &str = "Permission denied or product not found. Ensure you are an Admin.";
pub const DELETE_CATEGORY_DENIED: &str = "Failed to delete category.";

/// Shown when the categories table is missing or has never been loaded.
pub fn default_categories() -> Vec<Category> {
  ["Drills", "Saws", "Grinders", "Vacuums", "Measuring", "Hand Tools"]
    .iter()
    .enumerate()
    .map(|(idx, name)| Category::new(format!("def-{}", idx + 1), *name))
    .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
  /// Backend order.
  #[default]
  Default,
  Newest,
  Featured,
}

impl SortOrder {
  /// Reads the `filter` query value of the storefront route.
  pub fn from_filter(filter: Option<&str>) -> Self {
    match filter {
      Some("new") => SortOrder::Newest,
      Some("featured") => SortOrder::Featured,
      _ => SortOrder::Default,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogQuery {
  pub category: Option<String>,
  pub search: String,
  pub sort: SortOrder,
  /// 1-based; 0 is treated as 1.
  pub page: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: usize,
  pub total_pages: usize,
  pub total_items: usize,
}

/// Filters, sorts and paginates `products` for the storefront grid.
pub fn query_products(products: &[Product], query: &CatalogQuery) -> Page<Product> {
  let needle = query.search.trim().to_lowercase();
  let category = query
    .category
    .as_deref()
    .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES);

  let mut matched: Vec<&Product> = products
    .iter()
    .filter(|p| category.map_or(true, |c| p.category == c))
    .filter(|p| {
      needle.is_empty() || p.name.to_lowercase().contains(&needle) || p.description.to_lowercase().contains(&needle)
    })
    .collect();

  match query.sort {
    SortOrder::Default => {}
    SortOrder::Newest => matched.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
    SortOrder::Featured => matched.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal)),
  }

  let total_items = matched.len();
  let total_pages = total_items.div_ceil(PAGE_SIZE).max(1);
  let page = query.page.clamp(1, total_pages);
  let items = matched
    .into_iter()
    .skip((page - 1) * PAGE_SIZE)
    .take(PAGE_SIZE)
    .cloned()
    .collect();

  Page {
    items,
    page,
    total_pages,
    total_items,
  }
}

/// How `bootstrap` produced the first lists.
#[derive(Debug)]
pub enum Bootstrap {
  /// Served from the local cache; the handle finishes when the backend refresh lands.
  FromCache { revalidation: JoinHandle<()> },
  /// Loaded straight from the backend.
  Live,
}

#[derive(Debug, Default)]
struct CatalogState {
  products: Vec<Product>,
  categories: Vec<Category>,
  loading: bool,
  error: Option<String>,
}

pub struct CatalogStore {
  db: Arc<dyn PersistenceGateway>,
  products_cache: Cached<Vec<Product>>,
  categories_cache: Cached<Vec<Category>>,
  state: RwLock<CatalogState>,
}

impl CatalogStore {
  pub fn new(db: Arc<dyn PersistenceGateway>, cache: Arc<dyn CacheStore>) -> Self {
    Self {
      db,
      products_cache: Cached::new(Arc::clone(&cache), PRODUCTS_CACHE_KEY),
      categories_cache: Cached::new(cache, CATEGORIES_CACHE_KEY),
      state: RwLock::new(CatalogState::default()),
    }
  }

  pub fn products(&self) -> Vec<Product> {
    self.state.read().products.clone()
  }

  pub fn categories(&self) -> Vec<Category> {
    self.state.read().categories.clone()
  }

  pub fn product(&self, id: &str) -> Option<Product> {
    self.state.read().products.iter().find(|p| p.id == id).cloned()
  }

  pub fn is_loading(&self) -> bool {
    self.state.read().loading
  }

  /// The message for the retry panel, if the last load failed with nothing to show.
  pub fn error(&self) -> Option<String> {
    self.state.read().error.clone()
  }

  pub fn query(&self, query: &CatalogQuery) -> Page<Product> {
    query_products(&self.state.read().products, query)
  }

  pub fn low_stock(&self) -> Vec<Product> {
    self
      .state
      .read()
      .products
      .iter()
      .filter(|p| p.stock < LOW_STOCK_THRESHOLD)
      .cloned()
      .collect()
  }

  /// Serves cached lists immediately when both are present, else loads from the backend.
  pub async fn bootstrap(self: &Arc<Self>) -> Result<Bootstrap> {
    if let (Some(products), Some(categories)) = (self.products_cache.load(), self.categories_cache.load()) {
      info!(products = products.len(), categories = categories.len(), "Serving catalog from cache.");
      {
        let mut state = self.state.write();
        state.products = products;
        state.categories = categories;
        state.loading = false;
      }
      let store = Arc::clone(self);
      let revalidation = tokio::spawn(async move {
        if let Err(e) = store.load_inner(true).await {
          warn!(error = %e, "Background catalog refresh failed.");
        }
      });
      return Ok(Bootstrap::FromCache { revalidation });
    }

    self.load().await?;
    Ok(Bootstrap::Live)
  }

  /// Fetches products and categories concurrently and replaces both lists.
  pub async fn load(&self) -> Result<()> {
    self.load_inner(false).await
  }

  /// Manual retry from the error panel.
  pub async fn retry(&self) -> Result<()> {
    self.load_inner(false).await
  }

  #[instrument(name = "CatalogStore::load", skip(self), err(Display))]
  async fn load_inner(&self, background: bool) -> Result<()> {
    {
      let mut state = self.state.write();
      if !background {
        state.loading = true;
      }
      state.error = None;
    } // guard dropped

    let (products, categories) = tokio::join!(self.db.list_products(), self.db.list_categories());

    let products = match products {
      Ok(rows) => rows.into_iter().map(Product::from).collect::<Vec<_>>(),
      Err(e) => {
        let err = StoreError::classify("products", e);
        error!(error = %err, "Failed to fetch products.");
        let mut state = self.state.write();
        if state.products.is_empty() {
          state.error = Some(err.user_message());
        }
        state.loading = false;
        return Err(err);
      }
    };
    self.products_cache.save_or_warn(&products);

    let fetched_categories = match categories {
      Ok(rows) => {
        let categories: Vec<Category> = rows.into_iter().map(Category::from).collect();
        self.categories_cache.save_or_warn(&categories);
        Some(categories)
      }
      Err(e) if e.is_table_missing() => {
        debug!("Categories table missing, keeping defaults.");
        None
      }
      Err(e) => {
        error!(error = %e, "Failed to fetch categories.");
        None
      }
    };

    let mut state = self.state.write();
    info!(products = products.len(), background, "Catalog loaded.");
    state.products = products;
    match fetched_categories {
      Some(categories) => state.categories = categories,
      None if state.categories.is_empty() => state.categories = default_categories(),
      None => {}
    }
    state.loading = false;
    Ok(())
  }

  /// The write already landed; a failed refresh only leaves the lists stale.
  async fn refetch_after_write(&self) {
    if let Err(e) = self.load().await {
      warn!(error = %e, "Saved, but reloading the catalog failed.");
    }
  }

  #[instrument(skip(self, draft), fields(name = %draft.name), err(Display))]
  pub async fn add_product(&self, draft: &ProductDraft) -> Result<()> {
    draft.validate()?;
    self
      .db
      .insert_product(NewProductRow::from(draft))
      .await
      .map_err(|e| StoreError::classify("products", e))?;
    self.refetch_after_write().await;
    Ok(())
  }

  #[instrument(skip(self, patch), err(Display))]
  pub async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<()> {
    patch.validate()?;
    if patch.is_empty() {
      return Ok(());
    }
    self
      .db
      .update_product(id, ProductPatchRow::from(patch))
      .await
      .map_err(|e| StoreError::classify("products", e))?;
    self.refetch_after_write().await;
    Ok(())
  }

  /// Deletes on the backend and, only if a row actually went away, locally too.
  #[instrument(skip(self), err(Display))]
  pub async fn delete_product(&self, id: &str) -> Result<()> {
    let deleted = self
      .db
      .delete_product(id)
      .await
      .map_err(|e| StoreError::classify("products", e))?;
    if deleted.is_empty() {
      return Err(StoreError::PermissionDenied(DELETE_PRODUCT_DENIED.to_string()));
    }

    let products = {
      let mut state = self.state.write();
      state.products.retain(|p| p.id != id);
      state.products.clone()
    };
    self.products_cache.save_or_warn(&products);
    Ok(())
  }

  #[instrument(skip(self), err(Display))]
  pub async fn add_category(&self, name: &str) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
      return Err(StoreError::Validation("Category name is required".to_string()));
    }
    self
      .db
      .insert_category(NewCategoryRow { name: name.to_string() })
      .await
      .map_err(|e| StoreError::classify("categories", e))?;
    self.refetch_after_write().await;
    Ok(())
  }

  /// Products keep their category name; nothing cascades.
  #[instrument(skip(self), err(Display))]
  pub async fn delete_category(&self, id: &str) -> Result<()> {
    let deleted = self
      .db
      .delete_category(id)
      .await
      .map_err(|e| StoreError::classify("categories", e))?;
    if deleted.is_empty() {
      return Err(StoreError::PermissionDenied(DELETE_CATEGORY_DENIED.to_string()));
    }

    let categories = {
      let mut state = self.state.write();
      state.categories.retain(|c| c.id != id);
      state.categories.clone()
    };
    self.categories_cache.save_or_warn(&categories);
    Ok(())
  }

  /// Uploads an image under a random name that keeps the original extension.
  #[instrument(skip(self, bytes), fields(size = bytes.len()), err(Display))]
  pub async fn upload_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<String> {
    if bytes.is_empty() {
      return Err(StoreError::Validation("Image file is empty".to_string()));
    }
    let extension = std::path::Path::new(file_name)
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| ext.to_ascii_lowercase())
      .unwrap_or_else(|| "bin".to_string());
    let path = format!("{}.{}", Uuid::new_v4().simple(), extension);
    let url = self.db.upload_object(PRODUCT_IMAGE_BUCKET, &path, bytes).await?;
    info!(%url, "Product image uploaded.");
    Ok(url)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Money;
  use chrono::{TimeZone, Utc};

  fn product(id: usize, category: &str, rating: f32) -> Product {
    Product {
      id: id.to_string(),
      name: format!("Tool {}", id),
      description: if id % 2 == 0 { "Brushless motor".into() } else { "Corded".into() },
      price: Money::from_minor(100_000),
      currency: "INR".into(),
      sku: format!("SKU-{}", id),
      stock: id as u32,
      category: category.into(),
      image_url: String::new(),
      rating,
      created_at: Utc.timestamp_opt(1_700_000_000 + id as i64, 0).single(),
    }
  }

  #[test]
  fn pagination_clamps_and_counts() {
    let products: Vec<Product> = (1..=50).map(|i| product(i, "Drills", 4.0)).collect();
    let page = query_products(&products, &CatalogQuery::default());
    assert_eq!(page.page, 1);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.items.len(), 24);

    let last = query_products(&products, &CatalogQuery { page: 99, ..Default::default() });
    assert_eq!(last.page, 3);
    assert_eq!(last.items.len(), 2);

    let empty = query_products(&[], &CatalogQuery::default());
    assert_eq!((empty.page, empty.total_pages, empty.total_items), (1, 1, 0));
  }

  #[test]
  fn filters_by_category_and_search() {
    let products = vec![product(1, "Drills", 4.0), product(2, "Saws", 4.5), product(4, "Drills", 3.0)];
    let query = CatalogQuery {
      category: Some("Drills".into()),
      search: "BRUSHLESS".into(),
      ..Default::default()
    };
    let page = query_products(&products, &query);
    assert_eq!(page.items.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["4"]);

    let all = CatalogQuery {
      category: Some(ALL_CATEGORIES.into()),
      ..Default::default()
    };
    assert_eq!(query_products(&products, &all).total_items, 3);
  }

  #[test]
  fn sorts_by_filter() {
    let products = vec![product(1, "Drills", 4.0), product(2, "Saws", 4.9), product(3, "Drills", 4.5)];
    let newest = query_products(&products, &CatalogQuery { sort: SortOrder::from_filter(Some("new")), ..Default::default() });
    assert_eq!(newest.items[0].id, "3");
    let featured = query_products(&products, &CatalogQuery { sort: SortOrder::from_filter(Some("featured")), ..Default::default() });
    assert_eq!(featured.items[0].id, "2");
  }

  #[test]
  fn default_category_ids() {
    let defaults = default_categories();
    assert_eq!(defaults.len(), 6);
    assert_eq!(defaults[0], Category::new("def-1", "Drills"));
    assert_eq!(defaults[5], Category::new("def-6", "Hand Tools"));
  }
}
