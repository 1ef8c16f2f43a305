// core/src/cache.rs

//! Local key/value cache for the catalog and cart, one JSON document per key.

use crate::error::{Result, StoreError};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub const PRODUCTS_CACHE_KEY: &str = "products_cache";
pub const CATEGORIES_CACHE_KEY: &str = "categories_cache";
pub const CART_CACHE_KEY: &str = "cart_items";

pub trait CacheStore: Send + Sync + 'static {
  fn read(&self, key: &str) -> Result<Option<String>>;
  fn write(&self, key: &str, value: &str) -> Result<()>;
  fn remove(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryCache {
  entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CacheStore for MemoryCache {
  fn read(&self, key: &str) -> Result<Option<String>> {
    Ok(self.entries.read().get(key).cloned())
  }

  fn write(&self, key: &str, value: &str) -> Result<()> {
    self.entries.write().insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    self.entries.write().remove(key);
    Ok(())
  }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileCache {
  dir: PathBuf,
}

impl FileCache {
  pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
    let dir = dir.as_ref().to_path_buf();
    std::fs::create_dir_all(&dir)
      .map_err(|e| StoreError::Cache(format!("cannot create cache dir {}: {}", dir.display(), e)))?;
    Ok(Self { dir })
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }
}

impl CacheStore for FileCache {
  fn read(&self, key: &str) -> Result<Option<String>> {
    match std::fs::read_to_string(self.path_for(key)) {
      Ok(content) => Ok(Some(content)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(StoreError::Cache(format!("read {}: {}", key, e))),
    }
  }

  fn write(&self, key: &str, value: &str) -> Result<()> {
    // Write to a sibling file first so a crash never leaves half a document.
    let target = self.path_for(key);
    let staging = self.dir.join(format!("{}.json.tmp", key));
    std::fs::write(&staging, value).map_err(|e| StoreError::Cache(format!("write {}: {}", key, e)))?;
    std::fs::rename(&staging, &target).map_err(|e| StoreError::Cache(format!("write {}: {}", key, e)))
  }

  fn remove(&self, key: &str) -> Result<()> {
    match std::fs::remove_file(self.path_for(key)) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(StoreError::Cache(format!("remove {}: {}", key, e))),
    }
  }
}

/// A typed view over one cache key.
pub struct Cached<T> {
  store: Arc<dyn CacheStore>,
  key: &'static str,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> Cached<T> {
  pub fn new(store: Arc<dyn CacheStore>, key: &'static str) -> Self {
    Self {
      store,
      key,
      _marker: PhantomData,
    }
  }

  /// A missing, unreadable or corrupt entry all count as absent.
  pub fn load(&self) -> Option<T> {
    let raw = match self.store.read(self.key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key = self.key, error = %e, "Cache read failed.");
        return None;
      }
    };
    match serde_json::from_str(&raw) {
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key = self.key, error = %e, "Discarding corrupt cache entry.");
        None
      }
    }
  }

  pub fn save(&self, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    self.store.write(self.key, &raw)
  }

  /// Like `save`, but only logs failures. Cache writes never fail a user action.
  pub fn save_or_warn(&self, value: &T) {
    if let Err(e) = self.save(value) {
      warn!(key = self.key, error = %e, "Cache write failed.");
    }
  }

  pub fn clear(&self) -> Result<()> {
    self.store.remove(self.key)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn corrupt_entry_reads_as_absent() {
    let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
    store.write(CART_CACHE_KEY, "{not json").unwrap();
    let cached: Cached<Vec<u32>> = Cached::new(store, CART_CACHE_KEY);
    assert_eq!(cached.load(), None);
    cached.save(&vec![1, 2]).unwrap();
    assert_eq!(cached.load(), Some(vec![1, 2]));
  }

  #[test]
  fn file_cache_persists_between_handles() {
    let dir = std::env::temp_dir().join(format!("storefront-cache-{}", uuid::Uuid::new_v4()));
    let first = FileCache::open(&dir).unwrap();
    first.write(PRODUCTS_CACHE_KEY, "[]").unwrap();

    let second = FileCache::open(&dir).unwrap();
    assert_eq!(second.read(PRODUCTS_CACHE_KEY).unwrap().as_deref(), Some("[]"));
    second.remove(PRODUCTS_CACHE_KEY).unwrap();
    assert_eq!(first.read(PRODUCTS_CACHE_KEY).unwrap(), None);
    std::fs::remove_dir_all(dir).ok();
  }
}
