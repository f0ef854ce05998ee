use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::storage::CacheStorage;
use crate::error::{OfflineError, Result};
use crate::http::Response;

type Caches = BTreeMap<String, HashMap<String, Response>>;

/// In-memory cache storage. Clones share the same caches.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    caches: Arc<Mutex<Caches>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Caches>> {
        self.caches
            .lock()
            .map_err(|_| OfflineError::cache_write("*", "cache storage lock poisoned"))
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        self.lock()?.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn match_request(&self, name: &str, url: &str) -> Result<Option<Response>> {
        Ok(self
            .lock()?
            .get(name)
            .and_then(|cache| cache.get(url))
            .cloned())
    }

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<()> {
        self.lock()?
            .entry(name.to_string())
            .or_default()
            .insert(url.to_string(), response);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn delete_entry(&self, name: &str, url: &str) -> Result<bool> {
        Ok(self
            .lock()?
            .get_mut(name)
            .map(|cache| cache.remove(url).is_some())
            .unwrap_or(false))
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .get(name)
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default())
    }
}
