use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::backend::StoreBackend;
use crate::error::Result;

/// Namespaced key-value store.
///
/// Reads never fail: a missing key, a null value, an undecodable value or an
/// unavailable backend all yield the caller's fallback. Writes surface
/// backend failures, since losing them silently would lose data.
///
/// `merge` is a read followed by a write and is not atomic. Concurrent
/// merges on one key are last-write-wins; callers that need an atomic
/// merge must serialize externally.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn StoreBackend>,
    namespace: String,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn StoreBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Another namespace on the same backend.
    pub fn scoped(&self, namespace: impl Into<String>) -> Self {
        Self::new(Arc::clone(&self.backend), namespace)
    }

    /// Raw lookup. `None` for absent, null, or unreadable entries.
    pub async fn get_value(&self, key: &str) -> Option<Value> {
        match self.backend.read(&self.namespace, key).await {
            Ok(Some(Value::Null)) | Ok(None) => None,
            Ok(Some(value)) => Some(value),
            Err(e) => {
                warn!(namespace = %self.namespace, key, error = %e, "Store read failed, using fallback");
                None
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str, fallback: T) -> T {
        let Some(value) = self.get_value(key).await else {
            return fallback;
        };
        match serde_json::from_value(value) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(namespace = %self.namespace, key, error = %e, "Stored value has unexpected shape");
                fallback
            }
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.backend.write(&self.namespace, key, value).await
    }

    /// Shallow merge: top-level fields of `partial` replace or extend the
    /// stored object's top-level fields. A missing or non-object stored
    /// value is treated as `{}`.
    pub async fn merge(&self, key: &str, partial: Map<String, Value>) -> Result<Value> {
        let mut current = match self.get_value(key).await {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        for (field, value) in partial {
            current.insert(field, value);
        }
        let merged = Value::Object(current);
        self.backend
            .write(&self.namespace, key, merged.clone())
            .await?;
        Ok(merged)
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.backend.delete(&self.namespace, key).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.backend.clear(&self.namespace).await
    }

    /// Keys in no particular order.
    pub async fn list_keys(&self) -> Result<Vec<String>> {
        self.backend.keys(&self.namespace).await
    }
}
