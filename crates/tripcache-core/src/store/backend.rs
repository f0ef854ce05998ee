use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::error::{OfflineError, Result};

/// Raw namespaced storage. Single-key reads and writes are atomic; nothing
/// spanning two calls is.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>>;
    async fn write(&self, namespace: &str, key: &str, value: Value) -> Result<()>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<()>;
    async fn clear(&self, namespace: &str) -> Result<()>;
    async fn keys(&self, namespace: &str) -> Result<Vec<String>>;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Volatile backend. Clones share the same data, so a second `LocalStore`
/// built over a clone sees everything the first one wrote.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<HashMap<String, HashMap<String, Value>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, HashMap<String, Value>>>> {
        self.data
            .lock()
            .map_err(|_| OfflineError::StoreUnavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .lock()?
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .cloned())
    }

    async fn write(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        self.lock()?
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        if let Some(ns) = self.lock()?.get_mut(namespace) {
            ns.remove(key);
        }
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        self.lock()?.remove(namespace);
        Ok(())
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .get(namespace)
            .map(|ns| ns.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// File backend
// ============================================================================

/// Keeps each namespace as `<dir>/<namespace>.json`, a single JSON object
/// mapping keys to values. Writes go to a temp file that is renamed over
/// the document.
pub struct FileBackend {
    dir: PathBuf,
    // Serializes read-modify-write of the namespace documents.
    write_lock: AsyncMutex<()>,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: AsyncMutex::new(()),
        })
    }

    fn document_path(&self, namespace: &str) -> Result<PathBuf> {
        let valid = !namespace.is_empty()
            && namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !namespace.starts_with('.');
        if !valid {
            return Err(OfflineError::StoreUnavailable(format!(
                "invalid namespace name: {:?}",
                namespace
            )));
        }
        Ok(self.dir.join(format!("{}.json", namespace)))
    }

    async fn load(&self, namespace: &str) -> Result<BTreeMap<String, Value>> {
        let path = self.document_path(namespace)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                OfflineError::StoreUnavailable(format!("corrupt store document {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(OfflineError::StoreUnavailable(format!(
                "failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn persist(&self, namespace: &str, doc: &BTreeMap<String, Value>) -> Result<()> {
        let path = self.document_path(namespace)?;
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(doc)?;
        let io_err = |e: std::io::Error| {
            OfflineError::StoreUnavailable(format!("failed to write {}: {}", path.display(), e))
        };
        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;
        debug!(namespace, entries = doc.len(), "Store document written");
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for FileBackend {
    async fn read(&self, namespace: &str, key: &str) -> Result<Option<Value>> {
        Ok(self.load(namespace).await?.remove(key))
    }

    async fn write(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load(namespace).await?;
        doc.insert(key.to_string(), value);
        self.persist(namespace, &doc).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load(namespace).await?;
        if doc.remove(key).is_some() {
            self.persist(namespace, &doc).await?;
        }
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.document_path(namespace)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OfflineError::StoreUnavailable(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        Ok(self.load(namespace).await?.into_keys().collect())
    }
}
