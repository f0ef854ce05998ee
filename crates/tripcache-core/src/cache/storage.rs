use async_trait::async_trait;

use crate::error::Result;
use crate::http::Response;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named cache if it does not exist yet.
    async fn open(&self, name: &str) -> Result<()>;

    /// Stored response for `url` in the named cache, if any.
    async fn match_request(&self, name: &str, url: &str) -> Result<Option<Response>>;

    /// Store `response` under `url`, creating the cache if needed.
    async fn put(&self, name: &str, url: &str, response: Response) -> Result<()>;

    /// Drop a whole cache. Returns whether it existed.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Names of all existing caches.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Drop a single entry. Returns whether it existed.
    async fn delete_entry(&self, name: &str, url: &str) -> Result<bool>;

    /// URLs stored in the named cache.
    async fn entries(&self, name: &str) -> Result<Vec<String>>;
}

/// Versioned names of the caches owned by the controller. Every other
/// cache name is treated as a stale generation on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
    pub app_shell: String,
    pub tiles: String,
}

impl CacheNames {
    pub fn new(app_shell: impl Into<String>, tiles: impl Into<String>) -> Self {
        Self {
            app_shell: app_shell.into(),
            tiles: tiles.into(),
        }
    }

    pub fn is_current(&self, name: &str) -> bool {
        name == self.app_shell || name == self.tiles
    }
}

pub(crate) fn is_valid_cache_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
