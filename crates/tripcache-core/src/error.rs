use thiserror::Error;

#[derive(Error, Debug)]
pub enum OfflineError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0}s: {1}")]
    Timeout(u64, String),

    #[error("Cache write rejected for {cache}: {reason}")]
    CacheWrite { cache: String, reason: String },

    #[error("Persistent store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Background sync is not supported on this platform")]
    SyncUnsupported,

    #[error("Invalid worker state: {0}")]
    Lifecycle(String),

    #[error("Invalid map bounds: {0}")]
    InvalidBounds(String),

    #[error("Install failed while caching {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OfflineError {
    /// True for failures where no response could be obtained at all.
    /// Timeouts take the same offline path as a dropped connection.
    pub fn is_network(&self) -> bool {
        matches!(self, OfflineError::Network(_) | OfflineError::Timeout(..))
    }

    pub fn cache_write(cache: &str, reason: impl ToString) -> Self {
        OfflineError::CacheWrite {
            cache: cache.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OfflineError>;
