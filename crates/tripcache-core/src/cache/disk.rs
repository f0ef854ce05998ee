use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use super::storage::{is_valid_cache_name, CacheStorage};
use crate::error::{OfflineError, Result};
use crate::http::Response;

/// Metadata written next to each stored body.
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    /// File name of the body this head belongs to.
    body: String,
    response: Response,
}

/// Cache storage on the local filesystem.
///
/// Layout: `<root>/<cache-name>/<sha256(url)>.json` holds the URL, the
/// response head and the name of its body file,
/// `<sha256(url)>-<sha256(body)>.body`. Bodies are written before the
/// metadata is renamed into place, so a head only ever points at a
/// complete body of its own. The previous body is removed afterwards.
pub struct DiskCacheStorage {
    root: PathBuf,
}

impl DiskCacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn cache_dir(&self, name: &str) -> Result<PathBuf> {
        if !is_valid_cache_name(name) {
            return Err(OfflineError::cache_write(name, "invalid cache name"));
        }
        Ok(self.root.join(name))
    }

    fn entry_stem(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    fn body_file_name(stem: &str, body: &[u8]) -> String {
        format!("{}-{}.body", stem, hex::encode(Sha256::digest(body)))
    }

    async fn read_meta(dir: &Path, stem: &str) -> Result<Option<EntryMeta>> {
        match tokio::fs::read(dir.join(format!("{}.json", stem))).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `contents` beside `path` and rename it over `path`.
    async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await
    }

    async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl CacheStorage for DiskCacheStorage {
    async fn open(&self, name: &str) -> Result<()> {
        let dir = self.cache_dir(name)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| OfflineError::cache_write(name, e))
    }

    async fn match_request(&self, name: &str, url: &str) -> Result<Option<Response>> {
        let dir = self.cache_dir(name)?;
        let stem = Self::entry_stem(url);

        let Some(meta) = Self::read_meta(&dir, &stem).await? else {
            return Ok(None);
        };
        if meta.url != url {
            debug!(cache = name, url, stored = %meta.url, "Cache entry digest collision");
            return Ok(None);
        }

        // The body may have been replaced by a concurrent overwrite.
        let body = match tokio::fs::read(dir.join(&meta.body)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut response = meta.response;
        response.body = body;
        Ok(Some(response))
    }

    async fn put(&self, name: &str, url: &str, response: Response) -> Result<()> {
        let dir = self.cache_dir(name)?;
        let stem = Self::entry_stem(url);
        let write_err = |e: std::io::Error| OfflineError::cache_write(name, e);

        tokio::fs::create_dir_all(&dir).await.map_err(write_err)?;
        let previous = Self::read_meta(&dir, &stem).await.ok().flatten();

        let body_name = Self::body_file_name(&stem, &response.body);
        Self::write_atomic(&dir.join(&body_name), &response.body)
            .await
            .map_err(write_err)?;

        let meta = EntryMeta {
            url: url.to_string(),
            body: body_name,
            response,
        };
        let contents = serde_json::to_vec(&meta)?;
        Self::write_atomic(&dir.join(format!("{}.json", stem)), &contents)
            .await
            .map_err(write_err)?;

        if let Some(previous) = previous.filter(|p| p.body != meta.body) {
            if let Err(e) = Self::remove_if_exists(&dir.join(&previous.body)).await {
                debug!(cache = name, url, error = %e, "Failed to remove replaced body");
            }
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let dir = self.cache_dir(name)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_valid_cache_name(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_entry(&self, name: &str, url: &str) -> Result<bool> {
        let dir = self.cache_dir(name)?;
        let stem = Self::entry_stem(url);
        let meta = Self::read_meta(&dir, &stem).await.ok().flatten();
        let existed = Self::remove_if_exists(&dir.join(format!("{}.json", stem))).await?;
        if let Some(meta) = meta {
            Self::remove_if_exists(&dir.join(&meta.body)).await?;
        }
        Ok(existed)
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.cache_dir(name)?;
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut urls = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<EntryMeta>(&bytes) {
                Ok(meta) => urls.push(meta.url),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        Ok(urls)
    }
}
