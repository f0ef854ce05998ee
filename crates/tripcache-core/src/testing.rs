//! Scripted collaborators for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::cache::{CacheStorage, MemoryCacheStorage};
use crate::error::{OfflineError, Result};
use crate::fetch::Fetcher;
use crate::http::{Request, Response, ResponseType};
use crate::store::StoreBackend;

enum Reply {
    Respond(Response),
    Fail,
}

/// Fetcher answering from a script and recording every request.
/// Unscripted URLs fail with a network error.
#[derive(Default)]
pub struct StubFetcher {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: Response) {
        self.replies
            .lock()
            .unwrap()
            .insert(url.to_string(), Reply::Respond(response));
    }

    /// Same-origin 200 with the given body.
    pub fn ok(&self, url: &str, body: &str) {
        self.respond(url, Response::new(200, ResponseType::Basic, body));
    }

    pub fn fail(&self, url: &str) {
        self.replies.lock().unwrap().insert(url.to_string(), Reply::Fail);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        self.calls.lock().unwrap().push(request.url.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(OfflineError::Network(format!("offline: {}", request.url)));
        }
        match self.replies.lock().unwrap().get(&request.url) {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail) | None => Err(OfflineError::Network(format!("unreachable: {}", request.url))),
        }
    }
}

/// Store backend whose medium is always unavailable.
pub struct FailingBackend;

#[async_trait]
impl StoreBackend for FailingBackend {
    async fn read(&self, _namespace: &str, _key: &str) -> Result<Option<Value>> {
        Err(OfflineError::StoreUnavailable("medium offline".to_string()))
    }

    async fn write(&self, _namespace: &str, _key: &str, _value: Value) -> Result<()> {
        Err(OfflineError::StoreUnavailable("medium offline".to_string()))
    }

    async fn delete(&self, _namespace: &str, _key: &str) -> Result<()> {
        Err(OfflineError::StoreUnavailable("medium offline".to_string()))
    }

    async fn clear(&self, _namespace: &str) -> Result<()> {
        Err(OfflineError::StoreUnavailable("medium offline".to_string()))
    }

    async fn keys(&self, _namespace: &str) -> Result<Vec<String>> {
        Err(OfflineError::StoreUnavailable("medium offline".to_string()))
    }
}

/// Cache storage that reads normally but rejects every write.
#[derive(Clone, Default)]
pub struct ReadOnlyCache {
    pub inner: MemoryCacheStorage,
}

#[async_trait]
impl CacheStorage for ReadOnlyCache {
    async fn open(&self, name: &str) -> Result<()> {
        self.inner.open(name).await
    }

    async fn match_request(&self, name: &str, url: &str) -> Result<Option<Response>> {
        self.inner.match_request(name, url).await
    }

    async fn put(&self, name: &str, _url: &str, _response: Response) -> Result<()> {
        Err(OfflineError::cache_write(name, "quota exceeded"))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.inner.delete(name).await
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete_entry(&self, name: &str, url: &str) -> Result<bool> {
        self.inner.delete_entry(name, url).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<String>> {
        self.inner.entries(name).await
    }
}
