//! Network seam.
//!
//! `Fetcher` is the only way the offline layer reaches the network, so the
//! controller and the tile manager can be driven by a scripted fetcher in
//! tests and by `HttpFetcher` in production.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{OfflineError, Result};
use crate::http::{Method, Request, Response, ResponseType};

/// Default per-request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request. An `Err` means no response could be obtained;
    /// HTTP error statuses come back as `Ok` responses.
    async fn fetch(&self, request: &Request) -> Result<Response>;
}

/// `Fetcher` backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Option<Url>,
    timeout_secs: u64,
}

impl HttpFetcher {
    /// Create a fetcher that classifies responses relative to `origin`.
    /// With no origin every response is treated as cross-origin.
    pub fn new(origin: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| OfflineError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let origin = match origin {
            Some(o) => Some(
                Url::parse(o)
                    .map_err(|e| OfflineError::Network(format!("Invalid origin {}: {}", o, e)))?,
            ),
            None => None,
        };

        Ok(Self {
            client,
            origin,
            timeout_secs,
        })
    }

    fn response_type(&self, url: &Url) -> ResponseType {
        match &self.origin {
            Some(origin) if origin.origin() == url.origin() => ResponseType::Basic,
            _ => ResponseType::Cors,
        }
    }

    fn classify(&self, err: reqwest::Error, url: &str) -> OfflineError {
        if err.is_timeout() {
            OfflineError::Timeout(self.timeout_secs, url.to_string())
        } else {
            OfflineError::Network(format!("{}: {}", url, err))
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let response = self
            .client
            .request(method, &request.url)
            .send()
            .await
            .map_err(|e| self.classify(e, &request.url))?;

        let final_url = response.url().clone();
        let redirected = Url::parse(&request.url).ok().as_ref() != Some(&final_url);
        let status = response.status().as_u16();
        let response_type = self.response_type(&final_url);

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(e, &request.url))?;

        debug!(
            url = %request.url,
            status,
            ?response_type,
            redirected,
            bytes = body.len(),
            "Fetched"
        );

        Ok(Response {
            status,
            response_type,
            redirected,
            headers,
            body: body.to_vec(),
        })
    }
}
