//! Request and response values passed between the controller, the
//! network seam, and cache storage.
//!
//! These are plain data so they can be stored, cloned, and compared
//! without a live connection behind them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
        }
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    /// Only GET requests are ever answered from or written to a cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::Get
    }
}

/// How the response relates to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin, fully readable.
    Basic,
    /// Cross-origin but readable.
    Cors,
    /// Cross-origin, body and status hidden.
    Opaque,
    /// Synthetic error response.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub response_type: ResponseType,
    #[serde(default)]
    pub redirected: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, response_type: ResponseType, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            response_type,
            redirected: false,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// A same-origin 200 response wrapping a JSON document.
    pub fn json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(200, ResponseType::Basic, body).with_header("content-type", "application/json"))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_str())
    }

    /// Any 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Exactly 200, same-origin, and not the product of a redirect.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200 && self.response_type == ResponseType::Basic && !self.redirected
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_basic_200_is_cacheable() {
        assert!(Response::new(200, ResponseType::Basic, "ok").is_cacheable());
        assert!(!Response::new(200, ResponseType::Cors, "ok").is_cacheable());
        assert!(!Response::new(200, ResponseType::Opaque, "").is_cacheable());
        assert!(!Response::new(204, ResponseType::Basic, "").is_cacheable());
        assert!(!Response::new(404, ResponseType::Basic, "").is_cacheable());

        let mut redirected = Response::new(200, ResponseType::Basic, "ok");
        redirected.redirected = true;
        assert!(!redirected.is_cacheable());
    }

    #[test]
    fn test_is_ok_covers_2xx() {
        assert!(Response::new(204, ResponseType::Cors, "").is_ok());
        assert!(!Response::new(304, ResponseType::Basic, "").is_ok());
        assert!(!Response::new(500, ResponseType::Basic, "").is_ok());
    }

    #[test]
    fn test_json_response_headers() {
        let response = Response::json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.text(), r#"{"a":1}"#);
        assert!(response.is_cacheable());
    }

    #[test]
    fn test_only_get_requests_are_cacheable() {
        assert!(Request::get("https://app.test/").is_cacheable());
        assert!(!Request::new(Method::Post, "https://app.test/api/expenses").is_cacheable());
    }
}
