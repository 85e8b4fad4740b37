//! Request descriptors handed to the dispatcher.

use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

/// Everything needed to perform one API call.
///
/// The gate treats a descriptor as opaque, except that session strategies
/// rewrite `base` and `headers` on a per-attempt copy before dispatch.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Origin the path is resolved against. `None` means the transport default.
    pub base: Option<Url>,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            base: None,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Result<Self> {
        self.set_header(name, value)?;
        Ok(self)
    }

    /// Insert or replace a header, validating the value.
    pub fn set_header(&mut self, name: &'static str, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::decode(format!("invalid value for header {name}: {e}")))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(())
    }

    /// Resolve the absolute URL against the descriptor's base, or `fallback`.
    pub fn resolve(&self, fallback: &Url) -> Result<Url> {
        let base = self.base.as_ref().unwrap_or(fallback);
        let path = self.path.trim_start_matches('/');
        let mut url = base
            .join(path)
            .map_err(|e| Error::decode(format!("invalid request path {}: {e}", self.path)))?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(self.query.iter());
        }
        Ok(url)
    }
}
