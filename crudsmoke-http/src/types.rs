use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Bytes,
    /// Response headers (lowercased header names). Multiple values are joined with ", ".
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_utf8(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: http::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    fn new(method: http::Method, url: String) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: Bytes::new(),
            timeout: None,
        }
    }

    fn with_json<T: Serialize + ?Sized>(method: http::Method, url: String, body: &T) -> Result<Self> {
        let body = serde_json::to_vec(body)?;
        let mut req = Self::new(method, url);
        req.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        req.body = Bytes::from(body);
        Ok(req)
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(http::Method::GET, url.into())
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(http::Method::DELETE, url.into())
    }

    pub fn post_json<T: Serialize + ?Sized>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::with_json(http::Method::POST, url.into(), body)
    }

    pub fn put_json<T: Serialize + ?Sized>(url: impl Into<String>, body: &T) -> Result<Self> {
        Self::with_json(http::Method::PUT, url.into(), body)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
