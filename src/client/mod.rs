//! Billing API transport seam
//!
//! UI layers never talk to the network directly; they go through
//! [`CachedClient`](crate::cache::client::CachedClient), which drives an
//! [`ApiTransport`]. The REST implementation lives in [`rest`]; tests use
//! the programmable mock.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::error::Result;

#[cfg(test)]
pub mod mock;
pub mod rest;

#[cfg(test)]
pub use mock::MockTransport;
pub use rest::RestTransport;

/// One request to the billing backend.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }
}

/// Transport over the billing REST API.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Send a request and return the parsed JSON payload.
    async fn send(&self, request: &ApiRequest) -> Result<Value>;
}
