//! Programmable mock transport for cache and retry tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use super::{ApiRequest, ApiTransport};
use crate::error::{ApiError, Result};

/// In-memory transport with scriptable responses and failure counts.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, Value>>,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn route(method: &Method, path: &str) -> String {
        format!("{} {}", method, path)
    }

    /// Script the response for a method + path.
    pub fn respond(&self, method: &Method, path: &str, value: Value) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(Self::route(method, path), value);
        }
    }

    /// Make the next `times` calls to a route fail with a network error.
    pub fn fail_times(&self, method: &Method, path: &str, times: usize) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(Self::route(method, path), times);
        }
    }

    /// How many times a route was called.
    pub fn call_count(&self, method: &Method, path: &str) -> usize {
        self.calls
            .lock()
            .map(|calls| {
                calls
                    .iter()
                    .filter(|r| r.method == *method && r.path == path)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn send(&self, request: &ApiRequest) -> Result<Value> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }

        let route = Self::route(&request.method, &request.path);

        if let Ok(mut failures) = self.failures.lock()
            && let Some(remaining) = failures.get_mut(&route)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ApiError::Network("simulated connection reset".to_string()).into());
        }

        let scripted = self
            .responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(&route).cloned());
        Ok(scripted.unwrap_or_else(|| json!({"ok": true})))
    }
}
