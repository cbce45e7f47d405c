//! Read-through caching wrapper for the API transport
//!
//! Sits between UI callers and the network: idempotent reads are served from
//! the response cache when fresh, refetched (with quality-adaptive retries)
//! when not, and mutations invalidate the entries under their endpoint.

use std::sync::{Arc, Mutex};

use reqwest::Method;
use serde_json::Value;

use crate::cache::storage::ResponseCache;
use crate::cache::{CacheKind, is_exempt};
use crate::client::{ApiRequest, ApiTransport};
use crate::error::{Error, Result};
use crate::net::retry::{RetryExecutor, RetryOptions};

/// Caching wrapper for any [`ApiTransport`] implementation.
///
/// The cache can be disabled at construction (kiosk setups with shared
/// terminals run uncached). The store is wrapped in a Mutex for
/// thread-safety; correctness across concurrent callers relies on
/// last-write-wins, not locking.
pub struct CachedClient<T: ApiTransport> {
    transport: Arc<T>,
    cache: Option<Mutex<ResponseCache>>,
    retry: RetryExecutor,
    exempt: Vec<String>,
    seller_id: Option<String>,
}

impl<T: ApiTransport> CachedClient<T> {
    /// Wrap a transport. With `enabled`, opens the store at the default
    /// location; a store that fails to open silently disables caching.
    pub fn new(transport: T, retry: RetryExecutor, enabled: bool) -> Self {
        let cache = if enabled {
            ResponseCache::open().ok().map(Mutex::new)
        } else {
            None
        };
        Self {
            transport: Arc::new(transport),
            cache,
            retry,
            exempt: Vec::new(),
            seller_id: None,
        }
    }

    /// Use a specific store instance (tests, custom policy/clock).
    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(Mutex::new(cache));
        self
    }

    /// Scope every cache entry to a tenant.
    pub fn with_seller(mut self, seller_id: impl Into<String>) -> Self {
        self.seller_id = Some(seller_id.into());
        self
    }

    /// Add exempt path substrings on top of the built-in list.
    pub fn with_exempt(mut self, extra: Vec<String>) -> Self {
        self.exempt = extra;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<Value> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None).await
    }

    pub async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        self.request_with(method, path, body, RetryOptions::default())
            .await
    }

    /// The full request path: cache read-through, retry-wrapped network
    /// send, write-back, and mutation invalidation. Exempt endpoints bypass
    /// the cache entirely, for any method.
    pub async fn request_with(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RetryOptions<Error>,
    ) -> Result<Value> {
        let exempt = is_exempt(path, &self.exempt);
        let cacheable = method == Method::GET && !exempt;

        if cacheable && let Some(cached) = self.get_cached(&method, path, body.as_ref()) {
            log::debug!("Cache hit: {}", path);
            return Ok(cached);
        }

        let request = ApiRequest {
            method: method.clone(),
            path: path.to_string(),
            body: body.clone(),
        };
        let transport = Arc::clone(&self.transport);
        let response = self
            .retry
            .execute(
                || {
                    let request = request.clone();
                    let transport = Arc::clone(&transport);
                    async move { transport.send(&request).await }
                },
                options,
            )
            .await?;

        if cacheable {
            let kind = CacheKind::from_path(path);
            self.set_cached(&method, path, body.as_ref(), &response, kind);
        } else if !exempt && method != Method::GET {
            // A successful mutation makes any cached read under this
            // endpoint stale. Scope to the base path, query string stripped.
            let base = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
            self.invalidate(Some(base));
        }

        Ok(response)
    }

    /// Drop cached entries; `None` clears everything.
    pub fn invalidate(&self, url_pattern: Option<&str>) {
        if let Some(cache) = &self.cache
            && let Ok(guard) = cache.lock()
        {
            guard.invalidate(url_pattern);
        }
    }

    fn get_cached(&self, method: &Method, path: &str, body: Option<&Value>) -> Option<Value> {
        let cache = self.cache.as_ref()?;
        let guard = cache.lock().ok()?;
        guard.get(method.as_str(), path, body, self.seller_id.as_deref())
    }

    fn set_cached(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        response: &Value,
        kind: CacheKind,
    ) {
        if let Some(cache) = &self.cache
            && let Ok(guard) = cache.lock()
        {
            guard.put(
                method.as_str(),
                path,
                body,
                response,
                self.seller_id.as_deref(),
                kind,
            );
        }
    }
}
