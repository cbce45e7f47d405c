//! Offline edge cache
//!
//! The platform-level cache in front of every HTTP fetch the app makes:
//! versioned partitions for critical/static assets, build artifacts, client
//! routes, and runtime traffic, driven by the worker state machine in
//! [`worker`]. The platform's Cache API, network, and client control are
//! injected behind capability traits so the protocol is testable without a
//! browser runtime.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

pub mod manifest;
#[cfg(test)]
pub mod mock;
pub mod worker;

pub use manifest::AssetManifest;
pub use worker::{EdgeWorker, WorkerMessage, WorkerState};

/// Cache partitions. Every name embeds the deploy version token, so bumping
/// the version invalidates all previous partitions on activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Must-have assets cached eagerly at install.
    Critical,
    /// Hashed build artifacts from the asset manifest.
    Assets,
    /// Client-routed paths resolving to the app shell, plus external
    /// resources cached after login.
    Routes,
    /// General request/response traffic cached as the user navigates.
    Runtime,
    /// Backend API responses refreshed by revalidation.
    Api,
}

impl Partition {
    pub const ALL: [Partition; 5] = [
        Partition::Critical,
        Partition::Assets,
        Partition::Routes,
        Partition::Runtime,
        Partition::Api,
    ];

    pub fn base(&self) -> &'static str {
        match self {
            Partition::Critical => "critical",
            Partition::Assets => "assets",
            Partition::Routes => "routes",
            Partition::Runtime => "runtime",
            Partition::Api => "api",
        }
    }

    /// Full partition name for a deploy version.
    pub fn name(&self, version: &str) -> String {
        format!("tillsync-{}-{}", self.base(), version)
    }
}

/// Edge cache configuration, fixed at build/deploy time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Deploy version token embedded in every partition name.
    pub version: String,
    /// Paths under this prefix are backend API traffic.
    pub api_prefix: String,
    /// Well-known path of the build asset manifest.
    pub manifest_url: String,
    /// The app shell document.
    pub shell_root: String,
    /// Static offline fallback page.
    pub offline_page: String,
    /// The worker's own script path; fetches for it are left to the browser.
    pub worker_script: String,
    /// Fixed install-time manifest of must-have assets.
    pub critical_assets: Vec<String>,
    /// Client-side routes that must resolve offline.
    pub app_routes: Vec<String>,
    /// Third-party resources cached after login.
    pub external_assets: Vec<String>,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            version: "dev".to_string(),
            api_prefix: "/api/".to_string(),
            manifest_url: "/asset-manifest.json".to_string(),
            shell_root: "/".to_string(),
            offline_page: "/offline.html".to_string(),
            worker_script: "/service-worker.js".to_string(),
            critical_assets: vec![
                "/".to_string(),
                "/index.html".to_string(),
                "/offline.html".to_string(),
                "/manifest.json".to_string(),
                "/favicon.ico".to_string(),
                "/logo192.png".to_string(),
            ],
            app_routes: vec![
                "/".to_string(),
                "/dashboard".to_string(),
                "/billing".to_string(),
                "/inventory".to_string(),
                "/products".to_string(),
                "/customers".to_string(),
                "/orders".to_string(),
                "/reports".to_string(),
                "/staff".to_string(),
                "/settings".to_string(),
            ],
            external_assets: Vec::new(),
        }
    }
}

/// How the browser intends to use the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// A top-level document load.
    Navigate,
    #[default]
    Resource,
}

/// An intercepted fetch.
#[derive(Debug, Clone)]
pub struct EdgeRequest {
    pub method: Method,
    pub url: String,
    pub mode: RequestMode,
}

impl EdgeRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            mode: RequestMode::Resource,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            mode: RequestMode::Navigate,
        }
    }

    /// URL scheme, if the URL is absolute.
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }

    /// Path component, query string stripped.
    pub fn path(&self) -> &str {
        let rest = match self.url.split_once("://") {
            Some((_, rest)) => match rest.find('/') {
                Some(i) => &rest[i..],
                None => "/",
            },
            None => self.url.as_str(),
        };
        rest.split_once('?').map(|(path, _)| path).unwrap_or(rest)
    }
}

/// A response held in (or synthesized for) the edge cache.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl EdgeResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body,
        }
    }

    pub fn json(status: u16, value: serde_json::Value) -> Self {
        Self::new(status, "application/json", value.to_string().into_bytes())
    }

    pub fn html(status: u16, body: &str) -> Self {
        Self::new(status, "text/html", body.as_bytes().to_vec())
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain", body.as_bytes().to_vec())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network failure at the platform fetch boundary.
#[derive(Debug, Clone, Error)]
#[error("network fetch failed: {0}")]
pub struct FetchError(pub String);

/// Synthesized offline fallback for API requests: a structured 503 body
/// instead of a thrown network error.
pub fn offline_response(message: &str) -> EdgeResponse {
    EdgeResponse::json(
        503,
        json!({
            "error": "Offline",
            "message": message,
            "cached": false,
        }),
    )
}

/// Versioned partition storage (the platform Cache API behind a seam).
/// Adapters are best-effort: platform failures degrade to miss or no-op.
#[async_trait]
pub trait PartitionStore: Send + Sync {
    async fn put(&self, partition: &str, url: &str, response: EdgeResponse);
    async fn get(&self, partition: &str, url: &str) -> Option<EdgeResponse>;
    /// Look the URL up across every partition.
    async fn match_any(&self, url: &str) -> Option<EdgeResponse>;
    async fn partition_names(&self) -> Vec<String>;
    async fn drop_partition(&self, name: &str);
}

/// Raw network access from the worker context.
#[async_trait]
pub trait FetchBackend: Send + Sync {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError>;
}

/// Control surface over the pages this worker serves.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Take control of all open pages immediately.
    async fn claim(&self);
    /// Promote a waiting worker version without waiting for tabs to close.
    async fn skip_waiting(&self);
    async fn show_notification(&self, title: &str, body: &str);
    /// Focus an open page if any exists, else open a new one at `url`.
    async fn focus_or_open(&self, url: &str);
}

#[async_trait]
impl<T: PartitionStore + ?Sized> PartitionStore for Arc<T> {
    async fn put(&self, partition: &str, url: &str, response: EdgeResponse) {
        (**self).put(partition, url, response).await
    }

    async fn get(&self, partition: &str, url: &str) -> Option<EdgeResponse> {
        (**self).get(partition, url).await
    }

    async fn match_any(&self, url: &str) -> Option<EdgeResponse> {
        (**self).match_any(url).await
    }

    async fn partition_names(&self) -> Vec<String> {
        (**self).partition_names().await
    }

    async fn drop_partition(&self, name: &str) {
        (**self).drop_partition(name).await
    }
}

#[async_trait]
impl<T: FetchBackend + ?Sized> FetchBackend for Arc<T> {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError> {
        (**self).fetch(request).await
    }
}

#[async_trait]
impl<T: ClientRegistry + ?Sized> ClientRegistry for Arc<T> {
    async fn claim(&self) {
        (**self).claim().await
    }

    async fn skip_waiting(&self) {
        (**self).skip_waiting().await
    }

    async fn show_notification(&self, title: &str, body: &str) {
        (**self).show_notification(title, body).await
    }

    async fn focus_or_open(&self, url: &str) {
        (**self).focus_or_open(url).await
    }
}
