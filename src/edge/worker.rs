//! Service worker protocol as an explicit state machine
//!
//! The platform drives the lifecycle: install populates the critical
//! partition and expands the build manifest, activate purges partitions from
//! other deploys and claims open pages, and the fetch handler serves
//! cache-first with background revalidation. All platform access goes
//! through the capability traits in the parent module, so every transition
//! is unit-testable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use reqwest::Method;
use serde::Deserialize;

use super::manifest::AssetManifest;
use super::{
    ClientRegistry, EdgeConfig, EdgeRequest, EdgeResponse, FetchBackend, FetchError, Partition,
    PartitionStore, RequestMode, offline_response,
};

const PUSH_TITLE: &str = "TillSync";
const DEFAULT_PUSH_BODY: &str = "You have a new notification";
const OFFLINE_MESSAGE: &str =
    "You are offline. This request will be retried when the connection returns.";
const MINIMAL_OFFLINE_HTML: &str = "<!doctype html><html><head><title>Offline</title></head>\
<body><h1>You are offline</h1><p>TillSync needs a connection for this page.</p></body></html>";

/// Lifecycle states driven by the host platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Activating,
    Active,
}

/// Application → worker control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
    Authenticated,
    LoggedOut,
    CacheAppResources,
    SkipWaiting,
}

/// The offline edge cache worker.
pub struct EdgeWorker<P, F, C> {
    config: EdgeConfig,
    store: P,
    net: F,
    clients: C,
    state: Mutex<WorkerState>,
    authenticated: AtomicBool,
}

impl<P, F, C> EdgeWorker<P, F, C>
where
    P: PartitionStore + 'static,
    F: FetchBackend + 'static,
    C: ClientRegistry + 'static,
{
    pub fn new(config: EdgeConfig, store: P, net: F, clients: C) -> Arc<Self> {
        Arc::new(Self {
            config,
            store,
            net,
            clients,
            state: Mutex::new(WorkerState::Installing),
            authenticated: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(WorkerState::Installing)
    }

    fn set_state(&self, next: WorkerState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn partition(&self, partition: Partition) -> String {
        partition.name(&self.config.version)
    }

    fn is_api_path(&self, path: &str) -> bool {
        path.starts_with(&self.config.api_prefix)
    }

    fn partition_for(&self, path: &str) -> String {
        if self.is_api_path(path) {
            self.partition(Partition::Api)
        } else {
            self.partition(Partition::Runtime)
        }
    }

    /// Install: eagerly cache the critical manifest, expand the build
    /// manifest, then promote this version without waiting for old tabs.
    /// Every asset is best-effort; a missing file must not abort install.
    pub async fn install(&self) {
        self.set_state(WorkerState::Installing);
        let critical = self.partition(Partition::Critical);

        for asset in &self.config.critical_assets {
            match self.net.fetch(&EdgeRequest::get(asset)).await {
                Ok(response) if response.is_success() => {
                    self.store.put(&critical, asset, response).await;
                }
                Ok(response) => {
                    log::warn!("Precache skipped {} (status {})", asset, response.status);
                }
                Err(e) => {
                    log::warn!("Precache failed for {}: {}", asset, e);
                }
            }
        }

        self.expand_manifest().await;
        self.clients.skip_waiting().await;
        log::info!("Edge cache installed (version {})", self.config.version);
    }

    /// Activate: purge every partition from another deploy, then take
    /// control of all open pages.
    pub async fn activate(&self) {
        self.set_state(WorkerState::Activating);

        for name in self.store.partition_names().await {
            if !name.contains(&self.config.version) {
                log::info!("Dropping stale partition {}", name);
                self.store.drop_partition(&name).await;
            }
        }

        self.clients.claim().await;
        self.set_state(WorkerState::Active);
    }

    /// The fetch interception protocol. `Ok(None)` leaves the request to
    /// default browser handling; `Err` propagates the raw network failure
    /// (only reachable for non-API mutations).
    pub async fn handle_fetch(
        self: &Arc<Self>,
        request: EdgeRequest,
    ) -> Result<Option<EdgeResponse>, FetchError> {
        if let Some(scheme) = request.scheme()
            && scheme != "http"
            && scheme != "https"
        {
            return Ok(None);
        }

        let path = request.path().to_string();
        if path == self.config.worker_script {
            return Ok(None);
        }

        if request.method != Method::GET {
            return match self.net.fetch(&request).await {
                Ok(response) => Ok(Some(response)),
                Err(_) if self.is_api_path(&path) => {
                    log::debug!("Offline mutation fallback for {}", path);
                    Ok(Some(offline_response(OFFLINE_MESSAGE)))
                }
                Err(e) => Err(e),
            };
        }

        // Cache-first: a hit returns immediately and refreshes behind the
        // caller's back. The returned response does not wait for the update.
        if let Some(cached) = self.store.match_any(&request.url).await {
            self.spawn_revalidate(request);
            return Ok(Some(cached));
        }

        match self.net.fetch(&request).await {
            Ok(response) => {
                if response.is_success() {
                    let partition = self.partition_for(&path);
                    self.store.put(&partition, &request.url, response.clone()).await;
                }
                Ok(Some(response))
            }
            Err(_) => Ok(Some(self.offline_fallback(&request, &path).await)),
        }
    }

    fn spawn_revalidate(self: &Arc<Self>, request: EdgeRequest) {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            match worker.net.fetch(&request).await {
                Ok(response) if response.is_success() => {
                    let partition = worker.partition_for(request.path());
                    worker.store.put(&partition, &request.url, response).await;
                }
                Ok(_) | Err(_) => {
                    log::debug!("Revalidation skipped for {}", request.url);
                }
            }
        });
    }

    /// Fallback ladder once the network has failed and nothing matched:
    /// navigations get the shell, then the offline page, then minimal HTML;
    /// API paths get the structured offline body; everything else gets any
    /// cached match or a plain 503.
    async fn offline_fallback(&self, request: &EdgeRequest, path: &str) -> EdgeResponse {
        if request.mode == RequestMode::Navigate {
            if let Some(shell) = self.store.match_any(&self.config.shell_root).await {
                return shell;
            }
            if let Some(page) = self.store.match_any(&self.config.offline_page).await {
                return page;
            }
            return EdgeResponse::html(503, MINIMAL_OFFLINE_HTML);
        }

        if self.is_api_path(path) {
            return offline_response(OFFLINE_MESSAGE);
        }

        if let Some(any) = self.store.match_any(&request.url).await {
            return any;
        }
        EdgeResponse::text(503, "Offline")
    }

    /// The message side channel from the application.
    pub async fn handle_message(&self, message: WorkerMessage) {
        match message {
            WorkerMessage::Authenticated => {
                self.authenticated.store(true, Ordering::SeqCst);
                self.populate_app_resources().await;
                self.expand_manifest().await;
            }
            WorkerMessage::LoggedOut => {
                // Flag only; cached content stays for the next session.
                self.authenticated.store(false, Ordering::SeqCst);
            }
            WorkerMessage::CacheAppResources => {
                self.populate_app_resources().await;
                self.expand_manifest().await;
            }
            WorkerMessage::SkipWaiting => {
                self.clients.skip_waiting().await;
            }
        }
    }

    /// Cache the shell document under every client route so deep links
    /// resolve offline, plus any configured external resources.
    async fn populate_app_resources(&self) {
        let routes = self.partition(Partition::Routes);

        let shell = match self.net.fetch(&EdgeRequest::navigate(&self.config.shell_root)).await {
            Ok(response) if response.is_success() => response,
            Ok(_) | Err(_) => match self.store.match_any(&self.config.shell_root).await {
                Some(cached) => cached,
                None => {
                    log::warn!("App shell unavailable, skipping route population");
                    return;
                }
            },
        };

        for route in &self.config.app_routes {
            self.store.put(&routes, route, shell.clone()).await;
        }

        let fetches = self.config.external_assets.iter().map(|url| {
            let request = EdgeRequest::get(url);
            async move { (url, self.net.fetch(&request).await) }
        });
        for (url, result) in join_all(fetches).await {
            match result {
                Ok(response) if response.is_success() => {
                    self.store.put(&routes, url, response).await;
                }
                Ok(response) => {
                    log::debug!("External asset {} returned {}", url, response.status);
                }
                Err(e) => log::debug!("External asset {} failed: {}", url, e),
            }
        }
    }

    /// Fetch the build manifest (cache-busted) and cache every listed
    /// artifact, one failure at a time. An unreachable manifest is a no-op.
    async fn expand_manifest(&self) {
        let busted = format!(
            "{}?v={}",
            self.config.manifest_url,
            chrono::Utc::now().timestamp_millis()
        );

        let manifest = match self.net.fetch(&EdgeRequest::get(&busted)).await {
            Ok(response) if response.is_success() => match AssetManifest::parse(&response.body) {
                Some(manifest) => manifest,
                None => {
                    log::warn!("Asset manifest unparseable, skipping expansion");
                    return;
                }
            },
            Ok(_) | Err(_) => {
                log::debug!("Asset manifest unavailable, skipping expansion");
                return;
            }
        };

        let assets = self.partition(Partition::Assets);
        let urls = manifest.collect_urls();
        let fetches = urls.iter().map(|url| {
            let request = EdgeRequest::get(url);
            async move { (url, self.net.fetch(&request).await) }
        });
        for (url, result) in join_all(fetches).await {
            match result {
                Ok(response) if response.is_success() => {
                    self.store.put(&assets, url, response).await;
                }
                Ok(response) => {
                    log::debug!("Manifest asset {} returned {}", url, response.status);
                }
                Err(e) => log::debug!("Manifest asset {} failed: {}", url, e),
            }
        }
    }

    /// Push event: show a notification with the payload text, or a default.
    pub async fn handle_push(&self, payload: Option<&str>) {
        let body = payload.unwrap_or(DEFAULT_PUSH_BODY);
        self.clients.show_notification(PUSH_TITLE, body).await;
    }

    /// Notification click: focus an open page, else open the root.
    pub async fn handle_notification_click(&self) {
        self.clients.focus_or_open(&self.config.shell_root).await;
    }
}
