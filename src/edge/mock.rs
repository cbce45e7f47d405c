//! In-memory platform capabilities for worker tests

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use super::{ClientRegistry, EdgeRequest, EdgeResponse, FetchBackend, FetchError, PartitionStore};

/// In-memory stand-in for the platform cache partitions.
#[derive(Default)]
pub struct MemoryPartitions {
    inner: Mutex<BTreeMap<String, HashMap<String, EdgeResponse>>>,
}

impl MemoryPartitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self, partition: &str) -> usize {
        self.inner
            .lock()
            .map(|partitions| {
                partitions
                    .get(partition)
                    .map(|entries| entries.len())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl PartitionStore for MemoryPartitions {
    async fn put(&self, partition: &str, url: &str, response: EdgeResponse) {
        if let Ok(mut partitions) = self.inner.lock() {
            partitions
                .entry(partition.to_string())
                .or_default()
                .insert(url.to_string(), response);
        }
    }

    async fn get(&self, partition: &str, url: &str) -> Option<EdgeResponse> {
        self.inner
            .lock()
            .ok()
            .and_then(|partitions| partitions.get(partition)?.get(url).cloned())
    }

    async fn match_any(&self, url: &str) -> Option<EdgeResponse> {
        self.inner.lock().ok().and_then(|partitions| {
            partitions
                .values()
                .find_map(|entries| entries.get(url).cloned())
        })
    }

    async fn partition_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|partitions| partitions.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn drop_partition(&self, name: &str) {
        if let Ok(mut partitions) = self.inner.lock() {
            partitions.remove(name);
        }
    }
}

/// Scriptable network for worker tests. Responses are keyed by URL with the
/// query string stripped; unscripted URLs act like a 404-free network error.
#[derive(Default)]
pub struct ScriptedFetch {
    responses: Mutex<HashMap<String, EdgeResponse>>,
    offline: AtomicBool,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: EdgeResponse) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), response);
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FetchBackend for ScriptedFetch {
    async fn fetch(&self, request: &EdgeRequest) -> Result<EdgeResponse, FetchError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.url.clone());
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError("connection lost".to_string()));
        }

        let key = request
            .url
            .split_once('?')
            .map(|(url, _)| url)
            .unwrap_or(&request.url);
        self.responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(key).cloned())
            .ok_or_else(|| FetchError(format!("no scripted response for {}", key)))
    }
}

/// Records client-control calls for assertions.
#[derive(Default)]
pub struct RecordingClients {
    events: Mutex<Vec<String>>,
}

impl RecordingClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait]
impl ClientRegistry for RecordingClients {
    async fn claim(&self) {
        self.record("claim".to_string());
    }

    async fn skip_waiting(&self) {
        self.record("skip_waiting".to_string());
    }

    async fn show_notification(&self, title: &str, body: &str) {
        self.record(format!("notify:{}:{}", title, body));
    }

    async fn focus_or_open(&self, url: &str) {
        self.record(format!("open:{}", url));
    }
}
