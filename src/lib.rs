//! TillSync offline core
//!
//! The offline-first data layer of the TillSync retail platform: a TTL-aware
//! persistent response cache, a connection-quality monitor, the
//! quality-adaptive retrying request executor, and the offline edge cache
//! state machine that fronts every fetch the app makes.
//!
//! UI layers route API traffic through [`CachedClient`]; the service-worker
//! host embeds [`EdgeWorker`] behind its platform adapters. Both are owned
//! by the application's composition root and shared by reference — there is
//! no ambient global state, so tests run against isolated instances.

pub mod cache;
pub mod client;
pub mod config;
pub mod edge;
pub mod error;
pub mod net;

pub use cache::client::CachedClient;
pub use cache::storage::ResponseCache;
pub use cache::{CacheKind, TtlPolicy};
pub use client::{ApiRequest, ApiTransport, RestTransport};
pub use config::OfflineConfig;
pub use edge::{EdgeConfig, EdgeWorker};
pub use error::{Error, Result};
pub use net::{NetworkMonitor, RetryExecutor, RetryPlan};
