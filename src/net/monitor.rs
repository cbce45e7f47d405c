//! Connection quality monitoring
//!
//! Classifies platform connection hints into quality tiers and notifies
//! subscribers when the observed signature changes. Platform support is
//! optional: a host with no connection-information API degrades to an
//! unknown status, never an error.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

/// Effective connection type reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EffectiveType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
    #[default]
    Unknown,
}

impl EffectiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::TwoG => "2g",
            EffectiveType::ThreeG => "3g",
            EffectiveType::FourG => "4g",
            EffectiveType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EffectiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time connection snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkStatus {
    pub effective_type: EffectiveType,
    pub downlink_mbps: f64,
    pub rtt_ms: u32,
    pub save_data: bool,
}

impl NetworkStatus {
    /// Change-detection signature: connection type plus bandwidth estimate.
    fn signature(&self) -> String {
        format!("{}|{}", self.effective_type, self.downlink_mbps)
    }

    /// Slow classification: 2g-class link, under 1 Mbps, or over 1 s RTT.
    pub fn is_slow(&self) -> bool {
        matches!(
            self.effective_type,
            EffectiveType::Slow2g | EffectiveType::TwoG
        ) || self.downlink_mbps < 1.0
            || self.rtt_ms > 1000
    }

    /// Quality ladder, evaluated top down.
    pub fn quality(&self) -> QualityTier {
        if self.effective_type == EffectiveType::FourG && self.downlink_mbps >= 5.0 {
            QualityTier::Excellent
        } else if self.effective_type == EffectiveType::FourG || self.downlink_mbps >= 2.0 {
            QualityTier::Good
        } else if self.effective_type == EffectiveType::ThreeG || self.downlink_mbps >= 0.5 {
            QualityTier::Fair
        } else {
            QualityTier::Poor
        }
    }
}

/// Display tier for the connection indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityTier {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityTier {
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "Excellent",
            QualityTier::Good => "Good",
            QualityTier::Fair => "Fair",
            QualityTier::Poor => "Poor",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "signal-4",
            QualityTier::Good => "signal-3",
            QualityTier::Fair => "signal-2",
            QualityTier::Poor => "signal-1",
        }
    }
}

/// Platform hook supplying connection hints.
pub trait ConnectionSource: Send + Sync {
    /// Current hints, or `None` when the platform exposes none.
    fn sample(&self) -> Option<NetworkStatus>;
}

/// Source for hosts with no connection-information API.
pub struct NoConnectionInfo;

impl ConnectionSource for NoConnectionInfo {
    fn sample(&self) -> Option<NetworkStatus> {
        None
    }
}

/// Severity of a user-facing connection advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvisoryLevel {
    Info,
    Warning,
}

type SubscriberFn = Box<dyn Fn(&NetworkStatus) + Send + Sync>;
type AdvisoryFn = Box<dyn Fn(&str, AdvisoryLevel) + Send + Sync>;

/// Observes connection characteristics and notifies subscribers on change.
///
/// Owned by the composition root and shared by reference; tests instantiate
/// isolated monitors with their own sources.
pub struct NetworkMonitor {
    source: Box<dyn ConnectionSource>,
    last: Mutex<NetworkStatus>,
    subscribers: Mutex<HashMap<u64, SubscriberFn>>,
    next_id: AtomicU64,
    advisory: Option<AdvisoryFn>,
}

impl NetworkMonitor {
    pub fn new(source: impl ConnectionSource + 'static) -> Arc<Self> {
        Self::build(Box::new(source), None)
    }

    /// Attach a user-facing advisory hook fired when the connection
    /// transitions into a slow state.
    pub fn with_advisory(
        source: impl ConnectionSource + 'static,
        advisory: impl Fn(&str, AdvisoryLevel) + Send + Sync + 'static,
    ) -> Arc<Self> {
        Self::build(Box::new(source), Some(Box::new(advisory)))
    }

    fn build(source: Box<dyn ConnectionSource>, advisory: Option<AdvisoryFn>) -> Arc<Self> {
        let initial = source.sample().unwrap_or_default();
        Arc::new(Self {
            source,
            last: Mutex::new(initial),
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            advisory,
        })
    }

    /// Current snapshot. Missing platform support yields the unknown status.
    pub fn status(&self) -> NetworkStatus {
        self.source.sample().unwrap_or_default()
    }

    pub fn is_slow(&self) -> bool {
        self.status().is_slow()
    }

    pub fn quality(&self) -> QualityTier {
        self.status().quality()
    }

    /// Register for change notifications. The callback fires only when the
    /// observed signature changes; subscribing does not fire immediately.
    /// Dropping the returned handle unsubscribes.
    pub fn subscribe(
        self: &Arc<Self>,
        callback: impl Fn(&NetworkStatus) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.insert(id, Box::new(callback));
        }
        Subscription {
            monitor: Arc::downgrade(self),
            id,
        }
    }

    /// Re-sample and notify subscribers if the signature changed. Called by
    /// the platform adapter on its change event and by the fallback poller.
    pub fn poll(&self) {
        let status = self.status();
        let (changed, was_slow) = {
            let Ok(mut last) = self.last.lock() else {
                return;
            };
            let changed = last.signature() != status.signature();
            let was_slow = last.is_slow();
            if changed {
                *last = status.clone();
            }
            (changed, was_slow)
        };
        if !changed {
            return;
        }

        log::debug!(
            "Connection changed: {} at {} Mbps ({})",
            status.effective_type,
            status.downlink_mbps,
            status.quality().label()
        );

        if let Ok(subscribers) = self.subscribers.lock() {
            for callback in subscribers.values() {
                callback(&status);
            }
        }

        if status.is_slow()
            && !was_slow
            && let Some(advisory) = &self.advisory
        {
            advisory(
                "Slow connection detected. Some operations may take longer than usual.",
                AdvisoryLevel::Warning,
            );
        }
    }

    /// Fallback polling cadence for platforms without change events.
    pub const FALLBACK_POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Spawn the fallback polling loop. The task runs for the life of the
    /// process; there is deliberately no teardown hook.
    pub fn spawn_polling(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately; skip it so the cadence
            // starts one interval out.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.poll();
            }
        })
    }
}

/// Subscription handle; unsubscribes on drop.
pub struct Subscription {
    monitor: Weak<NetworkMonitor>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(monitor) = self.monitor.upgrade()
            && let Ok(mut subscribers) = monitor.subscribers.lock()
        {
            subscribers.remove(&self.id);
        }
    }
}
