//! Network awareness
//!
//! Connection quality monitoring and the quality-adaptive retry executor
//! that wraps every backend request.

pub mod monitor;
pub mod retry;

pub use monitor::{
    AdvisoryLevel, ConnectionSource, EffectiveType, NetworkMonitor, NetworkStatus, QualityTier,
    Subscription,
};
pub use retry::{RetryEvent, RetryExecutor, RetryOptions, RetryPlan};
