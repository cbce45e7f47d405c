//! Exponential-backoff retry driven by connection quality
//!
//! Wraps an arbitrary async operation with retries. The backoff schedule is
//! selected from the current connection classification: a degraded link gets
//! more attempts with wider spacing. There is no per-attempt timeout here;
//! the wrapped operation owns its own deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::net::monitor::NetworkMonitor;

/// Backoff parameters for one class of connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPlan {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPlan {
    /// Plan for a healthy connection.
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            multiplier: 1.5,
        }
    }

    /// Plan for a degraded connection: more attempts, wider spacing.
    pub fn slow() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(15),
            multiplier: 1.5,
        }
    }

    /// Backoff before retry `attempt` (1-based):
    /// `min(base * multiplier^(attempt-1), cap)`. No jitter; the schedule is
    /// deterministic given the attempt number.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let scaled = self.base_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Observability payload passed to the retry hook before each backoff sleep.
#[derive(Debug)]
pub struct RetryEvent<'e, E> {
    /// 1-based count of completed failures.
    pub attempt: u32,
    pub max_retries: u32,
    pub delay: Duration,
    pub error: &'e E,
}

/// Per-call overrides for [`RetryExecutor::execute`].
pub struct RetryOptions<E> {
    /// Overrides the plan's retry count.
    pub max_retries: Option<u32>,
    /// Called synchronously exactly once per failed attempt, before the sleep.
    pub on_retry: Option<Box<dyn FnMut(RetryEvent<'_, E>) + Send>>,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_retries: None,
            on_retry: None,
        }
    }
}

impl<E> RetryOptions<E> {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn with_on_retry(
        mut self,
        hook: impl FnMut(RetryEvent<'_, E>) + Send + 'static,
    ) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }
}

/// Executes operations with quality-adaptive exponential backoff.
#[derive(Clone)]
pub struct RetryExecutor {
    monitor: Option<Arc<NetworkMonitor>>,
    plan_override: Option<RetryPlan>,
}

impl RetryExecutor {
    /// Select the plan from the monitor's classification at execute time.
    pub fn new(monitor: Arc<NetworkMonitor>) -> Self {
        Self {
            monitor: Some(monitor),
            plan_override: None,
        }
    }

    /// Always use a fixed plan.
    pub fn with_plan(plan: RetryPlan) -> Self {
        Self {
            monitor: None,
            plan_override: Some(plan),
        }
    }

    /// The plan in effect right now. Chosen once per `execute` call.
    pub fn plan(&self) -> RetryPlan {
        if let Some(plan) = self.plan_override {
            return plan;
        }
        match &self.monitor {
            Some(monitor) if monitor.is_slow() => RetryPlan::slow(),
            _ => RetryPlan::fast(),
        }
    }

    /// Run `operation`, retrying failures per the plan. The error returned
    /// after exhaustion is the operation's own last error, unwrapped.
    pub async fn execute<T, E, F, Fut>(
        &self,
        mut operation: F,
        mut options: RetryOptions<E>,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let plan = self.plan();
        let max_retries = options.max_retries.unwrap_or(plan.max_retries);
        let mut attempt = 0u32;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if attempt > max_retries {
                        return Err(error);
                    }
                    let delay = plan.delay_for(attempt);
                    log::debug!(
                        "Attempt {}/{} failed, retrying in {:?}",
                        attempt,
                        max_retries,
                        delay
                    );
                    if let Some(hook) = options.on_retry.as_mut() {
                        hook(RetryEvent {
                            attempt,
                            max_retries,
                            delay,
                            error: &error,
                        });
                    }
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
