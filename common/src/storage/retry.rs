use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use tokio_retry::{
    strategy::{jitter, ExponentialBackoff, FixedInterval},
    Retry,
};
use tracing::{info, warn};

use crate::{
    error::AppError,
    storage::client::{ClusterHealth, SearchStore},
    utils::config::AppConfig,
};

/// How long to wait for the store before a run gives up.
///
/// `max_attempts: None` retries forever. Delays double from `base_delay`
/// up to `max_delay`, with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<usize>,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn exponential(max_attempts: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
            base_delay,
            max_delay,
        }
    }

    pub fn unbounded(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: None,
            base_delay,
            max_delay,
        }
    }

    /// No waiting between attempts; meant for tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::exponential(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        let base_delay = Duration::from_millis(cfg.connect_base_delay_ms);
        let max_delay = Duration::from_millis(cfg.connect_max_delay_ms);
        if cfg.connect_max_attempts == 0 {
            Self::unbounded(base_delay, max_delay)
        } else {
            Self::exponential(cfg.connect_max_attempts, base_delay, max_delay)
        }
    }

    /// Delays between attempts; one fewer than the number of attempts.
    fn delays(&self) -> Box<dyn Iterator<Item = Duration> + Send> {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let delays: Box<dyn Iterator<Item = Duration> + Send> = if base_ms == 0 {
            Box::new(FixedInterval::from_millis(0))
        } else {
            Box::new(
                ExponentialBackoff::from_millis(2)
                    .factor(base_ms.div_ceil(2))
                    .max_delay(self.max_delay)
                    .map(jitter),
            )
        };

        match self.max_attempts {
            Some(attempts) => Box::new(delays.take(attempts.saturating_sub(1))),
            None => delays,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Block until the store answers a health check or the policy is exhausted.
pub async fn wait_until_reachable(
    store: &dyn SearchStore,
    policy: &RetryPolicy,
) -> Result<ClusterHealth, AppError> {
    let attempts = AtomicUsize::new(0);

    let outcome = Retry::spawn(policy.delays(), || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        let store = store;
        async move {
            info!(attempt, "connecting to store");
            store.health().await.map_err(|err| {
                warn!(attempt, error = %err, "store connection failed, retrying");
                err
            })
        }
    })
    .await;

    match outcome {
        Ok(health) => {
            info!(
                cluster = %health.cluster_name,
                status = ?health.status,
                "store reachable"
            );
            Ok(health)
        }
        Err(err) => Err(AppError::StoreUnreachable(format!(
            "gave up after {} attempts: {err}",
            attempts.load(Ordering::Relaxed)
        ))),
    }
}
