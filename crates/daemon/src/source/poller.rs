//! Polling job source with exponential backoff
//!
//! Idle polls grow the wait interval up to a ceiling; a poll that returns a
//! message resets it to the minimum.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::JobSource;
use crate::config::millis::duration_millis;
use crate::error::WrappedError;

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollerConfig {
    /// Wait after a poll that found nothing, right after a hit
    #[serde(with = "duration_millis")]
    pub min_interval: Duration,

    /// Ceiling for the idle wait
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Growth factor for each consecutive empty poll
    pub backoff_multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            backoff_multiplier: 1.5,
        }
    }
}

impl PollerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set backoff multiplier (clamped to at least 1.0)
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// The interval following `current`, capped at `max_interval`
    ///
    /// Multipliers below 1.0 or not finite are treated as 1.0, whatever
    /// the fields were set to.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let multiplier = if self.backoff_multiplier.is_finite() {
            self.backoff_multiplier.max(1.0)
        } else {
            1.0
        };

        Duration::try_from_secs_f64(current.as_secs_f64() * multiplier)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }

    /// Wait after `failures` consecutive failures (1-based)
    pub fn delay_after(&self, failures: u32) -> Duration {
        let mut delay = self.min_interval.min(self.max_interval);
        for _ in 1..failures {
            let next = self.next_interval(delay);
            if next == delay {
                break;
            }
            delay = next;
        }
        delay
    }
}

type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<Option<T>, WrappedError>> + Send>>;
type Fetch<T> = Arc<dyn Fn() -> FetchFuture<T> + Send + Sync>;

/// Job source that polls an async fetch function
///
/// `fetch` returns `Ok(None)` when nothing is available; the source then
/// sleeps for the current backoff interval and polls again. The source is
/// never exhausted. Fetch errors are returned to the caller without
/// touching the backoff state.
pub struct PollingSource<T> {
    fetch: Fetch<T>,
    config: PollerConfig,
    current_interval: Mutex<Duration>,
}

impl<T: Send + 'static> PollingSource<T> {
    pub fn new<F, Fut>(config: PollerConfig, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, WrappedError>> + Send + 'static,
    {
        Self {
            fetch: Arc::new(move || Box::pin(fetch()) as FetchFuture<T>),
            current_interval: Mutex::new(config.min_interval),
            config,
        }
    }

    pub fn current_interval(&self) -> Duration {
        *self.current_interval.lock()
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    fn reset_backoff(&self) {
        *self.current_interval.lock() = self.config.min_interval;
    }

    /// Grow the interval and return the wait before the next poll
    fn increase_backoff(&self) -> Duration {
        let mut current = self.current_interval.lock();
        let wait = *current;
        *current = self.config.next_interval(wait);
        wait
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> JobSource for PollingSource<T> {
    type Message = T;

    async fn receive(&self) -> Result<Option<T>, WrappedError> {
        loop {
            if let Some(message) = (self.fetch)().await? {
                self.reset_backoff();
                return Ok(Some(message));
            }

            let wait = self.increase_backoff();
            trace!(interval_ms = wait.as_millis() as u64, "Nothing to receive, backing off");
            tokio::time::sleep(wait).await;
        }
    }
}
