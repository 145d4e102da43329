//! Daemon configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::millis::option_duration_millis;
use crate::reliability::RetryPolicy;
use crate::source::PollerConfig;

/// Default number of execution contexts
pub const DEFAULT_THREADS: usize = 5;

/// Daemon configuration
///
/// # Example
///
/// ```
/// use jobd_daemon::{DaemonConfig, RetryPolicy};
/// use std::time::Duration;
///
/// let config = DaemonConfig::default()
///     .with_threads(2)
///     .with_job_timeout(Duration::from_secs(30))
///     .with_retry(RetryPolicy::exponential());
///
/// assert_eq!(config.threads, 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Identifier used in logs
    pub daemon_id: String,

    /// Number of execution contexts; 0 runs the receive loop on the caller
    pub threads: usize,

    /// Deadline for a single worker run (None = unbounded)
    #[serde(with = "option_duration_millis")]
    pub job_timeout: Option<Duration>,

    /// Retries applied before a failure reaches the error hook
    pub retry: RetryPolicy,

    /// Stop the daemon on SIGINT/SIGTERM
    pub handle_signals: bool,

    /// Wait before receiving again after a failed `receive`, growing with
    /// consecutive failures
    pub source_backoff: PollerConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            daemon_id: format!("daemon-{}", Uuid::now_v7()),
            threads: DEFAULT_THREADS,
            job_timeout: None,
            retry: RetryPolicy::no_retry(),
            handle_signals: false,
            source_backoff: PollerConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Create configuration from environment variables
    ///
    /// - `JOBD_DAEMON_ID`
    /// - `JOBD_THREADS`
    /// - `JOBD_JOB_TIMEOUT_MS` (0 = unbounded)
    /// - `JOBD_MAX_ATTEMPTS` (enables exponential retry when > 1)
    /// - `JOBD_HANDLE_SIGNALS` (`true`/`1`)
    ///
    /// Unset or unparsable values keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let daemon_id = std::env::var("JOBD_DAEMON_ID").unwrap_or(defaults.daemon_id);

        let threads = std::env::var("JOBD_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.threads);

        let job_timeout = std::env::var("JOBD_JOB_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);

        let retry = match std::env::var("JOBD_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            Some(attempts) if attempts > 1 => {
                RetryPolicy::exponential().with_max_attempts(attempts)
            }
            _ => defaults.retry,
        };

        let handle_signals = std::env::var("JOBD_HANDLE_SIGNALS")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.handle_signals);

        Self {
            daemon_id,
            threads,
            job_timeout,
            retry,
            handle_signals,
            source_backoff: defaults.source_backoff,
        }
    }

    pub fn with_daemon_id(mut self, id: impl Into<String>) -> Self {
        self.daemon_id = id.into();
        self
    }

    /// Set the number of execution contexts (0 = run on the caller)
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }

    pub fn without_job_timeout(mut self) -> Self {
        self.job_timeout = None;
        self
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn with_source_backoff(mut self, backoff: PollerConfig) -> Self {
        self.source_backoff = backoff;
        self
    }

    /// Bind SIGINT/SIGTERM to `stop` while the daemon runs
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert!(config.daemon_id.starts_with("daemon-"));
        assert_eq!(config.threads, DEFAULT_THREADS);
        assert_eq!(config.job_timeout, None);
        assert_eq!(config.retry, RetryPolicy::no_retry());
        assert!(!config.handle_signals);
        assert_eq!(config.source_backoff, PollerConfig::default());
    }

    #[test]
    fn test_config_builder() {
        let config = DaemonConfig::default()
            .with_daemon_id("orders")
            .with_threads(0)
            .with_job_timeout(Duration::from_millis(250))
            .with_signal_handling(true);

        assert_eq!(config.daemon_id, "orders");
        assert_eq!(config.threads, 0);
        assert_eq!(config.job_timeout, Some(Duration::from_millis(250)));
        assert!(config.handle_signals);

        assert_eq!(config.without_job_timeout().job_timeout, None);
    }

    #[test]
    fn test_serialization() {
        let config = DaemonConfig::default()
            .with_threads(3)
            .with_job_timeout(Duration::from_secs(2));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["job_timeout"], 2000);

        let parsed: DaemonConfig = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let parsed: DaemonConfig = serde_json::from_str(r#"{"threads": 1}"#).unwrap();

        assert_eq!(parsed.threads, 1);
        assert_eq!(parsed.job_timeout, None);
        assert!(parsed.daemon_id.starts_with("daemon-"));
    }
}
