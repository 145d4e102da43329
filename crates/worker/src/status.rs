// Status-check daemon
// Decision: One message per interval from an IntervalSource; a single context is enough
// Decision: Fetch failures are logged and the daemon keeps running

use std::time::Duration;

use async_trait::async_trait;
use jobd_daemon::config::Options;
use jobd_daemon::{
    Daemon, DaemonConfig, DaemonError, IntervalSource, JobError, Mapper, Worker, WrappedError,
};
use serde_json::{json, Value};
use tracing::{info, warn};

pub const DEFAULT_STATUS_URL: &str = "https://www.githubstatus.com/api/v2/status.json";
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(600);

// =============================================================================
// Configuration
// =============================================================================

/// What to check and how often
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSettings {
    pub url: String,
    pub interval: Duration,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_STATUS_URL.to_string(),
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl StatusSettings {
    /// Create settings from environment variables
    ///
    /// - `STATUS_URL`
    /// - `STATUS_INTERVAL_SECS`
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("STATUS_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.url);

        let interval = std::env::var("STATUS_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.interval);

        Self { url, interval }
    }

    /// Option table exposed by the daemon
    pub fn options(&self) -> Options {
        Options::new()
            .with_option("status_url", self.url.as_str())
            .with_option("interval", self.interval.as_secs())
    }
}

// =============================================================================
// Mapper
// =============================================================================

/// `{"url": ...}` in, status text out
#[derive(Debug, Default)]
pub struct StatusMapper;

impl Mapper for StatusMapper {
    type Message = Value;
    type Input = String;
    type Result = Value;
    type Output = String;

    fn map_input(&self, message: &Value) -> Result<String, WrappedError> {
        message["url"]
            .as_str()
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                WrappedError::new("message has no url")
                    .with_type("invalid_message")
                    .with_parameters(message.clone())
            })
    }

    fn map_output(&self, result: Value) -> Result<String, WrappedError> {
        status_text(&result).ok_or_else(|| {
            WrappedError::new("response has no status")
                .with_type("invalid_response")
                .with_parameters(result)
        })
    }
}

/// Accepts both `{"status": "good"}` and statuspage's
/// `{"status": {"indicator": "none", "description": "..."}}`
fn status_text(body: &Value) -> Option<String> {
    match &body["status"] {
        Value::String(status) => Some(status.clone()),
        Value::Object(status) => status
            .get("description")
            .or_else(|| status.get("indicator"))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

// =============================================================================
// Worker
// =============================================================================

/// Fetches one status document
pub struct StatusWorker {
    client: reqwest::Client,
    url: String,
}

impl StatusWorker {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn http_error(&self, error: reqwest::Error) -> JobError {
        JobError::Worker(
            WrappedError::from_error(error, Some(json!({ "url": self.url }))).with_type("http"),
        )
    }
}

#[async_trait]
impl Worker for StatusWorker {
    type Output = Value;

    async fn process(&mut self) -> Result<Value, JobError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| self.http_error(e))?;

        response.json().await.map_err(|e| self.http_error(e))
    }

    fn extra_error_data(&self) -> Option<Value> {
        Some(json!({ "url": self.url }))
    }
}

// =============================================================================
// Daemon
// =============================================================================

/// Wire the status daemon
pub fn build_daemon(
    settings: &StatusSettings,
    config: DaemonConfig,
) -> Result<Daemon<StatusMapper, StatusWorker>, DaemonError> {
    let client = reqwest::Client::new();
    let url = settings.url.clone();

    Daemon::builder()
        .config(config)
        .options(settings.options())
        .source(IntervalSource::new(settings.interval, move || {
            json!({ "url": url })
        }))
        .mapper(|_| Ok(StatusMapper))
        .worker(move |url| StatusWorker::new(client.clone(), url))
        .after_initialize(|options| {
            options.require_option("status_url")?;
            Ok(())
        })
        .on_complete(|_, status, timing| {
            info!(
                status = %status,
                seconds = (timing.real() * 1000.0).round() / 1000.0,
                "Status retrieved"
            );
        })
        .on_error(|error, extra| {
            warn!(error = %error, extra = ?extra, "Status check failed");
            Ok(())
        })
        .build()
}
