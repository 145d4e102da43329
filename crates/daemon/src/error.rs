//! Error taxonomy for the daemon engine
//!
//! - [`ConfigurationError`] - a required collaborator or option is missing
//! - [`JobError`] - a single job failed while receiving, mapping or working
//! - [`DaemonError`] - anything that escapes [`Daemon::start`](crate::Daemon::start)
//! - [`WrappedError`] - decorated failure carrying the original cause and context
//!
//! Timeout and scheduling failures live next to the code that raises them:
//! [`TimeoutError`] and [`SchedulingError`](crate::pool::SchedulingError).

use std::error::Error as StdError;
use std::fmt;

use serde_json::Value;

use crate::daemon::DaemonStatus;
use crate::reliability::TimeoutError;

/// Boxed error used as the original cause of a [`WrappedError`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Missing or invalid configuration. Always fatal at the call site.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A required option is absent or falsy
    #[error("the option {0} is required but isn't set")]
    MissingOption(String),

    /// No job source was given to the builder
    #[error("no job source configured")]
    MissingSource,

    /// No mapper factory was given to the builder
    #[error("no mapper configured")]
    MissingMapper,

    /// No worker factory was given to the builder
    #[error("no worker configured")]
    MissingWorker,

    /// Construction arguments could not be applied to the target type
    #[error("invalid arguments: {0}")]
    InvalidArguments(#[source] serde_json::Error),
}

/// Error wrapper that attaches the original cause and arbitrary parameters
///
/// Workers typically use this to attach their input to a failure so the
/// error hook can report it.
///
/// # Example
///
/// ```
/// use jobd_daemon::WrappedError;
/// use serde_json::json;
///
/// let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// let error = WrappedError::from_error(io, Some(json!({"path": "/tmp/out"})));
///
/// assert_eq!(error.to_string(), "disk full");
/// assert!(error.original_error().is_some());
/// assert_eq!(error.parameters(), Some(&json!({"path": "/tmp/out"})));
/// ```
#[derive(Debug)]
pub struct WrappedError {
    message: String,
    error_type: Option<String>,
    parameters: Option<Value>,
    original_error: Option<BoxError>,
}

impl WrappedError {
    /// Create an error with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            parameters: None,
            original_error: None,
        }
    }

    /// Wrap an existing error, keeping its message
    pub fn from_error<E>(error: E, parameters: Option<Value>) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: error.to_string(),
            error_type: None,
            parameters,
            original_error: Some(Box::new(error)),
        }
    }

    /// Attach the original cause
    pub fn with_original_error(mut self, error: impl Into<BoxError>) -> Self {
        self.original_error = Some(error.into());
        self
    }

    /// Attach context parameters
    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = Some(parameters);
        self
    }

    /// Set the error type used by retry policies
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_type(&self) -> Option<&str> {
        self.error_type.as_deref()
    }

    pub fn parameters(&self) -> Option<&Value> {
        self.parameters.as_ref()
    }

    pub fn original_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.original_error.as_deref()
    }
}

impl fmt::Display for WrappedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for WrappedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.original_error
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl From<anyhow::Error> for WrappedError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            message: err.to_string(),
            error_type: None,
            parameters: None,
            original_error: Some(err.into()),
        }
    }
}

/// Classification of a [`JobError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorKind {
    Source,
    Mapper,
    Worker,
    Timeout,
    NotImplemented,
}

impl JobErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Mapper => "mapper",
            Self::Worker => "worker",
            Self::Timeout => "timeout",
            Self::NotImplemented => "not_implemented",
        }
    }
}

impl fmt::Display for JobErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single job, routed through the daemon's error hook
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job source failed to deliver a message
    #[error("receive failed: {0}")]
    Source(#[source] WrappedError),

    /// Input or output mapping failed
    #[error("mapper failed: {0}")]
    Mapper(#[source] WrappedError),

    /// The worker failed
    #[error("worker failed: {0}")]
    Worker(#[source] WrappedError),

    /// The worker exceeded the per-job deadline
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// The worker does not override `process`
    #[error("you must implement Worker::process yourself")]
    NotImplemented,
}

impl JobError {
    pub fn kind(&self) -> JobErrorKind {
        match self {
            Self::Source(_) => JobErrorKind::Source,
            Self::Mapper(_) => JobErrorKind::Mapper,
            Self::Worker(_) => JobErrorKind::Worker,
            Self::Timeout(_) => JobErrorKind::Timeout,
            Self::NotImplemented => JobErrorKind::NotImplemented,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Error type consulted by [`RetryPolicy`](crate::RetryPolicy)
    ///
    /// Wrapped errors report their own type when set, everything else
    /// reports its kind.
    pub fn error_type(&self) -> &str {
        match self {
            Self::Source(e) | Self::Mapper(e) | Self::Worker(e) => {
                e.error_type().unwrap_or(self.kind().as_str())
            }
            _ => self.kind().as_str(),
        }
    }

    /// The decorated error behind this failure, if any
    pub fn wrapped(&self) -> Option<&WrappedError> {
        match self {
            Self::Source(e) | Self::Mapper(e) | Self::Worker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<WrappedError> for JobError {
    fn from(err: WrappedError) -> Self {
        Self::Worker(err)
    }
}

impl From<anyhow::Error> for JobError {
    fn from(err: anyhow::Error) -> Self {
        Self::Worker(err.into())
    }
}

/// Errors escaping the daemon lifecycle
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// A job failure the error hook chose not to recover from
    #[error(transparent)]
    Job(#[from] JobError),

    /// Lifecycle method called in the wrong state
    #[error("cannot {action} a daemon that is {status}")]
    InvalidState {
        action: &'static str,
        status: DaemonStatus,
    },

    /// A lifecycle hook failed
    #[error("hook failed: {0}")]
    Hook(String),

    /// An execution context panicked
    #[error("execution context {context} panicked")]
    ContextPanicked { context: usize },

    /// Signal handlers could not be installed
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}

impl DaemonError {
    /// Create a hook failure
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }

    /// The job failure behind this error, if any
    pub fn as_job_error(&self) -> Option<&JobError> {
        match self {
            Self::Job(e) => Some(e),
            _ => None,
        }
    }
}
