//! Lifecycle and job callbacks

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Options;
use crate::error::{DaemonError, JobError};
use crate::job::Timing;

pub type InitializeHook = Arc<dyn Fn(&Options) -> Result<(), DaemonError> + Send + Sync>;
pub type LifecycleHook = Arc<dyn Fn() -> Result<(), DaemonError> + Send + Sync>;
pub type CompleteHook<Msg, Out> = Arc<dyn Fn(&Msg, Out, Timing) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(JobError, Option<Value>) -> Result<(), DaemonError> + Send + Sync>;

/// Callbacks invoked by the daemon
///
/// Every hook is optional:
///
/// - `after_initialize(&options)` - once, at the end of `DaemonBuilder::build`
/// - `before_start()` - on the caller, before any context is spawned
/// - `after_start()` - once contexts are spawned (not once they finish)
/// - `complete(&message, output, timing)` - after each successful job
/// - `error(failure, extra_data)` - after each failed receive or job
///
/// The error hook decides what happens next: `Ok(())` keeps the context
/// receiving, `Err` terminates it and becomes the result of `start`. Without
/// an error hook every failure is fatal for its context.
pub struct DaemonHooks<Msg, Out> {
    pub(crate) after_initialize: Option<InitializeHook>,
    pub(crate) before_start: Option<LifecycleHook>,
    pub(crate) after_start: Option<LifecycleHook>,
    pub(crate) complete: Option<CompleteHook<Msg, Out>>,
    pub(crate) error: Option<ErrorHook>,
}

impl<Msg, Out> DaemonHooks<Msg, Out> {
    pub fn new() -> Self {
        Self {
            after_initialize: None,
            before_start: None,
            after_start: None,
            complete: None,
            error: None,
        }
    }

    pub fn with_after_initialize<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Options) -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.after_initialize = Some(Arc::new(hook));
        self
    }

    pub fn with_before_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.before_start = Some(Arc::new(hook));
        self
    }

    pub fn with_after_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.after_start = Some(Arc::new(hook));
        self
    }

    pub fn with_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Msg, Out, Timing) + Send + Sync + 'static,
    {
        self.complete = Some(Arc::new(hook));
        self
    }

    pub fn with_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(JobError, Option<Value>) -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(hook));
        self
    }

    pub(crate) fn after_initialize(&self, options: &Options) -> Result<(), DaemonError> {
        match &self.after_initialize {
            Some(hook) => hook(options),
            None => Ok(()),
        }
    }

    pub(crate) fn before_start(&self) -> Result<(), DaemonError> {
        match &self.before_start {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub(crate) fn after_start(&self) -> Result<(), DaemonError> {
        match &self.after_start {
            Some(hook) => hook(),
            None => Ok(()),
        }
    }

    pub(crate) fn complete(&self, message: &Msg, output: Out, timing: Timing) {
        if let Some(hook) = &self.complete {
            hook(message, output, timing);
        }
    }

    /// Default behaviour re-raises the failure
    pub(crate) fn error(&self, failure: JobError, extra_data: Option<Value>) -> Result<(), DaemonError> {
        match &self.error {
            Some(hook) => hook(failure, extra_data),
            None => Err(DaemonError::Job(failure)),
        }
    }
}

impl<Msg, Out> Default for DaemonHooks<Msg, Out> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Msg, Out> Clone for DaemonHooks<Msg, Out> {
    fn clone(&self) -> Self {
        Self {
            after_initialize: self.after_initialize.clone(),
            before_start: self.before_start.clone(),
            after_start: self.after_start.clone(),
            complete: self.complete.clone(),
            error: self.error.clone(),
        }
    }
}

impl<Msg, Out> fmt::Debug for DaemonHooks<Msg, Out> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonHooks")
            .field("after_initialize", &self.after_initialize.is_some())
            .field("before_start", &self.before_start.is_some())
            .field("after_start", &self.after_start.is_some())
            .field("complete", &self.complete.is_some())
            .field("error", &self.error.is_some())
            .finish()
    }
}
