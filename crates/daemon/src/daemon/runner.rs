//! Daemon execution engine
//!
//! ```text
//!                    ┌─────────────────── context 0..N ───────────────────┐
//! JobSource ─receive─►  map_input ─► Worker::process ─► map_output ─► complete
//!                    │       │              │ (timeout)       │            │
//!                    │       └──────────────┴────────┬────────┘            │
//!                    │                    retry policy, then error hook     │
//!                    └──────────────────────────────────────────────────────┘
//! ```
//!
//! Each context is a tokio task running its own receive loop, and each job's
//! worker runs on a task of its own. `stop` cancels the shared token and
//! aborts every context, which aborts the in-flight workers with them; a
//! job timeout aborts just that worker. Either way the context is released
//! at once, but a worker that blocks without awaiting keeps its runtime
//! thread until it returns, and resources held by abandoned jobs are
//! released only when their futures are dropped.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, instrument, warn};

use super::builder::DaemonBuilder;
use super::hooks::DaemonHooks;
use super::lifecycle::{DaemonStatus, StatusCell};
use super::signals;
use crate::config::{Arguments, Configurable, DaemonConfig, Options};
use crate::error::{DaemonError, JobError, WrappedError};
use crate::job::{Mapper, MapperFactory, Timing, Worker, WorkerFactory};
use crate::reliability::with_timeout;
use crate::source::JobSource;

/// A failed job together with the worker's diagnostic data
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct JobFailure {
    #[source]
    pub error: JobError,
    pub extra_data: Option<Value>,
}

impl JobFailure {
    pub fn new(error: JobError, extra_data: Option<Value>) -> Self {
        Self { error, extra_data }
    }
}

impl From<JobError> for JobFailure {
    fn from(error: JobError) -> Self {
        Self::new(error, None)
    }
}

/// Long-running job daemon
///
/// Cloning is cheap and every clone controls the same daemon, so one clone
/// can `stop` while another is awaiting `start`.
pub struct Daemon<M: Mapper, W> {
    inner: Arc<Inner<M, W>>,
}

struct Inner<M: Mapper, W> {
    config: DaemonConfig,
    options: Options,
    source: Arc<dyn JobSource<Message = M::Message>>,
    mapper: MapperFactory<M>,
    worker: WorkerFactory<M::Input, W>,
    mapper_arguments: Arguments,
    hooks: DaemonHooks<M::Message, M::Output>,
    status: StatusCell,
    shutdown: CancellationToken,
    contexts: Mutex<Vec<AbortHandle>>,
}

impl<M: Mapper, W> Clone for Daemon<M, W> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M, W> Daemon<M, W>
where
    M: Mapper,
    W: Worker<Output = M::Result>,
{
    pub fn builder() -> DaemonBuilder<M, W> {
        DaemonBuilder::new()
    }

    pub(crate) fn from_parts(
        config: DaemonConfig,
        options: Options,
        source: Arc<dyn JobSource<Message = M::Message>>,
        mapper: MapperFactory<M>,
        worker: WorkerFactory<M::Input, W>,
        mapper_arguments: Arguments,
        hooks: DaemonHooks<M::Message, M::Output>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                options,
                source,
                mapper,
                worker,
                mapper_arguments,
                hooks,
                status: StatusCell::new(),
                shutdown: CancellationToken::new(),
                contexts: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Run the daemon until every context has terminated
    ///
    /// With `threads > 0` this spawns that many contexts and waits for them;
    /// with `threads == 0` the receive loop runs on the caller. Returns the
    /// first fatal failure, in context order, once all contexts are done.
    #[instrument(skip(self), fields(daemon_id = %self.inner.config.daemon_id, threads = self.inner.config.threads))]
    pub async fn start(&self) -> Result<(), DaemonError> {
        let inner = &self.inner;
        inner
            .status
            .transition(DaemonStatus::Created, DaemonStatus::Starting, "start")?;

        info!(
            daemon_id = %inner.config.daemon_id,
            threads = inner.config.threads,
            job_timeout_ms = inner.config.job_timeout.map(|t| t.as_millis() as u64),
            "Starting daemon"
        );

        if let Err(e) = inner.hooks.before_start() {
            inner.status.replace(DaemonStatus::Stopped);
            return Err(e);
        }

        let signal_listener = if inner.config.handle_signals {
            let daemon = self.clone();
            match signals::listen(inner.shutdown.clone(), move || daemon.stop()) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    inner.status.replace(DaemonStatus::Stopped);
                    return Err(e);
                }
            }
        } else {
            None
        };

        let result = if inner.config.threads == 0 {
            self.run_inline().await
        } else {
            self.run_contexts().await
        };

        inner.shutdown.cancel();
        if let Some(handle) = signal_listener {
            handle.abort();
        }
        inner.contexts.lock().clear();
        inner.status.replace(DaemonStatus::Stopped);

        match &result {
            Ok(()) => info!(daemon_id = %inner.config.daemon_id, "Daemon stopped"),
            Err(e) => error!(daemon_id = %inner.config.daemon_id, error = %e, "Daemon stopped with error"),
        }

        result
    }

    async fn run_inline(&self) -> Result<(), DaemonError> {
        let inner = Arc::clone(&self.inner);
        inner.status.advance(DaemonStatus::Starting, DaemonStatus::Running);
        inner.hooks.after_start()?;

        inner.run_context(0).await
    }

    async fn run_contexts(&self) -> Result<(), DaemonError> {
        let inner = &self.inner;

        let handles: Vec<JoinHandle<Result<(), DaemonError>>> = {
            let mut contexts = inner.contexts.lock();
            (0..inner.config.threads)
                .map(|context| {
                    let inner = Arc::clone(inner);
                    let handle = tokio::spawn(inner.run_context(context));
                    contexts.push(handle.abort_handle());
                    handle
                })
                .collect()
        };

        inner.status.advance(DaemonStatus::Starting, DaemonStatus::Running);
        debug!(contexts = handles.len(), "Contexts spawned");

        let mut first_error = inner.hooks.after_start().err();
        if first_error.is_some() {
            self.stop();
        }

        for (context, handle) in handles.into_iter().enumerate() {
            let outcome = match handle.await {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => Ok(()),
                Err(_) => {
                    error!(context, "Execution context panicked");
                    Err(DaemonError::ContextPanicked { context })
                }
            };

            if let Err(e) = outcome {
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Stop every context immediately
    ///
    /// In-flight jobs are abandoned: not completed, not retried, and no hook
    /// runs for them. Stopping a daemon that has not started makes it
    /// unstartable. Idempotent.
    #[instrument(skip(self), fields(daemon_id = %self.inner.config.daemon_id))]
    pub fn stop(&self) {
        let inner = &self.inner;
        let previous = inner.status.replace(DaemonStatus::Stopping);
        if previous == DaemonStatus::Stopped {
            inner.status.replace(DaemonStatus::Stopped);
            return;
        }

        inner.shutdown.cancel();

        let handles: Vec<AbortHandle> = inner.contexts.lock().drain(..).collect();
        for handle in &handles {
            handle.abort();
        }

        inner.status.replace(DaemonStatus::Stopped);
        info!(daemon_id = %inner.config.daemon_id, aborted = handles.len(), "Daemon stop requested");
    }

    /// Run one message through map -> work -> map -> complete
    ///
    /// No retries and no error hook: failures are returned to the caller.
    pub async fn process(&self, message: &M::Message) -> Result<Timing, JobFailure> {
        self.inner.process(message).await
    }

    /// Build a mapper from the configured factory and arguments
    pub fn create_mapper(&self) -> Result<M, JobError> {
        self.inner.create_mapper()
    }

    pub fn mapper_arguments(&self) -> &Arguments {
        &self.inner.mapper_arguments
    }

    pub fn status(&self) -> DaemonStatus {
        self.inner.status.get()
    }

    /// Live spawned contexts (always 0 in single-context mode)
    pub fn contexts(&self) -> usize {
        self.inner
            .contexts
            .lock()
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Configured number of contexts
    pub fn threads(&self) -> usize {
        self.inner.config.threads
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.inner.config
    }
}

impl<M, W> Inner<M, W>
where
    M: Mapper,
    W: Worker<Output = M::Result>,
{
    async fn run_context(self: Arc<Self>, context: usize) -> Result<(), DaemonError> {
        let shutdown = self.shutdown.clone();

        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(context, "Context cancelled");
                Ok(())
            }
            result = self.run_loop(context) => {
                if let Err(e) = &result {
                    warn!(context, error = %e, "Context terminated");
                }
                result
            }
        }
    }

    async fn run_loop(&self, context: usize) -> Result<(), DaemonError> {
        let mut source_failures: u32 = 0;

        loop {
            let message = match self.source.receive().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(context, "Job source exhausted");
                    return Ok(());
                }
                Err(e) => {
                    self.hooks.error(JobError::Source(e), None)?;

                    source_failures = source_failures.saturating_add(1);
                    let delay = self.config.source_backoff.delay_after(source_failures);
                    debug!(
                        context,
                        failures = source_failures,
                        delay_ms = delay.as_millis() as u64,
                        "Receive failed, backing off"
                    );

                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            };
            source_failures = 0;

            if let Err(failure) = self.process_with_retry(&message, context).await {
                self.hooks.error(failure.error, failure.extra_data)?;
            }
        }
    }

    async fn process_with_retry(&self, message: &M::Message, context: usize) -> Result<(), JobFailure> {
        let policy = &self.config.retry;
        let mut attempt = 1;

        loop {
            let failure = match self.process(message).await {
                Ok(timing) => {
                    debug!(context, attempt, elapsed_ms = timing.elapsed_ms() as u64, "Job completed");
                    return Ok(());
                }
                Err(failure) => failure,
            };

            if !policy.has_attempts_remaining(attempt) || !policy.should_retry(failure.error.error_type()) {
                return Err(failure);
            }

            attempt += 1;
            let delay = policy.delay_for_attempt(attempt);
            warn!(
                context,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure.error,
                "Job failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn process(&self, message: &M::Message) -> Result<Timing, JobFailure> {
        let mapper = self.create_mapper()?;
        let input = mapper.map_input(message).map_err(JobError::Mapper)?;

        let stopwatch = Timing::start();
        let mut worker = (self.worker)(input);
        let extra_data = worker.extra_error_data();

        // The worker runs on its own task so a deadline releases this context
        // even when `process` blocks; dropping the handle aborts the task.
        let job = AbortOnDropHandle::new(tokio::spawn(async move {
            let result = worker.process().await;
            (worker, result)
        }));

        let result = match with_timeout(self.config.job_timeout, job).await {
            Ok(Ok((_, Ok(result)))) => result,
            Ok(Ok((worker, Err(e)))) => return Err(JobFailure::new(e, worker.extra_error_data())),
            Ok(Err(e)) => {
                let error = WrappedError::new(format!("worker panicked: {e}")).with_type("panic");
                return Err(JobFailure::new(JobError::Worker(error), extra_data));
            }
            Err(timeout) => {
                warn!(limit_ms = timeout.limit.as_millis() as u64, "Job timed out, abandoning worker");
                return Err(JobFailure::new(timeout.into(), extra_data));
            }
        };

        let output = mapper.map_output(result).map_err(JobError::Mapper)?;
        let timing = stopwatch.stop();

        self.hooks.complete(message, output, timing);
        Ok(timing)
    }

    fn create_mapper(&self) -> Result<M, JobError> {
        (self.mapper)(&self.mapper_arguments).map_err(JobError::Mapper)
    }
}

impl<M: Mapper, W> Configurable for Daemon<M, W> {
    fn options(&self) -> &Options {
        &self.inner.options
    }
}

impl<M: Mapper, W> fmt::Debug for Daemon<M, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Daemon")
            .field("config", &self.inner.config)
            .field("status", &self.inner.status.get())
            .field("hooks", &self.inner.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WrappedError;
    use crate::job::IdentityMapper;
    use crate::source::ChannelSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Flaky {
        calls: Arc<AtomicUsize>,
        fail_times: usize,
    }

    #[async_trait]
    impl Worker for Flaky {
        type Output = usize;

        async fn process(&mut self) -> Result<usize, JobError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err(WrappedError::new("flaky").with_parameters(json!({"call": call})).into())
            } else {
                Ok(call)
            }
        }

        fn extra_error_data(&self) -> Option<Value> {
            Some(json!({"fail_times": self.fail_times}))
        }
    }

    fn flaky_daemon(fail_times: usize, config: DaemonConfig) -> (Daemon<IdentityMapper<usize>, Flaky>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let (_tx, source) = ChannelSource::channel(1);

        let daemon = Daemon::builder()
            .config(config)
            .source(source)
            .mapper(|_| Ok(IdentityMapper::new()))
            .worker(move |_| Flaky {
                calls: Arc::clone(&counter),
                fail_times,
            })
            .build()
            .unwrap();

        (daemon, calls)
    }

    #[tokio::test]
    async fn test_process_success_returns_timing() {
        let (daemon, calls) = flaky_daemon(0, DaemonConfig::default());

        let timing = daemon.process(&1).await.unwrap();
        assert!(timing.elapsed < Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_process_failure_carries_extra_data() {
        let (daemon, _) = flaky_daemon(1, DaemonConfig::default());

        let failure = daemon.process(&1).await.unwrap_err();
        assert_eq!(failure.error.kind(), crate::error::JobErrorKind::Worker);
        assert_eq!(failure.extra_data, Some(json!({"fail_times": 1})));
        assert_eq!(failure.to_string(), "worker failed: flaky");
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let config = DaemonConfig::default()
            .with_retry(crate::RetryPolicy::fixed(Duration::from_millis(1), 3));
        let (daemon, calls) = flaky_daemon(2, config);

        daemon.inner.process_with_retry(&1, 0).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let config = DaemonConfig::default()
            .with_retry(crate::RetryPolicy::fixed(Duration::from_millis(1), 2));
        let (daemon, calls) = flaky_daemon(5, config);

        let failure = daemon.inner.process_with_retry(&1, 0).await.unwrap_err();
        assert_eq!(failure.error.to_string(), "worker failed: flaky");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_type() {
        let policy = crate::RetryPolicy::fixed(Duration::from_millis(1), 5).with_non_retryable_error("worker");
        let (daemon, calls) = flaky_daemon(5, DaemonConfig::default().with_retry(policy));

        assert!(daemon.inner.process_with_retry(&1, 0).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_mapper_factory_failure() {
        let (_tx, source) = ChannelSource::<usize>::channel(1);
        let daemon: Daemon<IdentityMapper<usize>, Flaky> = Daemon::builder()
            .source(source)
            .mapper(|_| Err(WrappedError::new("no mapper today")))
            .worker(|_| Flaky {
                calls: Arc::new(AtomicUsize::new(0)),
                fail_times: 0,
            })
            .build()
            .unwrap();

        let error = daemon.create_mapper().unwrap_err();
        assert!(matches!(error, JobError::Mapper(_)));

        let failure = daemon.process(&1).await.unwrap_err();
        assert_eq!(failure.extra_data, None);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let (daemon, _) = flaky_daemon(0, DaemonConfig::default());

        daemon.stop();
        assert_eq!(daemon.status(), DaemonStatus::Stopped);

        let error = daemon.start().await.unwrap_err();
        assert_eq!(error.to_string(), "cannot start a daemon that is stopped");
    }

    #[test]
    fn test_configurable() {
        let (_tx, source) = ChannelSource::<usize>::channel(1);
        let daemon: Daemon<IdentityMapper<usize>, Flaky> = Daemon::builder()
            .options(Options::new().with_option("number", 10))
            .source(source)
            .mapper(|_| Ok(IdentityMapper::new()))
            .worker(|_| Flaky {
                calls: Arc::new(AtomicUsize::new(0)),
                fail_times: 0,
            })
            .build()
            .unwrap();

        assert_eq!(daemon.option("number"), Some(json!(10)));
        assert_eq!(daemon.option_or("missing", 1), json!(1));
        assert_eq!(daemon.status(), DaemonStatus::Created);
        assert_eq!(daemon.contexts(), 0);
    }
}
