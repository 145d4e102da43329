//! Daemon construction

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::hooks::DaemonHooks;
use super::runner::Daemon;
use crate::config::{from_arguments, Arguments, DaemonConfig, Options};
use crate::error::{ConfigurationError, DaemonError, JobError, WrappedError};
use crate::job::{Mapper, MapperFactory, Timing, Worker, WorkerFactory};
use crate::source::JobSource;

/// Builder for [`Daemon`]
///
/// A source, a mapper and a worker are required; everything else has a
/// default.
///
/// # Example
///
/// ```
/// use jobd_daemon::{ChannelSource, Daemon, DaemonConfig, IdentityMapper, JobError, Worker};
/// use async_trait::async_trait;
///
/// struct Echo(String);
///
/// #[async_trait]
/// impl Worker for Echo {
///     type Output = String;
///
///     async fn process(&mut self) -> Result<String, JobError> {
///         Ok(self.0.clone())
///     }
/// }
///
/// let (_tx, source) = ChannelSource::channel(16);
///
/// let daemon = Daemon::builder()
///     .config(DaemonConfig::default().with_threads(2))
///     .source(source)
///     .mapper(|_| Ok(IdentityMapper::<String>::new()))
///     .worker(Echo)
///     .on_complete(|message, output, timing| {
///         println!("{message} -> {output} in {:.3}s", timing.real());
///     })
///     .build()
///     .unwrap();
///
/// assert_eq!(daemon.threads(), 2);
/// ```
pub struct DaemonBuilder<M: Mapper, W> {
    config: DaemonConfig,
    options: Options,
    source: Option<Arc<dyn JobSource<Message = M::Message>>>,
    mapper: Option<MapperFactory<M>>,
    worker: Option<WorkerFactory<M::Input, W>>,
    mapper_arguments: Arguments,
    hooks: DaemonHooks<M::Message, M::Output>,
}

impl<M, W> DaemonBuilder<M, W>
where
    M: Mapper,
    W: Worker<Output = M::Result>,
{
    pub fn new() -> Self {
        Self {
            config: DaemonConfig::default(),
            options: Options::new(),
            source: None,
            mapper: None,
            worker: None,
            mapper_arguments: Arguments::new(),
            hooks: DaemonHooks::new(),
        }
    }

    pub fn config(mut self, config: DaemonConfig) -> Self {
        self.config = config;
        self
    }

    /// Option table exposed through `Configurable`
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn source<S>(mut self, source: S) -> Self
    where
        S: JobSource<Message = M::Message>,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Mapper factory, called once per message with the mapper arguments
    pub fn mapper<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Arguments) -> Result<M, WrappedError> + Send + Sync + 'static,
    {
        self.mapper = Some(Arc::new(factory));
        self
    }

    /// Build the mapper by deserializing the mapper arguments into it
    pub fn mapper_from_arguments(self) -> Self
    where
        M: DeserializeOwned,
    {
        self.mapper(|arguments| {
            from_arguments(arguments).map_err(|e: ConfigurationError| {
                WrappedError::from_error(e, Some(Value::Object(arguments.clone())))
            })
        })
    }

    /// Arguments handed to the mapper factory (default empty)
    pub fn mapper_arguments(mut self, arguments: Arguments) -> Self {
        self.mapper_arguments = arguments;
        self
    }

    /// Worker factory, called once per message with the mapped input
    pub fn worker<F>(mut self, factory: F) -> Self
    where
        F: Fn(M::Input) -> W + Send + Sync + 'static,
    {
        self.worker = Some(Arc::new(factory));
        self
    }

    /// Replace every hook at once
    pub fn hooks(mut self, hooks: DaemonHooks<M::Message, M::Output>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn after_initialize<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Options) -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_after_initialize(hook);
        self
    }

    pub fn before_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_before_start(hook);
        self
    }

    pub fn after_start<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_after_start(hook);
        self
    }

    pub fn on_complete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&M::Message, M::Output, Timing) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_complete(hook);
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(JobError, Option<Value>) -> Result<(), DaemonError> + Send + Sync + 'static,
    {
        self.hooks = self.hooks.with_error(hook);
        self
    }

    /// Validate and create the daemon, then run `after_initialize`
    pub fn build(self) -> Result<Daemon<M, W>, DaemonError> {
        let source = self.source.ok_or(ConfigurationError::MissingSource)?;
        let mapper = self.mapper.ok_or(ConfigurationError::MissingMapper)?;
        let worker = self.worker.ok_or(ConfigurationError::MissingWorker)?;

        self.hooks.after_initialize(&self.options)?;

        Ok(Daemon::from_parts(
            self.config,
            self.options,
            source,
            mapper,
            worker,
            self.mapper_arguments,
            self.hooks,
        ))
    }
}

impl<M, W> Default for DaemonBuilder<M, W>
where
    M: Mapper,
    W: Worker<Output = M::Result>,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::IdentityMapper;
    use crate::source::ChannelSource;
    use async_trait::async_trait;
    use serde_json::json;

    struct Echo(i64);

    #[async_trait]
    impl Worker for Echo {
        type Output = i64;

        async fn process(&mut self) -> Result<i64, JobError> {
            Ok(self.0)
        }
    }

    type Builder = DaemonBuilder<IdentityMapper<i64>, Echo>;

    fn source() -> ChannelSource<i64> {
        ChannelSource::channel(1).1
    }

    #[test]
    fn test_missing_source() {
        let result = Builder::new()
            .mapper(|_| Ok(IdentityMapper::new()))
            .worker(Echo)
            .build();

        assert!(matches!(
            result,
            Err(DaemonError::Configuration(ConfigurationError::MissingSource))
        ));
    }

    #[test]
    fn test_missing_mapper() {
        let result = Builder::new().source(source()).worker(Echo).build();

        assert!(matches!(
            result,
            Err(DaemonError::Configuration(ConfigurationError::MissingMapper))
        ));
    }

    #[test]
    fn test_missing_worker() {
        let result = Builder::new()
            .source(source())
            .mapper(|_| Ok(IdentityMapper::new()))
            .build();

        assert!(matches!(
            result,
            Err(DaemonError::Configuration(ConfigurationError::MissingWorker))
        ));
    }

    #[test]
    fn test_after_initialize_sees_options() {
        let result = Builder::new()
            .options(Options::new().with_option("queue_name", "orders"))
            .source(source())
            .mapper(|_| Ok(IdentityMapper::new()))
            .worker(Echo)
            .after_initialize(|options| {
                options.require_option("queue_name")?;
                options.require_option("region")?;
                Ok(())
            })
            .build();

        assert!(matches!(
            result,
            Err(DaemonError::Configuration(ConfigurationError::MissingOption(name))) if name == "region"
        ));
    }

    #[test]
    fn test_build_keeps_mapper_arguments() {
        let mut arguments = Arguments::new();
        arguments.insert("scale".into(), json!(3));

        let daemon = Builder::new()
            .source(source())
            .mapper(|_| Ok(IdentityMapper::new()))
            .mapper_arguments(arguments)
            .worker(Echo)
            .build()
            .unwrap();

        assert_eq!(daemon.mapper_arguments().get("scale"), Some(&json!(3)));
    }
}
