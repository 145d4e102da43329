//! Option tables with deferred values
//!
//! An [`Options`] table maps names to either a stored JSON value or a
//! provider function. Providers run on every read and are never memoized, so
//! a provider that builds a fresh logger or client hands each reader its own.
//!
//! Tables are built once, before any job runs, and only read afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ConfigurationError;

/// Construction arguments handed to factories (e.g. mapper arguments)
pub type Arguments = Map<String, Value>;

/// Deferred option value, evaluated on each read
pub type Provider = Arc<dyn Fn() -> Value + Send + Sync>;

/// A stored option
#[derive(Clone)]
pub enum OptionValue {
    Value(Value),
    Deferred(Provider),
}

impl OptionValue {
    /// Produce the value, calling the provider if deferred
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Deferred(provider) => provider(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl fmt::Debug for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<Value> for OptionValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// `null`, `false` and `""` count as unset
pub fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Name -> value table
///
/// # Example
///
/// ```
/// use jobd_daemon::config::Options;
/// use serde_json::json;
///
/// let options = Options::new()
///     .with_option("threads", 5)
///     .with_deferred("started_at", || json!(chrono::Utc::now().to_rfc3339()));
///
/// assert_eq!(options.option("threads"), Some(json!(5)));
/// assert_eq!(options.option_or("missing", 20), json!(20));
/// assert!(options.require_option("queue_name").is_err());
/// ```
#[derive(Clone, Default)]
pub struct Options {
    values: HashMap<String, OptionValue>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, overwriting any previous one
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values
            .insert(name.into(), OptionValue::Value(value.into()));
    }

    /// Store a provider that is called on every read
    pub fn set_deferred<F>(&mut self, name: impl Into<String>, provider: F)
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.values
            .insert(name.into(), OptionValue::Deferred(Arc::new(provider)));
    }

    /// Store every pair, in order
    pub fn set_multiple<I, K, V>(&mut self, options: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in options {
            self.set(name, value);
        }
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn with_deferred<F>(mut self, name: impl Into<String>, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.set_deferred(name, provider);
        self
    }

    /// Resolve an option
    pub fn option(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(OptionValue::resolve)
    }

    /// Resolve an option, using `default` when it is absent or unset
    pub fn option_or(&self, name: &str, default: impl Into<Value>) -> Value {
        match self.option(name) {
            Some(value) if !is_unset(&value) => value,
            _ => default.into(),
        }
    }

    /// Resolve an option and deserialize it
    ///
    /// Returns `None` when the option is absent or has the wrong shape.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.option(name)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Resolve an option that must be set
    pub fn require_option(&self, name: &str) -> Result<Value, ConfigurationError> {
        match self.option(name) {
            Some(value) if !is_unset(&value) => Ok(value),
            _ => Err(ConfigurationError::MissingOption(name.to_string())),
        }
    }

    /// The raw stored entry, without resolving providers
    pub fn raw(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|s| s.as_str())
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Options {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut options = Options::new();
        options.set_multiple(iter);
        options
    }
}

/// Anything that owns an option table
///
/// Implementors get option lookups for free:
///
/// ```
/// use jobd_daemon::config::{Configurable, Options};
///
/// struct Poller {
///     options: Options,
/// }
///
/// impl Configurable for Poller {
///     fn options(&self) -> &Options {
///         &self.options
///     }
/// }
///
/// let poller = Poller { options: Options::new().with_option("queue_name", "jobs") };
/// assert_eq!(poller.require_option("queue_name").unwrap(), "jobs");
/// ```
pub trait Configurable {
    fn options(&self) -> &Options;

    fn option(&self, name: &str) -> Option<Value> {
        self.options().option(name)
    }

    fn option_or(&self, name: &str, default: impl Into<Value>) -> Value
    where
        Self: Sized,
    {
        self.options().option_or(name, default)
    }

    fn require_option(&self, name: &str) -> Result<Value, ConfigurationError> {
        self.options().require_option(name)
    }
}

/// Build a value from construction arguments
///
/// Unknown keys are ignored; missing keys use the type's serde defaults.
pub fn from_arguments<T: DeserializeOwned>(arguments: &Arguments) -> Result<T, ConfigurationError> {
    serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(ConfigurationError::InvalidArguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Example {
        options: Options,
    }

    impl Configurable for Example {
        fn options(&self) -> &Options {
            &self.options
        }
    }

    #[test]
    fn test_set_option() {
        let mut options = Options::new();
        options.set("number", 10);

        assert!(matches!(options.raw("number"), Some(OptionValue::Value(v)) if v == &json!(10)));
    }

    #[test]
    fn test_set_overwrites() {
        let mut options = Options::new();
        options.set("number", 10);
        options.set("number", 20);

        assert_eq!(options.option("number"), Some(json!(20)));
        assert_eq!(options.len(), 1);
    }

    #[test]
    fn test_set_multiple() {
        let mut options = Options::new();
        options.set_multiple([("a", 10), ("b", 20)]);

        assert_eq!(options.option("a"), Some(json!(10)));
        assert_eq!(options.option("b"), Some(json!(20)));
    }

    #[test]
    fn test_instance_reads_option() {
        let instance = Example {
            options: Options::new().with_option("number", 10),
        };

        assert_eq!(instance.option("number"), Some(json!(10)));
    }

    #[test]
    fn test_option_with_default() {
        let instance = Example {
            options: Options::new().with_option("disabled", false),
        };

        assert_eq!(instance.option_or("number", 20), json!(20));
        assert_eq!(instance.option_or("disabled", 20), json!(20));
    }

    #[test]
    fn test_deferred_option_evaluated_on_every_read() {
        let counter = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&counter);
        let options = Options::new().with_deferred("dynamic", move || {
            json!(calls.fetch_add(1, Ordering::SeqCst))
        });

        let first = options.option("dynamic");
        let second = options.option("dynamic");

        assert_ne!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_deterministic_deferred_option() {
        let options = Options::new().with_deferred("fixed", || json!("same"));
        assert_eq!(options.option("fixed"), options.option("fixed"));
        assert!(options.raw("fixed").unwrap().is_deferred());
    }

    #[test]
    fn test_require_unset_option() {
        let instance = Example {
            options: Options::new().with_option("empty", ""),
        };

        assert!(matches!(
            instance.require_option("another_number"),
            Err(ConfigurationError::MissingOption(name)) if name == "another_number"
        ));
        assert!(instance.require_option("empty").is_err());
    }

    #[test]
    fn test_require_set_option() {
        let instance = Example {
            options: Options::new().with_option("another_number", 20),
        };

        assert_eq!(instance.require_option("another_number").unwrap(), json!(20));
    }

    #[test]
    fn test_typed_get() {
        let options = Options::new().with_option("threads", 4);

        assert_eq!(options.get::<usize>("threads"), Some(4));
        assert_eq!(options.get::<String>("threads"), None);
        assert_eq!(options.get::<usize>("missing"), None);
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Attributes {
        a: Option<i64>,
        b: Option<i64>,
    }

    #[test]
    fn test_from_arguments() {
        let arguments = json!({"a": 10, "b": 20, "unknown": true});
        let arguments = arguments.as_object().unwrap();

        let attributes: Attributes = from_arguments(arguments).unwrap();
        assert_eq!(attributes, Attributes { a: Some(10), b: Some(20) });

        let empty: Attributes = from_arguments(&Arguments::new()).unwrap();
        assert_eq!(empty, Attributes::default());
    }

    #[test]
    fn test_from_arguments_wrong_shape() {
        let arguments = json!({"a": "ten"});
        let result: Result<Attributes, _> = from_arguments(arguments.as_object().unwrap());

        assert!(matches!(result, Err(ConfigurationError::InvalidArguments(_))));
    }
}
