//! Configuration
//!
//! - [`DaemonConfig`] - typed daemon settings (threads, timeout, retry, signals)
//! - [`Options`] - free-form option tables with deferred values
//! - [`Configurable`] - option lookups for anything that owns a table

mod daemon;
pub(crate) mod millis;
mod options;

pub use daemon::{DaemonConfig, DEFAULT_THREADS};
pub use options::{
    from_arguments, is_unset, Arguments, Configurable, OptionValue, Options, Provider,
};
