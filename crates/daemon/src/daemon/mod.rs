//! Daemon lifecycle and dispatch

mod builder;
mod hooks;
mod lifecycle;
mod runner;
mod signals;

pub use builder::DaemonBuilder;
pub use hooks::{CompleteHook, DaemonHooks, ErrorHook, InitializeHook, LifecycleHook};
pub use lifecycle::DaemonStatus;
pub use runner::{Daemon, JobFailure};
