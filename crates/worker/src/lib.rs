//! jobd worker binary support
//!
//! The status-check daemon shipped as `jobd-worker`: it fetches a JSON status
//! endpoint on a fixed interval and logs the reported status.

pub mod status;

pub use status::{build_daemon, StatusMapper, StatusSettings, StatusWorker};
