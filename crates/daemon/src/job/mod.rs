//! Job abstractions
//!
//! A job is one message travelling through the pipeline:
//!
//! ```text
//! message ──► Mapper::map_input ──► Worker::process ──► Mapper::map_output ──► complete
//! ```
//!
//! Mappers and workers are created fresh for every message and dropped once
//! the message is done; neither is ever shared between execution contexts.

mod mapper;
mod timing;
mod worker;

pub use mapper::{IdentityMapper, Mapper, MapperFactory};
pub use timing::{Stopwatch, Timing};
pub use worker::{Worker, WorkerFactory};
