//! Hearth Core
//!
//! Shared plumbing for the Hearth crates: collections, the generational
//! arena, logging and profiling bootstrap, configuration and the
//! background task pool.

pub mod alloc;
pub mod config;
pub mod logging;
pub mod math;
pub mod profiling;
pub mod task_pool;

pub use config::Config;
pub use task_pool::TaskPool;
