//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the scope macros expand to nothing,
//! so instrumented code compiles the same either way.

#[cfg(feature = "profiling")]
pub use puffin::{GlobalProfiler, profile_function, profile_scope};

#[cfg(not(feature = "profiling"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __hearth_profile_noop {
    ($($arg:tt)*) => {};
}

#[cfg(not(feature = "profiling"))]
pub use crate::__hearth_profile_noop as profile_function;
#[cfg(not(feature = "profiling"))]
pub use crate::__hearth_profile_noop as profile_scope;

/// How profiling data is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfilingMode {
    /// Scopes are compiled in but not recorded.
    #[default]
    Off,
    /// Scopes are recorded into the global puffin profiler.
    On,
}

/// Apply a profiling mode to the global profiler.
pub fn set_mode(mode: ProfilingMode) {
    #[cfg(feature = "profiling")]
    {
        puffin::set_scopes_on(mode == ProfilingMode::On);
        tracing::debug!("puffin scopes {:?}", mode);
    }
    #[cfg(not(feature = "profiling"))]
    if mode == ProfilingMode::On {
        tracing::warn!("profiling requested but the `profiling` feature is disabled");
    }
}

/// Mark the start of a new frame for profiling.
///
/// Call this once per host update so scopes are grouped by frame.
#[inline]
pub fn new_frame() {
    #[cfg(feature = "profiling")]
    puffin::GlobalProfiler::lock().new_frame();
}
