use crate::profiling::ProfilingMode;

/// Number of playback channels a fresh audio pool starts with.
pub const DEFAULT_AUDIO_CHANNELS: usize = 10;

/// Configuration for a Hearth engine instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Initial size of the audio channel pool. The pool grows past this on demand.
    pub audio_channels: usize,
    /// Upper bound on completions dispatched by a single `update` call.
    /// `None` dispatches everything that is ready.
    pub max_completions_per_update: Option<usize>,
    /// Threads for the background task pool. `None` picks `max(1, cpus - 1)`.
    pub worker_threads: Option<usize>,
    pub profiling: ProfilingMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            audio_channels: DEFAULT_AUDIO_CHANNELS,
            max_completions_per_update: None,
            worker_threads: None,
            profiling: ProfilingMode::Off,
        }
    }
}

impl Config {
    /// The worker count the task pool will actually use.
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| num_cpus::get().saturating_sub(1))
            .max(1)
    }
}
