//! Engine core - owns the asset and audio subsystems and tears them down.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hearth_assets::{
    AssetFetcher, AssetInstantiator, AssetLoader, AssetServer, BytesLoader, FileReader,
    HandleAllocator, LoaderFetcher, LoaderFetcherBuilder, TextLoader,
};
use hearth_audio::{AudioClipCache, WavLoader};
use hearth_core::profiling::{self, profile_function};
use hearth_core::{Config, TaskPool};

/// Errors raised while building an [`Engine`].
#[derive(Debug)]
pub enum EngineError {
    /// Neither a fetcher nor an asset root was configured.
    NoFetcher,
    /// The background task pool could not start its threads.
    TaskPool(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NoFetcher => {
                write!(f, "No asset fetcher configured (use with_fetcher or with_asset_root)")
            }
            EngineError::TaskPool(e) => write!(f, "Failed to start task pool: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::TaskPool(e) => Some(e),
            EngineError::NoFetcher => None,
        }
    }
}

/// The context object holding both subsystems.
///
/// Construct one explicitly with [`EngineBuilder`] and pass it to whatever
/// needs it; there is no global instance. Dropping the engine performs the
/// teardown contract: every cached asset and instance is released, playback
/// stops and every clip and pending clip load is released.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use hearth::prelude::*;
/// use hearth_test_utils::MockFetcher;
///
/// let fetcher = Arc::new(MockFetcher::immediate());
/// fetcher.insert::<String>("motd.txt", "welcome".to_string());
///
/// let mut engine = EngineBuilder::new()
///     .with_fetcher(fetcher.clone())
///     .build()
///     .unwrap();
///
/// engine.assets_mut().request::<String>("motd.txt");
/// engine.update(Duration::from_millis(16));
/// assert_eq!(*engine.assets().get::<String>("motd.txt").unwrap(), "welcome");
///
/// drop(engine);
/// assert!(fetcher.live_handles().is_empty());
/// ```
pub struct Engine {
    config: Config,
    assets: AssetServer,
    audio: AudioClipCache,
    task_pool: Option<Arc<TaskPool>>,
    shut_down: bool,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn assets(&self) -> &AssetServer {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut AssetServer {
        self.shut_down = false;
        &mut self.assets
    }

    pub fn audio(&self) -> &AudioClipCache {
        &self.audio
    }

    pub fn audio_mut(&mut self) -> &mut AudioClipCache {
        self.shut_down = false;
        &mut self.audio
    }

    /// The background pool, if the engine built its own fetcher.
    pub fn task_pool(&self) -> Option<&Arc<TaskPool>> {
        self.task_pool.as_ref()
    }

    /// Run one frame: dispatch completed loads, then advance playback by `dt`.
    ///
    /// The configured completion budget covers both subsystems together;
    /// assets are served first and audio gets what is left. Returns how many
    /// loads and instantiations completed.
    pub fn update(&mut self, dt: Duration) -> usize {
        profiling::new_frame();
        profile_function!();
        let budget = self.config.max_completions_per_update;
        let mut completed = self.assets.update();
        let remaining = budget.map(|limit| limit.saturating_sub(completed));
        if remaining != Some(0) {
            completed += self.audio.poll(remaining);
        }
        self.audio.advance(dt);
        completed
    }

    /// Whether [`shutdown`](Self::shutdown) ran and nothing was requested since.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Release everything both subsystems hold.
    ///
    /// Safe to call repeatedly. The engine stays usable afterwards, and
    /// anything requested after a shutdown is released again on drop.
    /// Playback is stopped before clearing clips so no playing clip survives.
    pub fn shutdown(&mut self) {
        self.teardown();
        self.shut_down = true;
    }

    fn teardown(&mut self) {
        let assets = self.assets.release_all();
        let stopped = self.audio.stop_all();
        let clips = self.audio.clear_all();
        if assets + stopped + clips > 0 {
            tracing::info!(
                "Engine teardown: released {} asset entries and {} clips, stopped {} channels",
                assets,
                clips,
                stopped
            );
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("assets", &self.assets)
            .field("audio", &self.audio)
            .field("shut_down", &self.shut_down)
            .finish()
    }
}

/// Builder for an [`Engine`].
///
/// Either hand it a fetcher with [`with_fetcher`](Self::with_fetcher), or
/// point it at a directory with [`with_asset_root`](Self::with_asset_root)
/// and it builds a [`LoaderFetcher`] with the text, bytes and WAV loaders on
/// a task pool sized from the config.
pub struct EngineBuilder {
    config: Config,
    fetcher: Option<Arc<dyn AssetFetcher>>,
    loaders: Option<LoaderFetcherBuilder>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            fetcher: None,
            loaders: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Initial size of the audio channel pool.
    pub fn with_audio_channels(mut self, channels: usize) -> Self {
        self.config.audio_channels = channels;
        self
    }

    /// Cap completions per [`Engine::update`], across assets and audio.
    ///
    /// `Some(0)` is raised to `Some(1)` when the engine is built.
    pub fn with_completion_budget(mut self, budget: Option<usize>) -> Self {
        self.config.max_completions_per_update = budget;
        self
    }

    /// Use `fetcher` for every asset and clip. Takes precedence over an asset root.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Load from files under `root`.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        let builder = LoaderFetcher::builder(FileReader::new(root.into()))
            .with_loader(TextLoader)
            .with_loader(BytesLoader)
            .with_loader(WavLoader);
        self.loaders = Some(builder);
        self
    }

    /// Register an extra loader for the asset root.
    ///
    /// Ignored, with a warning, when no asset root is set.
    pub fn with_loader<L: AssetLoader>(mut self, loader: L) -> Self {
        match self.loaders.take() {
            Some(builder) => self.loaders = Some(builder.with_loader(loader)),
            None => tracing::warn!("with_loader called before with_asset_root, ignoring"),
        }
        self
    }

    /// Register an instantiator for the asset root.
    ///
    /// Ignored, with a warning, when no asset root is set.
    pub fn with_instantiator<I: AssetInstantiator>(mut self, instantiator: I) -> Self {
        match self.loaders.take() {
            Some(builder) => self.loaders = Some(builder.with_instantiator(instantiator)),
            None => tracing::warn!("with_instantiator called before with_asset_root, ignoring"),
        }
        self
    }

    pub fn build(mut self) -> Result<Engine, EngineError> {
        profiling::set_mode(self.config.profiling);
        if self.config.max_completions_per_update == Some(0) {
            tracing::warn!("A completion budget of 0 would stall every load, using 1");
            self.config.max_completions_per_update = Some(1);
        }

        let (fetcher, task_pool) = match (self.fetcher, self.loaders) {
            (Some(fetcher), _) => (fetcher, None),
            (None, Some(loaders)) => {
                let threads = self.config.resolved_worker_threads();
                let pool = Arc::new(TaskPool::new(threads).map_err(EngineError::TaskPool)?);
                let fetcher: Arc<dyn AssetFetcher> = Arc::new(loaders.build(Arc::clone(&pool)));
                (fetcher, Some(pool))
            }
            (None, None) => return Err(EngineError::NoFetcher),
        };

        // Both subsystems draw from one allocator so handles never collide
        // at the shared fetcher.
        let handles = HandleAllocator::shared();
        let mut assets = AssetServer::with_handles(Arc::clone(&fetcher), Arc::clone(&handles));
        assets.set_completion_budget(self.config.max_completions_per_update);
        let mut audio = AudioClipCache::new(fetcher, handles, self.config.audio_channels);
        audio.set_completion_budget(self.config.max_completions_per_update);

        tracing::info!(
            "Engine built with {} audio channels{}",
            self.config.audio_channels,
            match &task_pool {
                Some(pool) => format!(" and {} worker threads", pool.thread_count()),
                None => String::new(),
            }
        );

        Ok(Engine {
            config: self.config,
            assets,
            audio,
            task_pool,
            shut_down: false,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_audio::{AudioClip, PlayOutcome};
    use hearth_test_utils::MockFetcher;

    fn mock_engine() -> (Arc<MockFetcher>, Engine) {
        let mock = Arc::new(MockFetcher::new());
        mock.insert::<String>("title.txt", "Hearth".to_string());
        mock.insert::<AudioClip>("hum.wav", AudioClip::silence(Duration::from_secs(1), 1, 100));
        let engine = EngineBuilder::new()
            .with_audio_channels(2)
            .with_fetcher(mock.clone())
            .build()
            .unwrap();
        (mock, engine)
    }

    #[test]
    fn test_build_requires_fetcher() {
        assert!(matches!(EngineBuilder::new().build(), Err(EngineError::NoFetcher)));
    }

    #[test]
    fn test_config_applied() {
        let (_, engine) = mock_engine();
        assert_eq!(engine.audio().pool().len(), 2);
        assert!(engine.task_pool().is_none());
    }

    #[test]
    fn test_handles_unique_across_subsystems() {
        let (mock, mut engine) = mock_engine();
        engine.assets_mut().request::<String>("title.txt");
        engine.audio_mut().play_sound("hum.wav", false, 1.0);

        let text = mock.handle_for(&hearth_assets::ResourceKey::of::<String>("title.txt"));
        let clip = mock.handle_for(&hearth_assets::ResourceKey::of::<AudioClip>("hum.wav"));
        assert!(text.is_some() && clip.is_some());
        assert_ne!(text, clip);
    }

    #[test]
    fn test_update_pumps_both_subsystems() {
        let (mock, mut engine) = mock_engine();
        engine.assets_mut().request::<String>("title.txt");
        assert_eq!(engine.audio_mut().play_sound("hum.wav", false, 1.0), PlayOutcome::Queued);

        mock.complete_all();
        assert_eq!(engine.update(Duration::ZERO), 2);
        assert!(engine.assets().is_cached::<String>("title.txt"));
        assert_eq!(engine.audio().pool().playing_count(), 1);

        engine.update(Duration::from_secs(2));
        assert_eq!(engine.audio().pool().playing_count(), 0);
    }

    #[test]
    fn test_shutdown_releases_everything_once() {
        let (mock, mut engine) = mock_engine();
        engine.assets_mut().request::<String>("title.txt");
        engine.audio_mut().play_sound("hum.wav", true, 1.0);
        mock.complete_all();
        engine.update(Duration::ZERO);
        engine.audio_mut().play_sound("hum.wav", true, 1.0);

        engine.shutdown();
        assert!(engine.is_shut_down());
        assert_eq!(engine.assets().cached_count(), 0);
        assert_eq!(engine.audio().cached_count(), 0);
        assert_eq!(engine.audio().pool().playing_count(), 0);
        assert!(mock.live_handles().is_empty());

        let releases = mock.release_count();
        engine.shutdown();
        drop(engine);
        assert_eq!(mock.release_count(), releases);
    }

    #[test]
    fn test_drop_after_shutdown_releases_later_requests() {
        let (mock, mut engine) = mock_engine();
        mock.set_auto_complete(true);
        engine.shutdown();
        assert!(engine.is_shut_down());

        engine.assets_mut().request::<String>("title.txt");
        engine.audio_mut().play_sound("hum.wav", true, 1.0);
        engine.update(Duration::ZERO);
        assert!(!engine.is_shut_down());
        assert_eq!(mock.live_handles().len(), 2);

        drop(engine);
        assert!(mock.live_handles().is_empty());
    }

    #[test]
    fn test_completion_budget_spans_both_subsystems() {
        let mock = Arc::new(MockFetcher::new());
        mock.insert::<String>("title.txt", "Hearth".to_string());
        mock.insert::<AudioClip>("hum.wav", AudioClip::silence(Duration::from_secs(1), 1, 100));
        let mut engine = EngineBuilder::new()
            .with_completion_budget(Some(1))
            .with_fetcher(mock.clone())
            .build()
            .unwrap();

        engine.assets_mut().request::<String>("title.txt");
        engine.audio_mut().play_sound("hum.wav", false, 1.0);
        mock.complete_all();

        assert_eq!(engine.update(Duration::ZERO), 1);
        assert!(engine.assets().is_cached::<String>("title.txt"));
        assert_eq!(engine.audio().pending_count(), 1);

        assert_eq!(engine.update(Duration::ZERO), 1);
        assert_eq!(engine.audio().pool().playing_count(), 1);
    }

    #[test]
    fn test_zero_budget_is_raised_to_one() {
        let mock = Arc::new(MockFetcher::immediate());
        mock.insert::<String>("title.txt", "Hearth".to_string());
        let mut engine = EngineBuilder::new()
            .with_completion_budget(Some(0))
            .with_fetcher(mock.clone())
            .build()
            .unwrap();
        assert_eq!(engine.config().max_completions_per_update, Some(1));

        engine.assets_mut().request::<String>("title.txt");
        assert_eq!(engine.update(Duration::ZERO), 1);
        assert!(engine.assets().is_cached::<String>("title.txt"));
    }
}
