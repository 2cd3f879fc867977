//! Audio clip cache feeding a [`ChannelPool`].

use std::any::TypeId;
use std::sync::Arc;
use std::time::Duration;

use hearth_assets::fetch::{self, AssetFetcher};
use hearth_assets::{
    AssetCache, AssetError, ErasedAsset, HandleAllocator, LoadOutcome, LoadResult, LoadState,
    ResourceKey,
};
use hearth_core::alloc::HashMap;
use hearth_core::profiling::profile_function;

use crate::channel::{ChannelId, ChannelPool};
use crate::clip::AudioClip;

/// What [`AudioClipCache::play_sound`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The clip was cached and is now playing on this channel.
    Started(ChannelId),
    /// The clip is loading; playback starts on the `update` that completes it.
    Queued,
}

#[derive(Debug, Clone, Copy)]
struct PlayRequest {
    looping: bool,
    volume: f32,
}

/// Clips keyed by name, plus the channels playing them.
///
/// Loads for a clip that is already loading join the pending fetch. Plays
/// requested before their clip arrives are queued on the key and started,
/// each on its own channel, when the load completes. A failed load drops its
/// queued plays and logs.
///
/// Eviction is usage-aware: [`clear_unused_clips`](Self::clear_unused_clips)
/// never releases a clip that a channel is playing.
pub struct AudioClipCache {
    clips: AssetCache,
    pool: ChannelPool,
    queued: HashMap<Arc<str>, Vec<PlayRequest>>,
    completion_budget: Option<usize>,
}

impl AudioClipCache {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, handles: Arc<HandleAllocator>, channels: usize) -> Self {
        Self {
            clips: AssetCache::new(fetcher, handles),
            pool: ChannelPool::with_capacity(channels),
            queued: HashMap::default(),
            completion_budget: None,
        }
    }

    /// Cap how many loads one [`update`](Self::update) completes.
    ///
    /// A budget of zero is raised to one so loads always make progress.
    pub fn set_completion_budget(&mut self, budget: Option<usize>) {
        self.completion_budget = budget.map(|limit| limit.max(1));
    }

    fn key(name: &str) -> ResourceKey {
        ResourceKey::of::<AudioClip>(name)
    }

    /// Load the clip `name`.
    ///
    /// A cached clip calls `on_success` before returning. Otherwise exactly
    /// one of the callbacks runs during a later [`update`](Self::update).
    pub fn load_clip<S, E>(&mut self, name: &str, on_success: S, on_error: E) -> LoadOutcome
    where
        S: FnOnce(Arc<AudioClip>) + Send + 'static,
        E: FnOnce(Arc<AssetError>) + Send + 'static,
    {
        let key = Self::key(name);
        let observed = key.clone();
        self.clips.load(
            key,
            Box::new(move |result: LoadResult<ErasedAsset>| {
                let clip = result.and_then(|value| {
                    fetch::downcast::<AudioClip>(&observed, value).map_err(Arc::new)
                });
                match clip {
                    Ok(clip) => on_success(clip),
                    Err(err) => on_error(err),
                }
            }),
        )
    }

    /// Play `name` on a free channel, loading it first if needed.
    pub fn play_sound(&mut self, name: &str, looping: bool, volume: f32) -> PlayOutcome {
        if let Some(clip) = self.get(name) {
            let id = self.pool.play_on_free(clip, looping, volume);
            tracing::trace!("Playing {} on {}", name, id);
            return PlayOutcome::Started(id);
        }

        self.queued
            .entry(Arc::from(name))
            .or_default()
            .push(PlayRequest { looping, volume });
        // The outcome is reported through the queued play, not this observer.
        self.clips
            .load(Self::key(name), Box::new(|_: LoadResult<ErasedAsset>| {}));
        PlayOutcome::Queued
    }

    /// Complete ready loads and start the plays queued on them.
    ///
    /// Returns how many loads completed.
    pub fn update(&mut self) -> usize {
        self.poll(self.completion_budget)
    }

    /// Like [`update`](Self::update), with an explicit cap on completions
    /// in place of the configured budget.
    pub fn poll(&mut self, limit: Option<usize>) -> usize {
        profile_function!();
        let completions = self.clips.poll(limit);

        for completion in &completions {
            let Some(requests) = self.queued.remove(completion.key.name()) else {
                continue;
            };
            match &completion.outcome {
                Ok(()) => {
                    let Some(clip) = self.get(completion.key.name()) else {
                        continue;
                    };
                    for request in requests {
                        let id = self
                            .pool
                            .play_on_free(Arc::clone(&clip), request.looping, request.volume);
                        tracing::trace!("Playing {} on {}", completion.key, id);
                    }
                }
                Err(err) => {
                    tracing::error!(
                        "Dropping {} queued play(s) of {}: {}",
                        requests.len(),
                        completion.key.name(),
                        err
                    );
                }
            }
        }
        completions.len()
    }

    /// Advance playback. Returns how many channels finished.
    pub fn advance(&mut self, dt: Duration) -> usize {
        self.pool.advance(dt)
    }

    pub fn stop_all(&mut self) -> usize {
        self.pool.stop_all()
    }

    /// Release every loaded clip no channel is playing.
    ///
    /// Pending loads are left alone. Returns how many clips were released.
    pub fn clear_unused_clips(&mut self) -> usize {
        profile_function!();
        let mut released = 0;
        for key in self.clips.keys_of_type(TypeId::of::<AudioClip>()) {
            let Some(clip) = self.get(key.name()) else {
                continue;
            };
            if self.pool.is_clip_playing(&clip) {
                continue;
            }
            drop(clip);
            if self.clips.release(&key) {
                released += 1;
            }
        }
        if released > 0 {
            tracing::debug!("Released {} unused clip(s)", released);
        }
        released
    }

    /// Release unused clips and abandon every pending load.
    ///
    /// Clips that are playing stay cached; stop the pool first to release
    /// everything. Plays queued on abandoned loads are dropped. Returns how
    /// many entries were released.
    pub fn clear_all(&mut self) -> usize {
        let mut released = self.clear_unused_clips();
        let pending: Vec<ResourceKey> = self
            .clips
            .keys_of_type(TypeId::of::<AudioClip>())
            .into_iter()
            .filter(|key| self.clips.state(key) == LoadState::Pending)
            .collect();
        for key in &pending {
            if self.clips.release(key) {
                released += 1;
            }
        }
        self.queued.clear();
        if !pending.is_empty() {
            tracing::debug!("Abandoned {} pending clip load(s)", pending.len());
        }
        released
    }

    /// Release one clip, stopping any channel playing it.
    ///
    /// A pending load is abandoned along with its queued plays. Returns false
    /// if nothing was cached under `name`.
    pub fn release_clip(&mut self, name: &str) -> bool {
        if let Some(clip) = self.get(name) {
            let stopped = self.pool.stop_clip(&clip);
            if stopped > 0 {
                tracing::debug!("Stopped {} channel(s) playing {}", stopped, name);
            }
        }
        self.queued.remove(name);
        self.clips.release(&Self::key(name))
    }

    /// The loaded clip `name`.
    pub fn get(&self, name: &str) -> Option<Arc<AudioClip>> {
        let key = Self::key(name);
        let value = self.clips.get(&key)?;
        fetch::downcast::<AudioClip>(&key, value).ok()
    }

    pub fn state(&self, name: &str) -> LoadState {
        self.clips.state(&Self::key(name))
    }

    /// Whether `name` is loaded.
    pub fn is_cached(&self, name: &str) -> bool {
        self.state(name) == LoadState::Succeeded
    }

    /// Number of loaded clips.
    pub fn cached_count(&self) -> usize {
        self.clips.len() - self.clips.pending_count()
    }

    pub fn pending_count(&self) -> usize {
        self.clips.pending_count()
    }

    /// Plays waiting on a pending load.
    pub fn queued_play_count(&self) -> usize {
        self.queued.values().map(Vec::len).sum()
    }

    pub fn pool(&self) -> &ChannelPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ChannelPool {
        &mut self.pool
    }
}

impl Drop for AudioClipCache {
    fn drop(&mut self) {
        self.stop_all();
        let released = self.clear_all();
        if released > 0 {
            tracing::debug!("AudioClipCache dropped with {} live clip(s)", released);
        }
    }
}

impl std::fmt::Debug for AudioClipCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClipCache")
            .field("cached", &self.cached_count())
            .field("pending", &self.pending_count())
            .field("queued_plays", &self.queued_play_count())
            .field("channels", &self.pool.len())
            .field("playing", &self.pool.playing_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_test_utils::MockFetcher;
    use parking_lot::Mutex;

    fn setup(channels: usize) -> (Arc<MockFetcher>, AudioClipCache) {
        let mock = Arc::new(MockFetcher::new());
        mock.insert::<AudioClip>("boom.wav", AudioClip::silence(Duration::from_secs(2), 1, 100));
        mock.insert::<AudioClip>("click.wav", AudioClip::silence(Duration::from_secs(1), 1, 100));
        let cache = AudioClipCache::new(mock.clone(), HandleAllocator::shared(), channels);
        (mock, cache)
    }

    fn load_now(mock: &MockFetcher, cache: &mut AudioClipCache, name: &str) {
        cache.load_clip(name, |_| {}, |err| panic!("{err}"));
        mock.complete_all();
        cache.update();
        assert!(cache.is_cached(name));
    }

    #[test]
    fn test_concurrent_loads_share_one_fetch() {
        let (mock, mut cache) = setup(2);
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            cache.load_clip(
                "boom.wav",
                move |clip| log.lock().push((tag, Arc::as_ptr(&clip) as usize)),
                |err| panic!("{err}"),
            );
        }
        assert_eq!(mock.fetch_count_of::<AudioClip>("boom.wav"), 1);
        assert_eq!(cache.pending_count(), 1);

        mock.complete_all();
        assert_eq!(cache.update(), 1);

        let log = log.lock();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "first");
        assert_eq!(log[1].0, "second");
        assert_eq!(log[0].1, log[1].1);
    }

    #[test]
    fn test_cached_clip_loads_synchronously() {
        let (mock, mut cache) = setup(1);
        load_now(&mock, &mut cache, "click.wav");

        let hit = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&hit);
        let outcome = cache.load_clip("click.wav", move |_| *flag.lock() = true, |err| panic!("{err}"));
        assert_eq!(outcome, LoadOutcome::Hit);
        assert!(*hit.lock());
        assert_eq!(mock.fetch_count_of::<AudioClip>("click.wav"), 1);
    }

    #[test]
    fn test_play_sound_queues_until_loaded() {
        let (mock, mut cache) = setup(2);
        assert_eq!(cache.play_sound("boom.wav", false, 0.5), PlayOutcome::Queued);
        assert_eq!(cache.play_sound("boom.wav", true, 1.0), PlayOutcome::Queued);
        assert_eq!(mock.fetch_count_of::<AudioClip>("boom.wav"), 1);
        assert_eq!(cache.queued_play_count(), 2);
        assert_eq!(cache.pool().playing_count(), 0);

        mock.complete_all();
        cache.update();
        assert_eq!(cache.queued_play_count(), 0);
        assert_eq!(cache.pool().playing_count(), 2);

        let channels: Vec<_> = cache.pool().iter().map(|(_, c)| (c.looping(), c.volume())).collect();
        assert_eq!(channels, vec![(false, 0.5), (true, 1.0)]);
    }

    #[test]
    fn test_play_sound_grows_pool() {
        let (mock, mut cache) = setup(2);
        load_now(&mock, &mut cache, "boom.wav");

        let a = cache.play_sound("boom.wav", false, 1.0);
        let b = cache.play_sound("boom.wav", false, 1.0);
        assert_ne!(a, b);
        assert_eq!(cache.pool().len(), 2);

        match cache.play_sound("boom.wav", false, 1.0) {
            PlayOutcome::Started(id) => assert_eq!(id.index(), 2),
            PlayOutcome::Queued => panic!("clip was cached"),
        }
        assert_eq!(cache.pool().len(), 3);
    }

    #[test]
    fn test_failed_load_drops_queued_plays() {
        let (mock, mut cache) = setup(1);
        mock.fail::<AudioClip>("missing.wav", "no such clip");

        let error = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&error);
        cache.load_clip("missing.wav", |_| panic!("should fail"), move |err| {
            *sink.lock() = Some(err.to_string());
        });
        cache.play_sound("missing.wav", false, 1.0);

        mock.complete_all();
        cache.update();
        assert!(error.lock().as_deref().unwrap().contains("missing.wav"));
        assert_eq!(cache.queued_play_count(), 0);
        assert_eq!(cache.pool().playing_count(), 0);
        assert_eq!(cache.state("missing.wav"), LoadState::NotStarted);
    }

    #[test]
    fn test_clear_unused_keeps_playing_clips() {
        let (mock, mut cache) = setup(2);
        load_now(&mock, &mut cache, "boom.wav");
        load_now(&mock, &mut cache, "click.wav");
        cache.play_sound("boom.wav", false, 1.0);

        assert_eq!(cache.clear_unused_clips(), 1);
        assert!(cache.is_cached("boom.wav"));
        assert!(!cache.is_cached("click.wav"));

        // Once playback ends the clip becomes evictable.
        cache.advance(Duration::from_secs(3));
        assert_eq!(cache.clear_unused_clips(), 1);
        assert_eq!(cache.cached_count(), 0);
    }

    #[test]
    fn test_clear_all_abandons_pending() {
        let (mock, mut cache) = setup(1);
        load_now(&mock, &mut cache, "boom.wav");
        cache.play_sound("boom.wav", true, 1.0);
        cache.play_sound("click.wav", false, 1.0);
        let pending = mock.handle_for(&ResourceKey::of::<AudioClip>("click.wav")).unwrap();

        assert_eq!(cache.clear_all(), 1);
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(cache.queued_play_count(), 0);
        assert!(mock.is_released(pending));
        // Still playing, so still cached.
        assert!(cache.is_cached("boom.wav"));

        // A late completion for the abandoned load goes nowhere.
        mock.complete_all();
        assert_eq!(cache.update(), 0);
        assert!(!cache.is_cached("click.wav"));

        cache.stop_all();
        assert_eq!(cache.clear_all(), 1);
        assert_eq!(cache.cached_count(), 0);
    }

    #[test]
    fn test_drop_releases_playing_and_pending_clips() {
        let (mock, mut cache) = setup(1);
        load_now(&mock, &mut cache, "boom.wav");
        cache.play_sound("boom.wav", true, 1.0);
        cache.play_sound("click.wav", false, 1.0);
        assert_eq!(mock.live_handles().len(), 2);

        drop(cache);
        assert!(mock.live_handles().is_empty());
    }

    #[test]
    fn test_poll_limit_overrides_budget() {
        let (mock, mut cache) = setup(1);
        cache.set_completion_budget(Some(0));
        cache.load_clip("boom.wav", |_| {}, |err| panic!("{err}"));
        cache.load_clip("click.wav", |_| {}, |err| panic!("{err}"));
        mock.complete_all();

        // Zero is raised to one, so the update still makes progress.
        assert_eq!(cache.update(), 1);
        assert_eq!(cache.poll(Some(5)), 1);
        assert_eq!(cache.pending_count(), 0);
    }

    #[test]
    fn test_release_clip_stops_channels() {
        let (mock, mut cache) = setup(2);
        load_now(&mock, &mut cache, "boom.wav");
        cache.play_sound("boom.wav", true, 1.0);
        cache.play_sound("boom.wav", true, 1.0);

        assert!(cache.release_clip("boom.wav"));
        assert_eq!(cache.pool().playing_count(), 0);
        assert!(!cache.release_clip("boom.wav"));
    }
}
