//! Growable pool of playback channels.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hearth_core::profiling::profile_function;

use crate::clip::AudioClip;

/// Index of a channel in its [`ChannelPool`]. Channels are never removed, so
/// an id stays valid for the life of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u32);

impl ChannelId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub enum ChannelState {
    #[default]
    Idle,
    Playing(Arc<AudioClip>),
}

impl ChannelState {
    pub fn is_idle(&self) -> bool {
        matches!(self, ChannelState::Idle)
    }

    pub fn clip(&self) -> Option<&Arc<AudioClip>> {
        match self {
            ChannelState::Idle => None,
            ChannelState::Playing(clip) => Some(clip),
        }
    }
}

/// One playback slot.
#[derive(Debug, Clone)]
pub struct Channel {
    state: ChannelState,
    looping: bool,
    volume: f32,
    /// Playback position within the current clip.
    cursor: Duration,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            state: ChannelState::Idle,
            looping: false,
            volume: 1.0,
            cursor: Duration::ZERO,
        }
    }
}

impl Channel {
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_idle()
    }

    pub fn is_playing(&self) -> bool {
        !self.state.is_idle()
    }

    pub fn clip(&self) -> Option<&Arc<AudioClip>> {
        self.state.clip()
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn cursor(&self) -> Duration {
        self.cursor
    }

    fn start(&mut self, clip: Arc<AudioClip>, looping: bool, volume: f32) {
        self.state = ChannelState::Playing(clip);
        self.looping = looping;
        self.volume = volume.clamp(0.0, 1.0);
        self.cursor = Duration::ZERO;
    }

    fn stop(&mut self) {
        self.state = ChannelState::Idle;
        self.looping = false;
        self.cursor = Duration::ZERO;
    }

    /// Move the cursor forward. Returns true if the channel went idle.
    fn advance(&mut self, dt: Duration) -> bool {
        let ChannelState::Playing(clip) = &self.state else {
            return false;
        };
        let length = clip.duration();
        let cursor = self.cursor + dt;

        if cursor < length {
            self.cursor = cursor;
            return false;
        }
        if self.looping && !length.is_zero() {
            let wrapped = cursor.as_nanos() % length.as_nanos();
            self.cursor = Duration::from_nanos(wrapped as u64);
            return false;
        }
        self.stop();
        true
    }
}

/// Playback channels, searched first-idle-first and grown on demand.
///
/// The pool knows nothing about caching; it only holds the clip each channel
/// is playing.
#[derive(Debug, Default)]
pub struct ChannelPool {
    channels: Vec<Channel>,
}

impl ChannelPool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: vec![Channel::default(); capacity],
        }
    }

    /// The first idle channel, or a new one appended to the pool.
    ///
    /// Never fails. Growth is permanent.
    pub fn acquire(&mut self) -> ChannelId {
        profile_function!();
        if let Some(index) = self.channels.iter().position(Channel::is_idle) {
            return ChannelId(index as u32);
        }
        self.channels.push(Channel::default());
        let id = ChannelId((self.channels.len() - 1) as u32);
        tracing::debug!("All channels busy, grew pool to {} ({})", self.channels.len(), id);
        id
    }

    /// Start `clip` on `id`, replacing whatever it was playing.
    ///
    /// Volume is clamped to `[0.0, 1.0]`. Returns false for an unknown id.
    pub fn play(&mut self, id: ChannelId, clip: Arc<AudioClip>, looping: bool, volume: f32) -> bool {
        match self.channels.get_mut(id.index()) {
            Some(channel) => {
                channel.start(clip, looping, volume);
                true
            }
            None => {
                tracing::warn!("Play on unknown {}", id);
                false
            }
        }
    }

    /// Acquire a channel and start `clip` on it.
    pub fn play_on_free(&mut self, clip: Arc<AudioClip>, looping: bool, volume: f32) -> ChannelId {
        let id = self.acquire();
        self.channels[id.index()].start(clip, looping, volume);
        id
    }

    /// Returns true if the channel was playing.
    pub fn stop(&mut self, id: ChannelId) -> bool {
        match self.channels.get_mut(id.index()) {
            Some(channel) if channel.is_playing() => {
                channel.stop();
                true
            }
            _ => false,
        }
    }

    /// Stop every channel playing `clip`. Returns how many were stopped.
    pub fn stop_clip(&mut self, clip: &Arc<AudioClip>) -> usize {
        let mut stopped = 0;
        for channel in &mut self.channels {
            if channel.clip().is_some_and(|playing| Arc::ptr_eq(playing, clip)) {
                channel.stop();
                stopped += 1;
            }
        }
        stopped
    }

    /// Stop every channel. Returns how many were playing.
    pub fn stop_all(&mut self) -> usize {
        let mut stopped = 0;
        for channel in &mut self.channels {
            if channel.is_playing() {
                channel.stop();
                stopped += 1;
            }
        }
        stopped
    }

    /// Advance every playing channel by `dt`.
    ///
    /// Non-looping channels go idle once their clip has run out. Returns how
    /// many channels finished.
    pub fn advance(&mut self, dt: Duration) -> usize {
        profile_function!();
        self.channels
            .iter_mut()
            .map(|channel| channel.advance(dt))
            .filter(|finished| *finished)
            .count()
    }

    /// Whether any channel is playing this exact clip.
    pub fn is_clip_playing(&self, clip: &Arc<AudioClip>) -> bool {
        self.channels
            .iter()
            .filter_map(Channel::clip)
            .any(|playing| Arc::ptr_eq(playing, clip))
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn playing_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_playing()).count()
    }

    pub fn idle_count(&self) -> usize {
        self.channels.len() - self.playing_count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelId, &Channel)> {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, channel)| (ChannelId(index as u32), channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(seconds: u64) -> Arc<AudioClip> {
        Arc::new(AudioClip::silence(Duration::from_secs(seconds), 1, 100))
    }

    #[test]
    fn test_acquire_prefers_first_idle() {
        let mut pool = ChannelPool::with_capacity(3);
        let first = pool.acquire();
        assert_eq!(first.index(), 0);
        // Not played yet, so the same channel is still idle.
        assert_eq!(pool.acquire(), first);

        pool.play(first, clip(1), false, 1.0);
        assert_eq!(pool.acquire().index(), 1);
    }

    #[test]
    fn test_pool_grows_by_one_when_full() {
        let mut pool = ChannelPool::with_capacity(2);
        let sound = clip(5);
        pool.play_on_free(Arc::clone(&sound), false, 1.0);
        pool.play_on_free(Arc::clone(&sound), false, 1.0);
        assert_eq!(pool.idle_count(), 0);

        let third = pool.acquire();
        assert_eq!(third.index(), 2);
        assert_eq!(pool.len(), 3);
        assert!(pool.channel(third).unwrap().is_idle());
    }

    #[test]
    fn test_empty_pool_grows() {
        let mut pool = ChannelPool::default();
        assert!(pool.is_empty());
        assert_eq!(pool.acquire().index(), 0);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut pool = ChannelPool::with_capacity(2);
        let loud = pool.play_on_free(clip(1), false, 3.0);
        let quiet = pool.play_on_free(clip(1), false, -1.0);
        assert_eq!(pool.channel(loud).unwrap().volume(), 1.0);
        assert_eq!(pool.channel(quiet).unwrap().volume(), 0.0);
    }

    #[test]
    fn test_advance_finishes_one_shot() {
        let mut pool = ChannelPool::with_capacity(1);
        let id = pool.play_on_free(clip(2), false, 1.0);

        assert_eq!(pool.advance(Duration::from_secs(1)), 0);
        assert_eq!(pool.channel(id).unwrap().cursor(), Duration::from_secs(1));
        assert_eq!(pool.advance(Duration::from_secs(1)), 1);
        assert!(pool.channel(id).unwrap().is_idle());
    }

    #[test]
    fn test_advance_wraps_looping() {
        let mut pool = ChannelPool::with_capacity(1);
        let id = pool.play_on_free(clip(2), true, 1.0);

        assert_eq!(pool.advance(Duration::from_secs(5)), 0);
        let channel = pool.channel(id).unwrap();
        assert!(channel.is_playing());
        assert_eq!(channel.cursor(), Duration::from_secs(1));
    }

    #[test]
    fn test_is_clip_playing_uses_identity() {
        let mut pool = ChannelPool::with_capacity(1);
        let playing = clip(1);
        let lookalike = Arc::new((*playing).clone());
        pool.play_on_free(Arc::clone(&playing), false, 1.0);

        assert!(pool.is_clip_playing(&playing));
        assert!(!pool.is_clip_playing(&lookalike));
    }

    #[test]
    fn test_stop_clip_and_stop_all() {
        let mut pool = ChannelPool::with_capacity(3);
        let a = clip(1);
        let b = clip(1);
        pool.play_on_free(Arc::clone(&a), false, 1.0);
        pool.play_on_free(Arc::clone(&a), false, 1.0);
        let last = pool.play_on_free(Arc::clone(&b), true, 1.0);

        assert_eq!(pool.stop_clip(&a), 2);
        assert_eq!(pool.playing_count(), 1);
        assert!(pool.stop(last));
        assert!(!pool.stop(last));
        assert_eq!(pool.stop_all(), 0);
    }
}
