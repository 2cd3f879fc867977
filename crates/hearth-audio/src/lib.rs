//! Audio clip caching and pooled playback for Hearth.
//!
//! [`AudioClipCache`] loads [`AudioClip`]s through the same fetch capability
//! as the asset server, shares one load between everyone asking for a clip,
//! and routes plays into a [`ChannelPool`] that grows when every channel is
//! busy.
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hearth_assets::HandleAllocator;
//! use hearth_audio::{AudioClip, AudioClipCache, PlayOutcome};
//! # use hearth_assets::{fetch, AssetFetcher, ErasedAsset, FetchFuture, FetchHandle, FetchRequest, InstantiateRequest};
//! # struct Silence;
//! # impl AssetFetcher for Silence {
//! #     fn fetch(&self, _: &FetchRequest) -> FetchFuture {
//! #         let clip: ErasedAsset = Arc::new(AudioClip::silence(Duration::from_secs(1), 1, 100));
//! #         fetch::ready(Ok(clip))
//! #     }
//! #     fn instantiate(&self, r: &InstantiateRequest) -> FetchFuture {
//! #         fetch::ready(Err(hearth_assets::AssetError::NoInstantiator { key: r.key.clone() }))
//! #     }
//! #     fn release(&self, _: FetchHandle) {}
//! # }
//!
//! let mut audio = AudioClipCache::new(Arc::new(Silence), HandleAllocator::shared(), 4);
//! assert_eq!(audio.play_sound("door.wav", false, 0.8), PlayOutcome::Queued);
//!
//! audio.update();
//! assert_eq!(audio.pool().playing_count(), 1);
//!
//! audio.advance(Duration::from_secs(2));
//! assert_eq!(audio.clear_unused_clips(), 1);
//! ```

pub mod cache;
pub mod channel;
pub mod clip;
pub mod wav;

pub use cache::{AudioClipCache, PlayOutcome};
pub use channel::{Channel, ChannelId, ChannelPool, ChannelState};
pub use clip::AudioClip;
pub use wav::WavLoader;
