//! Hearth - load once, share, release deterministically.
//!
//! Hearth bundles two subsystems behind one explicitly constructed
//! [`Engine`]:
//!
//! - **Assets**: [`AssetServer`](assets::AssetServer) loads resources by key
//!   through an [`AssetFetcher`](assets::AssetFetcher), coalesces concurrent
//!   requests, caches results per type and tracks every object instantiated
//!   from them so it can be released symmetrically.
//! - **Audio**: [`AudioClipCache`](audio::AudioClipCache) caches clips and
//!   plays them on a [`ChannelPool`](audio::ChannelPool) that grows on demand,
//!   never evicting a clip that is still playing.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use hearth::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     hearth::core::logging::init();
//!
//!     let mut engine = Engine::builder().with_asset_root("assets").build()?;
//!     engine.assets_mut().load::<String>(
//!         "intro.txt",
//!         |text| println!("{text}"),
//!         |err| eprintln!("{err}"),
//!     );
//!     engine.audio_mut().play_sound("theme.wav", true, 0.6);
//!
//!     loop {
//!         engine.update(Duration::from_millis(16));
//!         # break;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Completion is cooperative: callbacks only run inside [`Engine::update`].

pub mod engine;

pub use hearth_assets as assets;
pub use hearth_audio as audio;
pub use hearth_core as core;
pub use hearth_core::math;

pub use engine::{Engine, EngineBuilder, EngineError};
pub use hearth_core::{Config, TaskPool};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::engine::{Engine, EngineBuilder, EngineError};
    pub use hearth_core::Config;
    pub use hearth_core::math::{Quat, Vec3};

    pub use hearth_assets::{
        Asset, AssetError, AssetEvent, AssetFetcher, AssetInstantiator, AssetLoader, AssetServer,
        Instance, InstanceId, LoadContext, LoadOutcome, LoadState, Placement, ResourceKey,
    };
    pub use hearth_audio::{AudioClip, AudioClipCache, ChannelId, PlayOutcome};
}
