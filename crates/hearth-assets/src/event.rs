//! Asset events recorded by the [`AssetServer`](crate::AssetServer).

use std::any::TypeId;
use std::sync::Arc;

use crate::error::AssetError;
use crate::handle::{FetchHandle, InstanceId};
use crate::key::ResourceKey;

/// Something that happened to a key during loading or release.
#[derive(Debug, Clone)]
pub enum AssetEvent {
    /// A fetch completed and the value is cached.
    Loaded { key: ResourceKey, handle: FetchHandle },

    /// A fetch failed; nothing was cached.
    LoadFailed {
        key: ResourceKey,
        error: Arc<AssetError>,
    },

    /// A cache entry was released.
    Released { key: ResourceKey },

    /// An instance was created and is now tracked.
    Instantiated { key: ResourceKey, id: InstanceId },

    /// An instantiate request failed; nothing was tracked.
    InstantiationFailed {
        key: ResourceKey,
        error: Arc<AssetError>,
    },

    /// A tracked instance was released.
    InstanceReleased { key: ResourceKey, id: InstanceId },
}

impl AssetEvent {
    /// The key this event relates to.
    pub fn key(&self) -> &ResourceKey {
        match self {
            AssetEvent::Loaded { key, .. }
            | AssetEvent::LoadFailed { key, .. }
            | AssetEvent::Released { key }
            | AssetEvent::Instantiated { key, .. }
            | AssetEvent::InstantiationFailed { key, .. }
            | AssetEvent::InstanceReleased { key, .. } => key,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.key().type_id()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, AssetEvent::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            AssetEvent::LoadFailed { .. } | AssetEvent::InstantiationFailed { .. }
        )
    }

    pub fn is_released(&self) -> bool {
        matches!(
            self,
            AssetEvent::Released { .. } | AssetEvent::InstanceReleased { .. }
        )
    }
}

/// A buffer of asset events that can be drained each frame.
#[derive(Debug, Default)]
pub struct AssetEventBuffer {
    events: Vec<AssetEvent>,
}

impl AssetEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: AssetEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = AssetEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }

    /// Events for assets of type `T`.
    pub fn of_type<T: 'static>(&self) -> impl Iterator<Item = &AssetEvent> {
        let type_id = TypeId::of::<T>();
        self.events.iter().filter(move |e| e.type_id() == type_id)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
