//! Asset server - the main coordinator for asset operations.

use std::any::TypeId;
use std::sync::Arc;

use hearth_core::profiling::profile_function;

use crate::cache::{AssetCache, LoadOutcome};
use crate::error::AssetError;
use crate::event::{AssetEvent, AssetEventBuffer};
use crate::fetch::{self, AssetFetcher, ErasedAsset, Placement};
use crate::handle::{FetchHandle, HandleAllocator, Instance, InstanceId};
use crate::key::ResourceKey;
use crate::operation::Observer;
use crate::state::LoadState;
use crate::tracker::InstantiationTracker;
use crate::Asset;

/// Loads, caches and instantiates assets through one [`AssetFetcher`].
///
/// # Example
///
/// ```ignore
/// let mut server = AssetServer::new(fetcher);
///
/// server.load::<String>(
///     "dialogue/intro.txt",
///     |text| println!("{text}"),
///     |err| tracing::error!("{err}"),
/// );
///
/// // Each frame:
/// server.update();
/// for event in server.drain_events() {
///     match event {
///         AssetEvent::Loaded { key, .. } => {}
///         AssetEvent::LoadFailed { key, error } => {}
///         _ => {}
///     }
/// }
///
/// // When the level unloads:
/// server.release_all();
/// ```
///
/// Callbacks run inside [`load`](Self::load) on a cache hit and inside
/// [`update`](Self::update) otherwise. They cannot borrow the server; queue
/// follow-up work and issue it after `update` returns.
pub struct AssetServer {
    cache: AssetCache,
    tracker: InstantiationTracker,
    handles: Arc<HandleAllocator>,
    events: AssetEventBuffer,
    completion_budget: Option<usize>,
}

impl AssetServer {
    pub fn new(fetcher: Arc<dyn AssetFetcher>) -> Self {
        Self::with_handles(fetcher, HandleAllocator::shared())
    }

    /// Create a server that draws fetch handles from a shared allocator.
    pub fn with_handles(fetcher: Arc<dyn AssetFetcher>, handles: Arc<HandleAllocator>) -> Self {
        Self {
            cache: AssetCache::new(Arc::clone(&fetcher), Arc::clone(&handles)),
            tracker: InstantiationTracker::new(fetcher, Arc::clone(&handles)),
            handles,
            events: AssetEventBuffer::new(),
            completion_budget: None,
        }
    }

    /// Cap how many completions one [`update`](Self::update) dispatches.
    ///
    /// A budget of zero is raised to one so loads always make progress.
    pub fn set_completion_budget(&mut self, budget: Option<usize>) {
        self.completion_budget = budget.map(|limit| limit.max(1));
    }

    pub fn handles(&self) -> &Arc<HandleAllocator> {
        &self.handles
    }

    pub fn cache(&self) -> &AssetCache {
        &self.cache
    }

    pub fn tracker(&self) -> &InstantiationTracker {
        &self.tracker
    }

    /// Load an asset by name.
    ///
    /// On a cache hit `on_success` runs before this returns. A load for a
    /// name that is already in flight joins it; both callbacks fire from the
    /// same completion, in the order they were registered.
    pub fn load<T: Asset>(
        &mut self,
        name: impl Into<Arc<str>>,
        on_success: impl FnOnce(Arc<T>) + Send + 'static,
        on_error: impl FnOnce(Arc<AssetError>) + Send + 'static,
    ) -> LoadOutcome {
        let key = ResourceKey::of::<T>(name);
        let observer_key = key.clone();
        self.cache.load(
            key,
            Box::new(move |result| {
                let typed = result
                    .and_then(|value| fetch::downcast::<T>(&observer_key, value).map_err(Arc::new));
                match typed {
                    Ok(value) => on_success(value),
                    Err(err) => on_error(err),
                }
            }),
        )
    }

    /// Load by an already built key with an untyped observer.
    pub fn load_key(&mut self, key: ResourceKey, observer: Observer<ErasedAsset>) -> LoadOutcome {
        self.cache.load(key, observer)
    }

    /// Start loading an asset without waiting on the result.
    pub fn request<T: Asset>(&mut self, name: impl Into<Arc<str>>) -> LoadOutcome {
        self.cache.load(ResourceKey::of::<T>(name), Box::new(|_| {}))
    }

    /// The cached value, if loaded.
    pub fn get<T: Asset>(&self, name: &str) -> Option<Arc<T>> {
        let value = self.cache.get(&ResourceKey::of::<T>(name))?;
        value.downcast::<T>().ok()
    }

    pub fn state<T: Asset>(&self, name: &str) -> LoadState {
        self.cache.state(&ResourceKey::of::<T>(name))
    }

    pub fn is_cached<T: Asset>(&self, name: &str) -> bool {
        self.state::<T>(name) == LoadState::Succeeded
    }

    /// Create a placed instance of `I` from the resource named `name`.
    ///
    /// The instance is tracked from the moment `on_success` sees it until
    /// [`release_instance`](Self::release_instance) is called with its id.
    pub fn instantiate<I: Asset>(
        &mut self,
        name: impl Into<Arc<str>>,
        placement: Placement,
        on_success: impl FnOnce(Instance<I>) + Send + 'static,
        on_error: impl FnOnce(Arc<AssetError>) + Send + 'static,
    ) -> FetchHandle {
        let key = ResourceKey::of::<I>(name);
        let observer_key = key.clone();
        self.tracker.instantiate(
            key,
            placement,
            Box::new(move |result| {
                let typed = result.and_then(|(id, object)| {
                    fetch::downcast::<I>(&observer_key, object)
                        .map(|object| Instance { id, object })
                        .map_err(Arc::new)
                });
                match typed {
                    Ok(instance) => on_success(instance),
                    Err(err) => on_error(err),
                }
            }),
        )
    }

    /// The object behind a tracked instance id.
    pub fn instance<I: Asset>(&self, id: InstanceId) -> Option<Arc<I>> {
        let object = Arc::clone(self.tracker.get(id)?);
        object.downcast::<I>().ok()
    }

    /// Release an instance and its fetch handle.
    ///
    /// Ids that were not produced by [`instantiate`](Self::instantiate) are
    /// ignored with a warning and return false.
    pub fn release_instance(&mut self, id: InstanceId) -> bool {
        let key = self.tracker.key_of(id).cloned();
        let released = self.tracker.release(id);
        if let (true, Some(key)) = (released, key) {
            self.events.push(AssetEvent::InstanceReleased { key, id });
        }
        released
    }

    /// Release the cached entry for `name`. A no-op if nothing is cached.
    pub fn release<T: Asset>(&mut self, name: &str) -> bool {
        self.release_key(&ResourceKey::of::<T>(name))
    }

    pub fn release_key(&mut self, key: &ResourceKey) -> bool {
        let released = self.cache.release(key);
        if released {
            self.events.push(AssetEvent::Released { key: key.clone() });
        }
        released
    }

    pub fn release_all_of<T: Asset>(&mut self) -> usize {
        self.release_all_of_type(TypeId::of::<T>())
    }

    pub fn release_all_of_type(&mut self, type_id: TypeId) -> usize {
        let keys = self.cache.keys_of_type(type_id);
        let count = self.cache.release_all_of_type(type_id);
        self.push_released(keys);
        count
    }

    /// Release every instance, then every cached entry.
    ///
    /// Afterwards the cache and the instance tracker are both empty.
    pub fn release_all(&mut self) -> usize {
        let instances: Vec<_> = self
            .tracker
            .ids()
            .filter_map(|id| self.tracker.key_of(id).map(|key| (id, key.clone())))
            .collect();
        self.tracker.release_all();
        for (id, key) in instances {
            self.events.push(AssetEvent::InstanceReleased { key, id });
        }

        let keys = self.cache.keys();
        let count = self.cache.release_all();
        self.push_released(keys);
        tracing::debug!("Released all assets ({} cache entries)", count);
        count
    }

    fn push_released(&mut self, keys: Vec<ResourceKey>) {
        for key in keys {
            self.events.push(AssetEvent::Released { key });
        }
    }

    /// Dispatch completed fetches and instantiations.
    ///
    /// Call once per frame. Never blocks; returns how many completions ran.
    pub fn update(&mut self) -> usize {
        profile_function!();
        let budget = self.completion_budget;

        let loads = self.cache.poll(budget);
        let mut dispatched = loads.len();
        for completion in loads {
            self.events.push(match completion.outcome {
                Ok(()) => AssetEvent::Loaded {
                    key: completion.key,
                    handle: completion.handle,
                },
                Err(error) => AssetEvent::LoadFailed {
                    key: completion.key,
                    error,
                },
            });
        }

        let remaining = budget.map(|limit| limit.saturating_sub(dispatched));
        if remaining != Some(0) {
            let instances = self.tracker.poll(remaining);
            dispatched += instances.len();
            for completion in instances {
                self.events.push(match completion.outcome {
                    Ok(id) => AssetEvent::Instantiated {
                        key: completion.key,
                        id,
                    },
                    Err(error) => AssetEvent::InstantiationFailed {
                        key: completion.key,
                        error,
                    },
                });
            }
        }
        dispatched
    }

    /// Number of cache entries, pending or loaded.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Loads and instantiations still in flight.
    pub fn pending_count(&self) -> usize {
        self.cache.pending_count() + self.tracker.pending_count()
    }

    pub fn instance_count(&self) -> usize {
        self.tracker.len()
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = AssetEvent> + '_ {
        self.events.drain()
    }

    pub fn iter_events(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.iter()
    }

    /// Events for assets of type `T` recorded since the last drain.
    pub fn events_of<T: Asset>(&self) -> impl Iterator<Item = &AssetEvent> {
        self.events.of_type::<T>()
    }
}

impl Drop for AssetServer {
    fn drop(&mut self) {
        let released = self.release_all();
        if released > 0 {
            tracing::debug!("AssetServer dropped with {} live entries", released);
        }
    }
}

impl std::fmt::Debug for AssetServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetServer")
            .field("cache", &self.cache)
            .field("tracker", &self.tracker)
            .field("events", &self.events.len())
            .finish()
    }
}
