//! Type-partitioned cache of load operations.

use std::any::TypeId;
use std::sync::Arc;

use hearth_core::alloc::HashMap;
use hearth_core::profiling::profile_function;

use crate::error::AssetError;
use crate::fetch::{self, AssetFetcher, ErasedAsset, FetchRequest};
use crate::handle::{FetchHandle, HandleAllocator};
use crate::key::ResourceKey;
use crate::operation::{LoadOperation, Observer};
use crate::state::LoadState;

/// How a [`AssetCache::load`] call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The value was cached; the observer already ran.
    Hit,
    /// A fetch for the key was already in flight; the observer was queued on it.
    Joined,
    /// A new fetch was issued with this handle.
    Issued(FetchHandle),
}

impl LoadOutcome {
    /// Whether this call started a fetch.
    pub fn issued(&self) -> bool {
        matches!(self, LoadOutcome::Issued(_))
    }
}

/// One operation that left `Pending` during [`AssetCache::poll`].
#[derive(Debug, Clone)]
pub struct Completion {
    pub key: ResourceKey,
    pub handle: FetchHandle,
    pub outcome: Result<(), Arc<AssetError>>,
}

struct Partition {
    type_name: &'static str,
    entries: HashMap<Arc<str>, LoadOperation<ErasedAsset>>,
}

impl Partition {
    fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            entries: HashMap::default(),
        }
    }
}

/// Load operations keyed by `(type, name)`.
///
/// At most one operation exists per key. A load for a key that is already
/// pending joins that operation instead of issuing a second fetch. Failed
/// operations are removed as soon as they complete, so the next load
/// retries. Releasing an entry gives its handle back to the fetcher; a
/// pending entry is abandoned and its eventual completion is discarded.
///
/// Observers run on the thread that calls [`load`](Self::load) or
/// [`poll`](Self::poll) and must not call back into the cache.
pub struct AssetCache {
    fetcher: Arc<dyn AssetFetcher>,
    handles: Arc<HandleAllocator>,
    partitions: HashMap<TypeId, Partition>,
}

impl AssetCache {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, handles: Arc<HandleAllocator>) -> Self {
        Self {
            fetcher,
            handles,
            partitions: HashMap::default(),
        }
    }

    pub fn fetcher(&self) -> &Arc<dyn AssetFetcher> {
        &self.fetcher
    }

    /// Load `key`, calling `observer` with the result exactly once.
    pub fn load(&mut self, key: ResourceKey, observer: Observer<ErasedAsset>) -> LoadOutcome {
        let partition = self
            .partitions
            .entry(key.type_id())
            .or_insert_with(|| Partition::new(key.type_name()));

        if let Some(op) = partition.entries.get_mut(key.name()) {
            let outcome = if op.is_pending() {
                tracing::trace!("Joining pending load of {}", key);
                LoadOutcome::Joined
            } else {
                tracing::trace!("Cache hit for {}", key);
                LoadOutcome::Hit
            };
            op.observe(observer);
            return outcome;
        }

        let handle = self.handles.allocate();
        let request = FetchRequest {
            handle,
            key: key.clone(),
        };
        let future = fetch::checked(key.clone(), self.fetcher.fetch(&request));
        let mut op = LoadOperation::new(handle, key.clone(), future);
        op.observe(observer);

        tracing::debug!("Cache miss for {}, fetching as {}", key, handle);
        partition.entries.insert(key.shared_name(), op);
        LoadOutcome::Issued(handle)
    }

    /// Poll pending operations once each.
    ///
    /// At most `limit` completions are dispatched; the rest are picked up by
    /// later calls. Failed entries are dropped and their handles released.
    pub fn poll(&mut self, limit: Option<usize>) -> Vec<Completion> {
        profile_function!();
        let limit = limit.unwrap_or(usize::MAX);
        let mut completions = Vec::new();
        let mut failed = Vec::new();

        'partitions: for (type_id, partition) in self.partitions.iter_mut() {
            for (name, op) in partition.entries.iter_mut() {
                if completions.len() >= limit {
                    break 'partitions;
                }
                if !op.is_pending() {
                    continue;
                }
                let Some(state) = op.poll() else {
                    continue;
                };
                let outcome = match op.state().error() {
                    Some(err) => Err(Arc::clone(err)),
                    None => Ok(()),
                };
                if state == LoadState::Failed {
                    failed.push((*type_id, Arc::clone(name)));
                }
                completions.push(Completion {
                    key: op.key().clone(),
                    handle: op.handle(),
                    outcome,
                });
            }
        }

        for (type_id, name) in failed {
            let removed = self
                .partitions
                .get_mut(&type_id)
                .and_then(|partition| partition.entries.remove(&name));
            if let Some(op) = removed {
                self.fetcher.release(op.handle());
            }
        }

        for completion in &completions {
            match &completion.outcome {
                Ok(()) => tracing::debug!("Loaded {}", completion.key),
                Err(err) => tracing::debug!("Load of {} failed: {}", completion.key, err),
            }
        }
        completions
    }

    /// The cached value for `key`, if loaded.
    pub fn get(&self, key: &ResourceKey) -> Option<ErasedAsset> {
        self.entry(key).and_then(|op| op.value()).cloned()
    }

    pub fn state(&self, key: &ResourceKey) -> LoadState {
        self.entry(key)
            .map(|op| op.load_state())
            .unwrap_or(LoadState::NotStarted)
    }

    /// Whether an entry (pending or loaded) exists for `key`.
    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.entry(key).is_some()
    }

    pub fn handle_of(&self, key: &ResourceKey) -> Option<FetchHandle> {
        self.entry(key).map(|op| op.handle())
    }

    fn entry(&self, key: &ResourceKey) -> Option<&LoadOperation<ErasedAsset>> {
        self.partitions
            .get(&key.type_id())
            .and_then(|partition| partition.entries.get(key.name()))
    }

    /// Remove the entry for `key` and release its handle.
    ///
    /// Returns false if nothing was cached for the key.
    pub fn release(&mut self, key: &ResourceKey) -> bool {
        let removed = self
            .partitions
            .get_mut(&key.type_id())
            .and_then(|partition| partition.entries.remove(key.name()));
        match removed {
            Some(op) => {
                tracing::debug!("Releasing {} ({})", key, op.handle());
                self.release_operation(op);
                true
            }
            None => {
                tracing::trace!("Release of {} ignored, not cached", key);
                false
            }
        }
    }

    /// Release every entry of one type. Returns how many were released.
    pub fn release_all_of_type(&mut self, type_id: TypeId) -> usize {
        let Some(partition) = self.partitions.remove(&type_id) else {
            return 0;
        };
        let count = partition.entries.len();
        if count > 0 {
            tracing::debug!("Releasing {} cached {} entries", count, partition.type_name);
        }
        for (_, op) in partition.entries {
            self.release_operation(op);
        }
        count
    }

    /// Release every entry of every type.
    pub fn release_all(&mut self) -> usize {
        let type_ids: Vec<TypeId> = self.partitions.keys().copied().collect();
        type_ids
            .into_iter()
            .map(|type_id| self.release_all_of_type(type_id))
            .sum()
    }

    fn release_operation(&self, op: LoadOperation<ErasedAsset>) {
        let handle = op.handle();
        if op.is_pending() {
            op.abandon();
        }
        self.fetcher.release(handle);
    }

    /// Keys of every entry.
    pub fn keys(&self) -> Vec<ResourceKey> {
        self.partitions
            .values()
            .flat_map(|partition| partition.entries.values().map(|op| op.key().clone()))
            .collect()
    }

    /// Keys of every entry of one type.
    pub fn keys_of_type(&self, type_id: TypeId) -> Vec<ResourceKey> {
        self.partitions
            .get(&type_id)
            .map(|partition| partition.entries.values().map(|op| op.key().clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(|p| p.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len_of_type(&self, type_id: TypeId) -> usize {
        self.partitions
            .get(&type_id)
            .map_or(0, |partition| partition.entries.len())
    }

    pub fn pending_count(&self) -> usize {
        self.partitions
            .values()
            .flat_map(|p| p.entries.values())
            .filter(|op| op.is_pending())
            .count()
    }
}

impl std::fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for partition in self.partitions.values() {
            map.entry(&partition.type_name, &partition.entries.len());
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetResult;
    use crate::fetch::{FetchFuture, InstantiateRequest};
    use parking_lot::Mutex;

    /// Resolves a fetch only once the test says so.
    #[derive(Default)]
    struct GateFetcher {
        slots: Mutex<Vec<(ResourceKey, Arc<Mutex<Option<AssetResult<ErasedAsset>>>>)>>,
        released: Mutex<Vec<FetchHandle>>,
    }

    impl GateFetcher {
        fn fetches(&self, key: &ResourceKey) -> usize {
            self.slots.lock().iter().filter(|(k, _)| k == key).count()
        }

        fn resolve(&self, key: &ResourceKey, result: AssetResult<ErasedAsset>) {
            let slots = self.slots.lock();
            let slot = slots.iter().rev().find(|(k, _)| k == key).map(|(_, s)| s.clone());
            if let Some(slot) = slot {
                *slot.lock() = Some(result);
            }
        }
    }

    impl AssetFetcher for GateFetcher {
        fn fetch(&self, request: &FetchRequest) -> FetchFuture {
            let slot = Arc::new(Mutex::new(None));
            self.slots.lock().push((request.key.clone(), Arc::clone(&slot)));
            Box::pin(futures_lite::future::poll_fn(move |_| match slot.lock().take() {
                Some(result) => std::task::Poll::Ready(result),
                None => std::task::Poll::Pending,
            }))
        }

        fn instantiate(&self, request: &InstantiateRequest) -> FetchFuture {
            fetch::ready(Err(AssetError::NoInstantiator {
                key: request.key.clone(),
            }))
        }

        fn release(&self, handle: FetchHandle) {
            self.released.lock().push(handle);
        }
    }

    fn setup() -> (Arc<GateFetcher>, AssetCache) {
        let fetcher = Arc::new(GateFetcher::default());
        let cache = AssetCache::new(fetcher.clone(), HandleAllocator::shared());
        (fetcher, cache)
    }

    fn text(s: &str) -> ErasedAsset {
        Arc::new(s.to_string())
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Observer<ErasedAsset>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let make = move |tag: &'static str| -> Observer<ErasedAsset> {
            let sink = Arc::clone(&sink);
            Box::new(move |result| {
                let entry = match result {
                    Ok(v) => format!("{tag}:{}", v.downcast_ref::<String>().unwrap()),
                    Err(e) => format!("{tag}:err:{}", e.key().name()),
                };
                sink.lock().push(entry);
            })
        };
        (log, make)
    }

    #[test]
    fn test_pending_loads_share_one_fetch() {
        let (fetcher, mut cache) = setup();
        let (log, observer) = recorder();
        let key = ResourceKey::of::<String>("a.txt");

        assert!(cache.load(key.clone(), observer("first")).issued());
        assert_eq!(cache.load(key.clone(), observer("second")), LoadOutcome::Joined);
        assert_eq!(fetcher.fetches(&key), 1);
        assert_eq!(cache.state(&key), LoadState::Pending);

        assert!(cache.poll(None).is_empty());
        fetcher.resolve(&key, Ok(text("A")));
        let completions = cache.poll(None);
        assert_eq!(completions.len(), 1);
        assert!(completions[0].outcome.is_ok());
        assert_eq!(*log.lock(), vec!["first:A", "second:A"]);

        assert_eq!(cache.load(key.clone(), observer("third")), LoadOutcome::Hit);
        assert_eq!(log.lock().last().map(String::as_str), Some("third:A"));
        assert_eq!(fetcher.fetches(&key), 1);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let (fetcher, mut cache) = setup();
        let (log, observer) = recorder();
        let key = ResourceKey::of::<String>("bad.txt");

        let LoadOutcome::Issued(handle) = cache.load(key.clone(), observer("x")) else {
            panic!("expected a fetch");
        };
        fetcher.resolve(&key, Err(AssetError::fetch_failed(key.clone(), "boom")));
        let completions = cache.poll(None);
        assert!(completions[0].outcome.is_err());
        assert_eq!(*log.lock(), vec!["x:err:bad.txt"]);
        assert!(!cache.contains(&key));
        assert_eq!(*fetcher.released.lock(), vec![handle]);

        assert!(cache.load(key.clone(), observer("retry")).issued());
        assert_eq!(fetcher.fetches(&key), 2);
    }

    #[test]
    fn test_wrong_type_from_fetcher_fails_the_load() {
        let (fetcher, mut cache) = setup();
        let (log, observer) = recorder();
        let key = ResourceKey::of::<String>("mislabeled.txt");

        cache.load(key.clone(), observer("x"));
        fetcher.resolve(&key, Ok(Arc::new(42u32)));
        cache.poll(None);
        assert_eq!(*log.lock(), vec!["x:err:mislabeled.txt"]);
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_release_is_idempotent() {
        let (fetcher, mut cache) = setup();
        let (_log, observer) = recorder();
        let key = ResourceKey::of::<String>("a.txt");

        cache.load(key.clone(), observer("x"));
        fetcher.resolve(&key, Ok(text("A")));
        cache.poll(None);

        assert!(cache.release(&key));
        assert!(!cache.release(&key));
        assert_eq!(fetcher.released.lock().len(), 1);
        assert_eq!(cache.state(&key), LoadState::NotStarted);
    }

    #[test]
    fn test_released_pending_load_drops_late_completion() {
        let (fetcher, mut cache) = setup();
        let (log, observer) = recorder();
        let key = ResourceKey::of::<String>("slow.txt");

        cache.load(key.clone(), observer("x"));
        assert!(cache.release(&key));
        fetcher.resolve(&key, Ok(text("late")));

        assert!(cache.poll(None).is_empty());
        assert!(log.lock().is_empty());
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_partitions_are_independent() {
        let (fetcher, mut cache) = setup();
        let (_log, observer) = recorder();
        let as_text = ResourceKey::of::<String>("shared");
        let as_bytes = ResourceKey::of::<Vec<u8>>("shared");

        cache.load(as_text.clone(), observer("t"));
        cache.load(as_bytes.clone(), Box::new(|_| {}));
        assert_eq!(fetcher.fetches(&as_text), 1);
        assert_eq!(fetcher.fetches(&as_bytes), 1);
        assert_eq!(cache.len(), 2);

        assert_eq!(cache.release_all_of_type(TypeId::of::<Vec<u8>>()), 1);
        assert!(cache.contains(&as_text));
        assert_eq!(cache.len_of_type(TypeId::of::<Vec<u8>>()), 0);

        assert_eq!(cache.release_all(), 1);
        assert!(cache.is_empty());
        assert_eq!(fetcher.released.lock().len(), 2);
    }

    #[test]
    fn test_poll_respects_limit() {
        let (fetcher, mut cache) = setup();
        let keys: Vec<_> = (0..3)
            .map(|i| ResourceKey::of::<String>(format!("{i}.txt")))
            .collect();
        for key in &keys {
            cache.load(key.clone(), Box::new(|_| {}));
            fetcher.resolve(key, Ok(text("v")));
        }

        assert_eq!(cache.poll(Some(2)).len(), 2);
        assert_eq!(cache.pending_count(), 1);
        assert_eq!(cache.poll(Some(2)).len(), 1);
        assert_eq!(cache.pending_count(), 0);
    }
}
