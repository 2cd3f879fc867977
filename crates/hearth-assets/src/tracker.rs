//! Bookkeeping for objects instantiated from loaded resources.

use std::sync::Arc;

use hearth_core::alloc::sparse_set::SparseSet;
use hearth_core::profiling::profile_function;

use crate::error::AssetError;
use crate::fetch::{self, AssetFetcher, ErasedAsset, InstantiateRequest, Placement};
use crate::handle::{FetchHandle, HandleAllocator, InstanceId};
use crate::key::ResourceKey;
use crate::operation::LoadOperation;
use crate::state::{LoadResult, OperationState};

/// Callback for an instantiate request.
pub type InstanceObserver = Box<dyn FnOnce(LoadResult<(InstanceId, ErasedAsset)>) + Send + 'static>;

/// One instantiate request that finished during [`InstantiationTracker::poll`].
#[derive(Debug, Clone)]
pub struct InstanceCompletion {
    pub key: ResourceKey,
    pub handle: FetchHandle,
    pub outcome: Result<InstanceId, Arc<AssetError>>,
}

struct PendingInstance {
    op: LoadOperation<ErasedAsset>,
    callback: InstanceObserver,
}

struct TrackedInstance {
    key: ResourceKey,
    handle: FetchHandle,
    object: ErasedAsset,
}

/// Maps every live instance to the fetch handle that produced it.
///
/// Only objects created through [`instantiate`](Self::instantiate) are
/// tracked, and only tracked objects are ever released through the fetcher.
/// Ids are generational, so a stale id never releases a newer instance that
/// reused its slot.
pub struct InstantiationTracker {
    fetcher: Arc<dyn AssetFetcher>,
    handles: Arc<HandleAllocator>,
    pending: Vec<PendingInstance>,
    instances: SparseSet<TrackedInstance>,
}

impl InstantiationTracker {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, handles: Arc<HandleAllocator>) -> Self {
        Self {
            fetcher,
            handles,
            pending: Vec::new(),
            instances: SparseSet::new(),
        }
    }

    /// Issue an instantiate request for `key`, tagged with the instance type.
    ///
    /// `callback` runs from a later [`poll`](Self::poll) with the new id, or
    /// with an error naming `key`. Failed requests are never registered.
    pub fn instantiate(
        &mut self,
        key: ResourceKey,
        placement: Placement,
        callback: InstanceObserver,
    ) -> FetchHandle {
        let handle = self.handles.allocate();
        let request = InstantiateRequest {
            handle,
            key: key.clone(),
            placement,
        };
        let future = fetch::checked(key.clone(), self.fetcher.instantiate(&request));
        tracing::debug!("Instantiating {} as {}", key, handle);
        self.pending.push(PendingInstance {
            op: LoadOperation::new(handle, key, future),
            callback,
        });
        handle
    }

    /// Poll pending requests once each, in the order they were issued.
    pub fn poll(&mut self, limit: Option<usize>) -> Vec<InstanceCompletion> {
        profile_function!();
        let limit = limit.unwrap_or(usize::MAX);
        let mut completions = Vec::new();
        let mut i = 0;

        while i < self.pending.len() && completions.len() < limit {
            if self.pending[i].op.poll().is_none() {
                i += 1;
                continue;
            }
            let PendingInstance { op, callback } = self.pending.remove(i);
            let key = op.key().clone();
            let handle = op.handle();

            let outcome = match op.state() {
                OperationState::Succeeded(object) => {
                    let object = Arc::clone(object);
                    let id = InstanceId(self.instances.push(TrackedInstance {
                        key: key.clone(),
                        handle,
                        object: Arc::clone(&object),
                    }));
                    tracing::debug!("Instantiated {} as {:?}", key, id);
                    callback(Ok((id, object)));
                    Ok(id)
                }
                OperationState::Failed(err) => {
                    tracing::debug!("Instantiation of {} failed: {}", key, err);
                    self.fetcher.release(handle);
                    callback(Err(Arc::clone(err)));
                    Err(Arc::clone(err))
                }
                OperationState::Pending => continue,
            };
            completions.push(InstanceCompletion {
                key,
                handle,
                outcome,
            });
        }
        completions
    }

    /// Release a tracked instance and the handle behind it.
    ///
    /// Ids this tracker never issued, or already released, are logged and
    /// ignored; nothing is passed to the fetcher for them.
    pub fn release(&mut self, id: InstanceId) -> bool {
        match self.instances.try_remove(id.0) {
            Some(tracked) => {
                tracing::debug!("Releasing instance {:?} of {}", id, tracked.key);
                self.fetcher.release_instance(tracked.handle, &tracked.object);
                true
            }
            None => {
                tracing::warn!(
                    "Ignoring release of untracked instance {:?}; it was not created by this tracker",
                    id
                );
                false
            }
        }
    }

    /// Release every tracked instance and abandon pending requests.
    ///
    /// Returns how many tracked instances were released.
    pub fn release_all(&mut self) -> usize {
        for pending in self.pending.drain(..) {
            let handle = pending.op.handle();
            pending.op.abandon();
            self.fetcher.release(handle);
        }
        let drained = self.instances.drain();
        let count = drained.len();
        for (_, tracked) in drained {
            self.fetcher.release_instance(tracked.handle, &tracked.object);
        }
        if count > 0 {
            tracing::debug!("Released {} tracked instances", count);
        }
        count
    }

    pub fn get(&self, id: InstanceId) -> Option<&ErasedAsset> {
        self.instances.try_get(id.0).map(|tracked| &tracked.object)
    }

    pub fn key_of(&self, id: InstanceId) -> Option<&ResourceKey> {
        self.instances.try_get(id.0).map(|tracked| &tracked.key)
    }

    pub fn handle_of(&self, id: InstanceId) -> Option<FetchHandle> {
        self.instances.try_get(id.0).map(|tracked| tracked.handle)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.instances.iter().map(|(slot, _)| InstanceId(slot))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for InstantiationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstantiationTracker")
            .field("instances", &self.instances.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchFuture, FetchRequest};
    use crate::Asset;
    use hearth_core::math::Vec3;
    use parking_lot::Mutex;

    #[derive(Debug, PartialEq)]
    struct Marker(Vec3);

    impl Asset for Marker {}

    /// Instantiates `Marker`s immediately, fails keys starting with `bad`.
    #[derive(Default)]
    struct InstantFetcher {
        released: Mutex<Vec<FetchHandle>>,
        destroyed: Mutex<Vec<FetchHandle>>,
    }

    impl AssetFetcher for InstantFetcher {
        fn fetch(&self, request: &FetchRequest) -> FetchFuture {
            fetch::ready(Err(AssetError::fetch_failed(request.key.clone(), "unused")))
        }

        fn instantiate(&self, request: &InstantiateRequest) -> FetchFuture {
            if request.key.name().starts_with("bad") {
                return fetch::ready(Err(AssetError::fetch_failed(request.key.clone(), "no prefab")));
            }
            fetch::ready(Ok(Arc::new(Marker(request.placement.position))))
        }

        fn release(&self, handle: FetchHandle) {
            self.released.lock().push(handle);
        }

        fn release_instance(&self, handle: FetchHandle, _object: &ErasedAsset) {
            self.destroyed.lock().push(handle);
        }
    }

    fn setup() -> (Arc<InstantFetcher>, InstantiationTracker) {
        let fetcher = Arc::new(InstantFetcher::default());
        let tracker = InstantiationTracker::new(fetcher.clone(), HandleAllocator::shared());
        (fetcher, tracker)
    }

    #[test]
    fn test_instantiate_registers_on_completion() {
        let (_fetcher, mut tracker) = setup();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);

        let key = ResourceKey::of::<Marker>("tree");
        tracker.instantiate(
            key.clone(),
            Placement::at(Vec3::Y),
            Box::new(move |result| *sink.lock() = result.ok().map(|(id, _)| id)),
        );
        assert_eq!(tracker.pending_count(), 1);
        assert_eq!(tracker.len(), 0);

        let completions = tracker.poll(None);
        let id = completions[0].outcome.clone().unwrap();
        assert_eq!(*seen.lock(), Some(id));
        assert_eq!(tracker.key_of(id), Some(&key));
        let marker = tracker.get(id).unwrap().downcast_ref::<Marker>().unwrap();
        assert_eq!(marker.0, Vec3::Y);
    }

    #[test]
    fn test_failed_instantiation_is_not_registered() {
        let (fetcher, mut tracker) = setup();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);

        let handle = tracker.instantiate(
            ResourceKey::of::<Marker>("bad_rock"),
            Placement::default(),
            Box::new(move |result| {
                if let Err(e) = result {
                    sink.lock().push(e.key().name().to_string());
                }
            }),
        );
        tracker.poll(None);

        assert_eq!(*errors.lock(), vec!["bad_rock".to_string()]);
        assert_eq!(tracker.len(), 0);
        assert_eq!(*fetcher.released.lock(), vec![handle]);
    }

    #[test]
    fn test_release_untracked_is_a_no_op() {
        let (fetcher, mut tracker) = setup();
        tracker.instantiate(
            ResourceKey::of::<Marker>("tree"),
            Placement::default(),
            Box::new(|_| {}),
        );
        tracker.poll(None);

        assert!(!tracker.release(InstanceId::from_parts(7, 42)));
        assert_eq!(tracker.len(), 1);
        assert!(fetcher.destroyed.lock().is_empty());
        assert!(fetcher.released.lock().is_empty());
    }

    #[test]
    fn test_stale_id_does_not_release_reused_slot() {
        let (fetcher, mut tracker) = setup();
        let key = ResourceKey::of::<Marker>("tree");

        tracker.instantiate(key.clone(), Placement::default(), Box::new(|_| {}));
        let first = tracker.poll(None)[0].outcome.clone().unwrap();
        assert!(tracker.release(first));

        tracker.instantiate(key, Placement::default(), Box::new(|_| {}));
        let second = tracker.poll(None)[0].outcome.clone().unwrap();
        assert_eq!(first.index(), second.index());

        assert!(!tracker.release(first));
        assert!(tracker.contains(second));
        assert_eq!(fetcher.destroyed.lock().len(), 1);
    }

    #[test]
    fn test_release_all_empties_tracker() {
        let (fetcher, mut tracker) = setup();
        for name in ["a", "b", "c"] {
            tracker.instantiate(ResourceKey::of::<Marker>(name), Placement::default(), Box::new(|_| {}));
        }
        tracker.poll(None);
        tracker.instantiate(ResourceKey::of::<Marker>("d"), Placement::default(), Box::new(|_| {}));

        assert_eq!(tracker.release_all(), 3);
        assert!(tracker.is_empty());
        assert_eq!(fetcher.destroyed.lock().len(), 3);
        assert_eq!(fetcher.released.lock().len(), 1);
    }
}
