//! Scripted fetcher for driving the asset system from tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Poll, Waker};

use hearth_assets::fetch::{self, FetchFuture};
use hearth_assets::{
    Asset, AssetError, AssetFetcher, AssetResult, ErasedAsset, FetchHandle, FetchRequest,
    InstantiateRequest, Placement, ResourceKey,
};
use hearth_core::alloc::HashMap;
use parking_lot::Mutex;

/// Records a fetcher call for verification in tests.
#[derive(Debug, Clone)]
pub enum FetchCall {
    Fetch {
        handle: FetchHandle,
        key: ResourceKey,
    },
    Instantiate {
        handle: FetchHandle,
        key: ResourceKey,
        placement: Placement,
    },
    Release {
        handle: FetchHandle,
    },
    ReleaseInstance {
        handle: FetchHandle,
    },
}

type Prefab = Arc<dyn Fn(&Placement) -> ErasedAsset + Send + Sync>;

#[derive(Default)]
struct Slot {
    result: Option<AssetResult<ErasedAsset>>,
    waker: Option<Waker>,
}

/// A request whose result the test has not delivered yet.
struct Outstanding {
    handle: FetchHandle,
    key: ResourceKey,
    placement: Option<Placement>,
    slot: Arc<Mutex<Slot>>,
}

/// Mock implementation of [`AssetFetcher`].
///
/// Values are registered up front with [`insert`](Self::insert),
/// [`insert_prefab`](Self::insert_prefab) and [`fail`](Self::fail). Each
/// request stays pending until [`complete`](Self::complete) (or one of its
/// siblings) resolves it from those registrations, unless auto-complete is
/// on, in which case requests resolve immediately.
///
/// Completing a request whose future has already been dropped is allowed:
/// the result goes nowhere, exactly like a real late completion.
pub struct MockFetcher {
    calls: Mutex<Vec<FetchCall>>,
    values: Mutex<HashMap<ResourceKey, ErasedAsset>>,
    prefabs: Mutex<HashMap<ResourceKey, Prefab>>,
    failures: Mutex<HashMap<ResourceKey, String>>,
    outstanding: Mutex<Vec<Outstanding>>,
    auto_complete: AtomicBool,
}

impl MockFetcher {
    /// A fetcher whose requests wait for an explicit completion.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            values: Mutex::new(HashMap::new()),
            prefabs: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            outstanding: Mutex::new(Vec::new()),
            auto_complete: AtomicBool::new(false),
        }
    }

    /// A fetcher that resolves every request as soon as it is made.
    pub fn immediate() -> Self {
        let mock = Self::new();
        mock.set_auto_complete(true);
        mock
    }

    pub fn set_auto_complete(&self, enabled: bool) {
        self.auto_complete.store(enabled, Ordering::Relaxed);
    }

    /// Serve `value` for fetches of `name` as a `T`.
    pub fn insert<T: Asset>(&self, name: &str, value: T) {
        let key = ResourceKey::of::<T>(name);
        self.failures.lock().remove(&key);
        self.values.lock().insert(key, Arc::new(value));
    }

    /// Build a fresh `I` for every instantiate request of `name`.
    pub fn insert_prefab<I: Asset>(
        &self,
        name: &str,
        build: impl Fn(&Placement) -> I + Send + Sync + 'static,
    ) {
        let key = ResourceKey::of::<I>(name);
        self.failures.lock().remove(&key);
        let prefab: Prefab =
            Arc::new(move |placement: &Placement| -> ErasedAsset { Arc::new(build(placement)) });
        self.prefabs.lock().insert(key, prefab);
    }

    /// Fail fetches (or instantiations) of `name` as a `T` with `reason`.
    pub fn fail<T: Asset>(&self, name: &str, reason: &str) {
        let key = ResourceKey::of::<T>(name);
        self.values.lock().remove(&key);
        self.prefabs.lock().remove(&key);
        self.failures.lock().insert(key, reason.to_string());
    }

    /// Resolve one outstanding request from the registrations.
    ///
    /// Returns false if `handle` has no outstanding request.
    pub fn complete(&self, handle: FetchHandle) -> bool {
        let Some(outstanding) = self.take_outstanding(handle) else {
            return false;
        };
        let result = self.resolve(&outstanding.key, outstanding.placement.as_ref());
        deliver(&outstanding.slot, result);
        true
    }

    /// Fail one outstanding request with `reason`, whatever is registered.
    pub fn complete_err(&self, handle: FetchHandle, reason: &str) -> bool {
        let Some(outstanding) = self.take_outstanding(handle) else {
            return false;
        };
        let err = AssetError::fetch_failed(outstanding.key.clone(), reason);
        deliver(&outstanding.slot, Err(err));
        true
    }

    /// Resolve every outstanding request for `key`.
    pub fn complete_key(&self, key: &ResourceKey) -> usize {
        let handles: Vec<_> = self
            .outstanding
            .lock()
            .iter()
            .filter(|o| &o.key == key)
            .map(|o| o.handle)
            .collect();
        handles.into_iter().filter(|h| self.complete(*h)).count()
    }

    /// Resolve every outstanding request, oldest first.
    pub fn complete_all(&self) -> usize {
        let drained: Vec<_> = self.outstanding.lock().drain(..).collect();
        let count = drained.len();
        for outstanding in drained {
            let result = self.resolve(&outstanding.key, outstanding.placement.as_ref());
            deliver(&outstanding.slot, result);
        }
        count
    }

    fn take_outstanding(&self, handle: FetchHandle) -> Option<Outstanding> {
        let mut outstanding = self.outstanding.lock();
        let index = outstanding.iter().position(|o| o.handle == handle)?;
        Some(outstanding.remove(index))
    }

    fn resolve(&self, key: &ResourceKey, placement: Option<&Placement>) -> AssetResult<ErasedAsset> {
        if let Some(reason) = self.failures.lock().get(key) {
            return Err(AssetError::fetch_failed(key.clone(), reason.clone()));
        }
        let found = match placement {
            Some(placement) => self.prefabs.lock().get(key).map(|build| build(placement)),
            None => self.values.lock().get(key).cloned(),
        };
        found.ok_or_else(|| AssetError::fetch_failed(key.clone(), "nothing registered"))
    }

    fn issue(&self, handle: FetchHandle, key: &ResourceKey, placement: Option<Placement>) -> FetchFuture {
        if self.auto_complete.load(Ordering::Relaxed) {
            return fetch::ready(self.resolve(key, placement.as_ref()));
        }

        let slot = Arc::new(Mutex::new(Slot::default()));
        self.outstanding.lock().push(Outstanding {
            handle,
            key: key.clone(),
            placement,
            slot: Arc::clone(&slot),
        });
        Box::pin(std::future::poll_fn(move |cx| {
            let mut slot = slot.lock();
            match slot.result.take() {
                Some(result) => Poll::Ready(result),
                None => {
                    slot.waker = Some(cx.waker().clone());
                    Poll::Pending
                }
            }
        }))
    }

    /// Get a copy of all recorded calls.
    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().clone()
    }

    /// How many fetches were issued for `key`.
    pub fn fetch_count(&self, key: &ResourceKey) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, FetchCall::Fetch { key: k, .. } if k == key))
            .count()
    }

    pub fn fetch_count_of<T: Asset>(&self, name: &str) -> usize {
        self.fetch_count(&ResourceKey::of::<T>(name))
    }

    /// How many instantiate requests were issued in total.
    pub fn instantiate_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, FetchCall::Instantiate { .. }))
            .count()
    }

    /// Every handle given back, through either release path, in order.
    pub fn released(&self) -> Vec<FetchHandle> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                FetchCall::Release { handle } | FetchCall::ReleaseInstance { handle } => {
                    Some(*handle)
                }
                _ => None,
            })
            .collect()
    }

    pub fn release_count(&self) -> usize {
        self.released().len()
    }

    pub fn is_released(&self, handle: FetchHandle) -> bool {
        self.released().contains(&handle)
    }

    /// Handles issued through `fetch` or `instantiate` and never released.
    pub fn live_handles(&self) -> Vec<FetchHandle> {
        let released = self.released();
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                FetchCall::Fetch { handle, .. } | FetchCall::Instantiate { handle, .. } => {
                    Some(*handle)
                }
                _ => None,
            })
            .filter(|handle| !released.contains(handle))
            .collect()
    }

    /// Handles that are still waiting for a completion.
    pub fn outstanding_handles(&self) -> Vec<FetchHandle> {
        self.outstanding.lock().iter().map(|o| o.handle).collect()
    }

    /// The most recent handle issued for `key`.
    pub fn handle_for(&self, key: &ResourceKey) -> Option<FetchHandle> {
        self.calls.lock().iter().rev().find_map(|call| match call {
            FetchCall::Fetch { handle, key: k } | FetchCall::Instantiate { handle, key: k, .. }
                if k == key =>
            {
                Some(*handle)
            }
            _ => None,
        })
    }
}

fn deliver(slot: &Mutex<Slot>, result: AssetResult<ErasedAsset>) {
    let waker = {
        let mut slot = slot.lock();
        slot.result = Some(result);
        slot.waker.take()
    };
    if let Some(waker) = waker {
        waker.wake();
    }
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetFetcher for MockFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        self.calls.lock().push(FetchCall::Fetch {
            handle: request.handle,
            key: request.key.clone(),
        });
        self.issue(request.handle, &request.key, None)
    }

    fn instantiate(&self, request: &InstantiateRequest) -> FetchFuture {
        self.calls.lock().push(FetchCall::Instantiate {
            handle: request.handle,
            key: request.key.clone(),
            placement: request.placement,
        });
        self.issue(request.handle, &request.key, Some(request.placement))
    }

    fn release(&self, handle: FetchHandle) {
        self.calls.lock().push(FetchCall::Release { handle });
    }

    fn release_instance(&self, handle: FetchHandle, _object: &ErasedAsset) {
        self.calls.lock().push(FetchCall::ReleaseInstance { handle });
    }
}
