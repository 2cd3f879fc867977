//! One outstanding or completed fetch and the observers waiting on it.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_lite::future;

use crate::error::AssetResult;
use crate::handle::FetchHandle;
use crate::key::ResourceKey;
use crate::state::{LoadResult, LoadState, OperationState};

/// Completion observer. Invoked at most once.
pub type Observer<V> = Box<dyn FnOnce(LoadResult<V>) + Send + 'static>;

/// The in-flight work behind an operation.
pub type OperationFuture<V> = Pin<Box<dyn Future<Output = AssetResult<V>> + Send + 'static>>;

/// A single fetch of `key`, from issue to completion.
///
/// Observers registered while the operation is pending are invoked exactly
/// once, in registration order, when it leaves `Pending`. Observers
/// registered afterwards are invoked immediately with the stored outcome.
pub struct LoadOperation<V> {
    handle: FetchHandle,
    key: ResourceKey,
    state: OperationState<V>,
    future: Option<OperationFuture<V>>,
    observers: Vec<Observer<V>>,
}

impl<V: Clone> LoadOperation<V> {
    /// Wrap freshly issued work. The operation starts `Pending`.
    pub fn new(handle: FetchHandle, key: ResourceKey, future: OperationFuture<V>) -> Self {
        Self {
            handle,
            key,
            state: OperationState::Pending,
            future: Some(future),
            observers: Vec::new(),
        }
    }

    pub fn handle(&self) -> FetchHandle {
        self.handle
    }

    pub fn key(&self) -> &ResourceKey {
        &self.key
    }

    pub fn state(&self) -> &OperationState<V> {
        &self.state
    }

    pub fn load_state(&self) -> LoadState {
        LoadState::from(&self.state)
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    pub fn value(&self) -> Option<&V> {
        self.state.value()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Register interest in the outcome.
    pub fn observe(&mut self, observer: Observer<V>) {
        match &self.state {
            OperationState::Pending => self.observers.push(observer),
            OperationState::Succeeded(value) => observer(Ok(value.clone())),
            OperationState::Failed(err) => observer(Err(Arc::clone(err))),
        }
    }

    /// Poll the in-flight work once without blocking.
    ///
    /// Returns the new state if the operation completed during this call.
    pub fn poll(&mut self) -> Option<LoadState> {
        let pending = self.future.as_mut()?;
        let output = future::block_on(future::poll_once(pending))?;
        self.future = None;
        self.complete(output);
        Some(self.load_state())
    }

    /// Move to a terminal state and notify observers in order.
    ///
    /// Returns false, leaving the operation untouched, if it already completed.
    pub fn complete(&mut self, result: AssetResult<V>) -> bool {
        if !self.state.is_pending() {
            return false;
        }
        self.future = None;
        let result: LoadResult<V> = result.map_err(Arc::new);
        self.state = match &result {
            Ok(value) => OperationState::Succeeded(value.clone()),
            Err(err) => OperationState::Failed(Arc::clone(err)),
        };
        for observer in self.observers.drain(..) {
            observer(result.clone());
        }
        true
    }

    /// Consume a completed operation, yielding its outcome.
    pub fn into_result(self) -> Option<LoadResult<V>> {
        match self.state {
            OperationState::Pending => None,
            OperationState::Succeeded(value) => Some(Ok(value)),
            OperationState::Failed(err) => Some(Err(err)),
        }
    }

    /// Drop the in-flight work and any waiting observers without notifying them.
    ///
    /// A completion that arrives for an abandoned operation has nowhere to go
    /// and is discarded with the future. Returns how many observers were dropped.
    pub fn abandon(mut self) -> usize {
        let dropped = self.observers.len();
        if dropped > 0 {
            tracing::debug!(
                "Abandoning {} with {} waiting observer(s)",
                self.key,
                dropped
            );
        }
        self.observers.clear();
        dropped
    }
}

impl<V> std::fmt::Debug for LoadOperation<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            OperationState::Pending => "Pending",
            OperationState::Succeeded(_) => "Succeeded",
            OperationState::Failed(_) => "Failed",
        };
        f.debug_struct("LoadOperation")
            .field("handle", &self.handle)
            .field("key", &self.key)
            .field("state", &state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use parking_lot::Mutex;

    fn key() -> ResourceKey {
        ResourceKey::of::<String>("greeting.txt")
    }

    fn never() -> OperationFuture<u32> {
        Box::pin(future::pending())
    }

    fn ready(value: AssetResult<u32>) -> OperationFuture<u32> {
        Box::pin(future::ready(value))
    }

    #[test]
    fn test_observers_fire_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut op = LoadOperation::new(FetchHandle::from_raw(1), key(), ready(Ok(5)));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            op.observe(Box::new(move |result| {
                log.lock().push((tag, result.ok()));
            }));
        }
        assert_eq!(op.observer_count(), 3);

        assert_eq!(op.poll(), Some(LoadState::Succeeded));
        assert_eq!(op.poll(), None);
        assert_eq!(
            *log.lock(),
            vec![("first", Some(5)), ("second", Some(5)), ("third", Some(5))]
        );
    }

    #[test]
    fn test_pending_future_stays_pending() {
        let mut op = LoadOperation::new(FetchHandle::from_raw(1), key(), never());
        assert_eq!(op.poll(), None);
        assert_eq!(op.poll(), None);
        assert!(op.is_pending());
    }

    #[test]
    fn test_late_observer_sees_stored_outcome() {
        let mut op = LoadOperation::new(FetchHandle::from_raw(1), key(), ready(Ok(9)));
        op.poll();

        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        op.observe(Box::new(move |result| *sink.lock() = result.ok()));
        assert_eq!(*seen.lock(), Some(9));
    }

    #[test]
    fn test_failure_shares_one_error() {
        let err = AssetError::fetch_failed(key(), "offline");
        let mut op = LoadOperation::new(FetchHandle::from_raw(2), key(), ready(Err(err)));

        let errors = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let errors = Arc::clone(&errors);
            op.observe(Box::new(move |result| {
                if let Err(e) = result {
                    errors.lock().push(e);
                }
            }));
        }

        assert_eq!(op.poll(), Some(LoadState::Failed));
        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert!(Arc::ptr_eq(&errors[0], &errors[1]));
    }

    #[test]
    fn test_terminal_state_never_changes() {
        let mut op = LoadOperation::new(FetchHandle::from_raw(3), key(), never());
        assert!(op.complete(Ok(1)));
        assert!(!op.complete(Ok(2)));
        assert!(!op.complete(Err(AssetError::fetch_failed(key(), "late"))));
        assert_eq!(op.value(), Some(&1));
    }

    #[test]
    fn test_abandon_drops_observers_silently() {
        let fired = Arc::new(Mutex::new(false));
        let mut op = LoadOperation::new(FetchHandle::from_raw(4), key(), never());
        let flag = Arc::clone(&fired);
        op.observe(Box::new(move |_| *flag.lock() = true));

        assert_eq!(op.abandon(), 1);
        assert!(!*fired.lock());
    }
}
