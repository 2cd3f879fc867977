//! Load operation state machine.
//!
//! `NotStarted -> Pending -> {Succeeded | Failed}`. A cache miss moves a key
//! to `Pending`; the fetch completing moves it to a terminal state, which
//! never changes again. Released entries are removed rather than moved.

use std::sync::Arc;

use crate::error::AssetError;

/// What an observer receives: the value, or the shared error.
pub type LoadResult<V> = Result<V, Arc<AssetError>>;

/// State of an issued operation, carrying its outcome once known.
#[derive(Debug, Clone)]
pub enum OperationState<V> {
    /// The fetch has been issued and has not completed.
    Pending,

    /// The fetch completed with a value.
    Succeeded(V),

    /// The fetch completed with an error.
    Failed(Arc<AssetError>),
}

impl<V> OperationState<V> {
    pub fn is_pending(&self) -> bool {
        matches!(self, OperationState::Pending)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, OperationState::Succeeded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, OperationState::Failed(_))
    }

    /// The value if the operation succeeded.
    pub fn value(&self) -> Option<&V> {
        match self {
            OperationState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    /// The error if the operation failed.
    pub fn error(&self) -> Option<&Arc<AssetError>> {
        match self {
            OperationState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Value-free view of where a key is in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing is cached or in flight for the key.
    NotStarted,

    /// A fetch is in flight.
    Pending,

    /// Loaded and cached.
    Succeeded,

    /// The last fetch failed.
    Failed,
}

impl LoadState {
    /// Returns true once the operation reached a terminal state.
    pub fn is_done(&self) -> bool {
        matches!(self, LoadState::Succeeded | LoadState::Failed)
    }
}

impl<V> From<&OperationState<V>> for LoadState {
    fn from(state: &OperationState<V>) -> Self {
        match state {
            OperationState::Pending => LoadState::Pending,
            OperationState::Succeeded(_) => LoadState::Succeeded,
            OperationState::Failed(_) => LoadState::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::ResourceKey;

    #[test]
    fn test_load_state_from_operation_state() {
        let pending: OperationState<u32> = OperationState::Pending;
        let done = OperationState::Succeeded(7u32);
        let failed: OperationState<u32> = OperationState::Failed(Arc::new(AssetError::NoLoader {
            key: ResourceKey::of::<String>("x"),
        }));

        assert_eq!(LoadState::from(&pending), LoadState::Pending);
        assert_eq!(LoadState::from(&done), LoadState::Succeeded);
        assert_eq!(LoadState::from(&failed), LoadState::Failed);
        assert_eq!(done.value(), Some(&7));
        assert!(failed.error().is_some());
    }

    #[test]
    fn test_is_done() {
        assert!(!LoadState::NotStarted.is_done());
        assert!(!LoadState::Pending.is_done());
        assert!(LoadState::Succeeded.is_done());
        assert!(LoadState::Failed.is_done());
    }
}
