//! Opaque ids for fetch handles and tracked instances.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hearth_core::alloc::sparse_set::IndexSlot;

/// The id a fetch capability sees for one request.
///
/// Every load or instantiate request is issued with a fresh handle and must
/// be released through [`AssetFetcher::release`](crate::AssetFetcher::release)
/// exactly once from the subsystem's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchHandle(u64);

impl FetchHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out unique [`FetchHandle`]s.
///
/// Share one allocator between every component that talks to the same
/// fetcher so handles never collide.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// A new allocator behind an `Arc`, ready to be shared.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn allocate(&self) -> FetchHandle {
        FetchHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// Identifies an object created through
/// [`AssetServer::instantiate`](crate::AssetServer::instantiate).
///
/// Ids are generational: once an instance is released its id never resolves
/// again, even if the slot is reused by a later instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub(crate) IndexSlot);

impl InstanceId {
    pub fn index(&self) -> u32 {
        self.0.index()
    }

    pub fn generation(&self) -> u32 {
        self.0.generation()
    }

    pub fn to_bits(&self) -> u64 {
        self.0.to_bits()
    }

    /// Build an id from raw parts. Only useful for probing the tracker with
    /// ids it never issued.
    pub fn from_parts(generation: u32, index: u32) -> Self {
        Self(IndexSlot::new(generation, index))
    }
}

/// A typed view of a tracked instance handed to instantiate callbacks.
pub struct Instance<I> {
    pub id: InstanceId,
    pub object: Arc<I>,
}

impl<I> Clone for Instance<I> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            object: Arc::clone(&self.object),
        }
    }
}

impl<I> Deref for Instance<I> {
    type Target = I;

    fn deref(&self) -> &I {
        &self.object
    }
}

impl<I: fmt::Debug> fmt::Debug for Instance<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("object", &self.object)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let handles = HandleAllocator::new();
        let a = handles.allocate();
        let b = handles.allocate();
        assert!(b > a);
        assert_ne!(a.raw(), 0);
    }

    #[test]
    fn test_shared_allocator_never_repeats() {
        let handles = HandleAllocator::shared();
        let other = Arc::clone(&handles);
        let a = handles.allocate();
        let b = other.allocate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_instance_id_parts() {
        let id = InstanceId::from_parts(3, 9);
        assert_eq!(id.generation(), 3);
        assert_eq!(id.index(), 9);
    }
}
