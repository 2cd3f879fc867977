//! The fetch capability the asset system consumes.
//!
//! Everything that actually produces bytes or objects lives behind
//! [`AssetFetcher`]. The cache and tracker only issue requests, poll the
//! returned futures from `update()`, and release handles.

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hearth_core::math::{Quat, Vec3};

use crate::error::{AssetError, AssetResult};
use crate::handle::{FetchHandle, InstanceId};
use crate::key::ResourceKey;
use crate::Asset;

/// A fetched value with its concrete type erased.
pub type ErasedAsset = Arc<dyn Any + Send + Sync>;

/// Eventual result of a fetch or instantiate request.
pub type FetchFuture = Pin<Box<dyn Future<Output = AssetResult<ErasedAsset>> + Send + 'static>>;

/// A request to load the value behind `key`.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub handle: FetchHandle,
    pub key: ResourceKey,
}

/// A request to create a placed object from the value behind `key`.
///
/// `key` is tagged with the instance type, not the source type.
#[derive(Debug, Clone)]
pub struct InstantiateRequest {
    pub handle: FetchHandle,
    pub key: ResourceKey,
    pub placement: Placement,
}

/// Where a new instance goes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub parent: Option<InstanceId>,
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_parent(mut self, parent: InstanceId) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            parent: None,
        }
    }
}

/// Asynchronous source of values and placed objects.
///
/// Requests return immediately with a future; the asset system polls it
/// cooperatively and never blocks on it. Every handle passed in a request
/// is later given back through [`release`](Self::release) or
/// [`release_instance`](Self::release_instance). Implementations must treat
/// releasing an unknown or already released handle as a no-op.
pub trait AssetFetcher: Send + Sync + 'static {
    /// Start loading the value for `request.key`.
    fn fetch(&self, request: &FetchRequest) -> FetchFuture;

    /// Start creating a placed object for `request.key`.
    fn instantiate(&self, request: &InstantiateRequest) -> FetchFuture;

    /// Give back a handle obtained through [`fetch`](Self::fetch).
    fn release(&self, handle: FetchHandle);

    /// Destroy an instantiated object and give back its handle.
    fn release_instance(&self, handle: FetchHandle, object: &ErasedAsset) {
        let _ = object;
        self.release(handle);
    }
}

/// A future that is already resolved.
pub fn ready(result: AssetResult<ErasedAsset>) -> FetchFuture {
    Box::pin(futures_lite::future::ready(result))
}

/// Recover the concrete type of a fetched value.
pub fn downcast<T: Asset>(key: &ResourceKey, value: ErasedAsset) -> AssetResult<Arc<T>> {
    value.downcast::<T>().map_err(|_| AssetError::TypeMismatch {
        key: key.clone(),
        expected: T::type_name(),
    })
}

/// Wrap a fetch so its output is checked against the key's type tag.
///
/// A value of the wrong type never reaches the cache.
pub(crate) fn checked(key: ResourceKey, future: FetchFuture) -> FetchFuture {
    Box::pin(async move {
        let value = future.await?;
        if (*value).type_id() == key.type_id() {
            Ok(value)
        } else {
            tracing::error!("Fetcher returned the wrong type for {}", key);
            Err(AssetError::TypeMismatch {
                expected: key.type_name(),
                key,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast() {
        let key = ResourceKey::of::<String>("a.txt");
        let value: ErasedAsset = Arc::new(String::from("hello"));
        let typed = downcast::<String>(&key, value.clone()).unwrap();
        assert_eq!(typed.as_str(), "hello");

        let err = downcast::<Vec<u8>>(&key, value).unwrap_err();
        assert!(matches!(err, AssetError::TypeMismatch { expected: "Bytes", .. }));
    }

    #[test]
    fn test_checked_rejects_wrong_type() {
        let key = ResourceKey::of::<String>("a.txt");
        let wrong: ErasedAsset = Arc::new(vec![1u8, 2, 3]);
        let result = pollster::block_on(checked(key.clone(), ready(Ok(wrong))));
        match result {
            Err(AssetError::TypeMismatch { key: k, expected }) => {
                assert_eq!(k, key);
                assert_eq!(expected, "String");
            }
            other => panic!("expected type mismatch, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_checked_passes_matching_type() {
        let key = ResourceKey::of::<String>("a.txt");
        let value: ErasedAsset = Arc::new(String::from("ok"));
        assert!(pollster::block_on(checked(key, ready(Ok(value)))).is_ok());
    }

    #[test]
    fn test_placement_builders() {
        let parent = InstanceId::from_parts(0, 1);
        let placement = Placement::at(Vec3::new(1.0, 2.0, 3.0))
            .with_rotation(Quat::from_rotation_y(1.0))
            .with_parent(parent);
        assert_eq!(placement.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(placement.parent, Some(parent));
        assert_eq!(Placement::default().rotation, Quat::IDENTITY);
    }
}
