//! Turning a loaded source asset into a placed runtime object.

use std::any::TypeId;
use std::sync::Arc;

use hearth_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};
use crate::fetch::{ErasedAsset, Placement};
use crate::key::ResourceKey;
use crate::Asset;

/// What an instantiator gets besides the source asset.
pub struct InstantiateContext<'a> {
    /// Key of the requested instance.
    pub key: &'a ResourceKey,
    pub placement: Placement,
}

impl InstantiateContext<'_> {
    /// A [`AssetError::LoaderError`] for this key.
    pub fn error(&self, message: impl Into<String>) -> AssetError {
        AssetError::LoaderError {
            key: self.key.clone(),
            message: message.into(),
        }
    }
}

/// Builds instances of one type from a loaded source asset.
///
/// The source is loaded under the same name as the instance key, tagged with
/// [`Source`](Self::Source).
pub trait AssetInstantiator: Send + Sync + 'static {
    type Source: Asset;
    type Instance: Asset;

    fn instantiate(
        &self,
        source: &Self::Source,
        ctx: InstantiateContext<'_>,
    ) -> AssetResult<Self::Instance>;
}

/// Type-erased instantiator.
pub trait ErasedInstantiator: Send + Sync {
    fn source_type_id(&self) -> TypeId;

    fn source_type_name(&self) -> &'static str;

    fn instantiate_erased(
        &self,
        source: &ErasedAsset,
        ctx: InstantiateContext<'_>,
    ) -> AssetResult<ErasedAsset>;
}

impl<I: AssetInstantiator> ErasedInstantiator for I {
    fn source_type_id(&self) -> TypeId {
        TypeId::of::<I::Source>()
    }

    fn source_type_name(&self) -> &'static str {
        <I::Source as Asset>::type_name()
    }

    fn instantiate_erased(
        &self,
        source: &ErasedAsset,
        ctx: InstantiateContext<'_>,
    ) -> AssetResult<ErasedAsset> {
        let source = source
            .downcast_ref::<I::Source>()
            .ok_or_else(|| AssetError::TypeMismatch {
                key: ctx.key.clone(),
                expected: <I::Source as Asset>::type_name(),
            })?;
        let instance = self.instantiate(source, ctx)?;
        Ok(Arc::new(instance))
    }
}

/// Instantiators indexed by the instance type they produce.
#[derive(Default)]
pub struct InstantiatorRegistry {
    by_instance: HashMap<TypeId, Arc<dyn ErasedInstantiator>>,
}

impl InstantiatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instantiator, replacing any previous one for the same
    /// instance type.
    pub fn register<I: AssetInstantiator>(&mut self, instantiator: I) {
        let type_id = TypeId::of::<I::Instance>();
        if self.by_instance.insert(type_id, Arc::new(instantiator)).is_some() {
            tracing::warn!(
                "Replaced instantiator for {}",
                <I::Instance as Asset>::type_name()
            );
        }
    }

    pub fn get(&self, instance_type: TypeId) -> Option<&Arc<dyn ErasedInstantiator>> {
        self.by_instance.get(&instance_type)
    }

    /// The source key an instance key is built from.
    pub fn source_key(&self, key: &ResourceKey) -> AssetResult<ResourceKey> {
        let instantiator = self
            .get(key.type_id())
            .ok_or_else(|| AssetError::NoInstantiator { key: key.clone() })?;
        Ok(key.retyped(instantiator.source_type_id(), instantiator.source_type_name()))
    }

    pub fn has_instantiator_for<T: 'static>(&self) -> bool {
        self.by_instance.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.by_instance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_instance.is_empty()
    }
}
