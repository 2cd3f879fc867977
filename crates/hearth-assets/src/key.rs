//! Resource keys: a type tag plus a caller-supplied name.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::Asset;

/// Identifies a loadable resource within one type partition.
///
/// Two keys are equal when both the type tag and the name match, so
/// `"click"` as an `AudioClip` and `"click"` as a `String` are distinct
/// resources.
#[derive(Clone)]
pub struct ResourceKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Arc<str>,
}

impl ResourceKey {
    /// Key for a resource of type `T`.
    pub fn of<T: Asset>(name: impl Into<Arc<str>>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
            name: name.into(),
        }
    }

    /// Key from an erased type tag, for code that only knows the `TypeId`.
    pub fn from_parts(type_id: TypeId, type_name: &'static str, name: impl Into<Arc<str>>) -> Self {
        Self {
            type_id,
            type_name,
            name: name.into(),
        }
    }

    /// The same name under a different type tag.
    pub fn retyped(&self, type_id: TypeId, type_name: &'static str) -> Self {
        Self {
            type_id,
            type_name,
            name: Arc::clone(&self.name),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn shared_name(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Whether this key names a resource of type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// File extension of the name (without the dot), if any.
    pub fn extension(&self) -> Option<&str> {
        let file = self.name.rsplit(['/', '\\']).next()?;
        let (stem, ext) = file.rsplit_once('.')?;
        (!stem.is_empty() && !ext.is_empty()).then_some(ext)
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceKey")
            .field("type", &self.type_name)
            .field("name", &&*self.name)
            .finish()
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.name)
    }
}
