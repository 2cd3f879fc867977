//! Decoders that turn raw bytes into typed assets.

use std::any::TypeId;
use std::sync::Arc;

use hearth_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};
use crate::fetch::ErasedAsset;
use crate::key::ResourceKey;
use crate::Asset;

/// Context provided to asset loaders during loading.
pub struct LoadContext<'a> {
    /// The key being loaded.
    pub key: &'a ResourceKey,
    /// The raw bytes of the asset.
    pub bytes: &'a [u8],
    /// File extension (without the dot), if available.
    pub extension: Option<&'a str>,
}

impl<'a> LoadContext<'a> {
    pub fn new(key: &'a ResourceKey, bytes: &'a [u8]) -> Self {
        Self {
            key,
            bytes,
            extension: key.extension(),
        }
    }

    /// A [`AssetError::LoaderError`] for this key.
    pub fn error(&self, message: impl Into<String>) -> AssetError {
        AssetError::LoaderError {
            key: self.key.clone(),
            message: message.into(),
        }
    }
}

/// Default priority for loaders.
pub const DEFAULT_LOADER_PRIORITY: i32 = 0;

/// Trait for loading assets from bytes.
///
/// # Example
///
/// ```ignore
/// struct CsvLoader;
///
/// impl AssetLoader for CsvLoader {
///     type Asset = Table;
///
///     fn extensions(&self) -> &[&str] {
///         &["csv"]
///     }
///
///     fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
///         Table::parse(ctx.bytes).map_err(|e| ctx.error(e.to_string()))
///     }
/// }
/// ```
pub trait AssetLoader: Send + Sync + 'static {
    /// The asset type this loader produces.
    type Asset: Asset;

    /// The file extensions this loader handles (without dots).
    fn extensions(&self) -> &[&str];

    /// Decode the bytes in `ctx`.
    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset>;

    /// Higher priority loaders win when several handle the same type and
    /// extension.
    fn priority(&self) -> i32 {
        DEFAULT_LOADER_PRIORITY
    }
}

/// Type-erased asset loader for dynamic dispatch.
pub trait ErasedAssetLoader: Send + Sync {
    fn asset_type_id(&self) -> TypeId;

    fn asset_type_name(&self) -> &'static str;

    fn extensions(&self) -> &[&str];

    fn priority(&self) -> i32;

    fn load_erased(&self, ctx: LoadContext<'_>) -> AssetResult<ErasedAsset>;
}

impl<L: AssetLoader> ErasedAssetLoader for L {
    fn asset_type_id(&self) -> TypeId {
        TypeId::of::<L::Asset>()
    }

    fn asset_type_name(&self) -> &'static str {
        <L::Asset as Asset>::type_name()
    }

    fn extensions(&self) -> &[&str] {
        AssetLoader::extensions(self)
    }

    fn priority(&self) -> i32 {
        AssetLoader::priority(self)
    }

    fn load_erased(&self, ctx: LoadContext<'_>) -> AssetResult<ErasedAsset> {
        let asset = self.load(ctx)?;
        Ok(Arc::new(asset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LoaderKey {
    type_id: TypeId,
    extension: String,
}

struct LoaderEntry {
    loader: Arc<dyn ErasedAssetLoader>,
    priority: i32,
}

/// Registry of asset loaders, indexed by asset type and extension.
///
/// A key of type `T` named `foo.ext` is decoded by the highest priority
/// loader that produces `T` and handles `ext`. Extensions are matched
/// case-insensitively.
#[derive(Default)]
pub struct LoaderRegistry {
    by_type_and_ext: HashMap<LoaderKey, Vec<LoaderEntry>>,
    by_type: HashMap<TypeId, Vec<Arc<dyn ErasedAssetLoader>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a loader for its declared extensions.
    pub fn register<L: AssetLoader>(&mut self, loader: L) {
        let loader = Arc::new(loader);
        let type_id = loader.asset_type_id();
        let priority = ErasedAssetLoader::priority(&*loader);

        for ext in ErasedAssetLoader::extensions(&*loader) {
            let key = LoaderKey {
                type_id,
                extension: ext.to_lowercase(),
            };
            let entries = self.by_type_and_ext.entry(key).or_default();
            entries.push(LoaderEntry {
                loader: loader.clone(),
                priority,
            });
            // Highest priority first
            entries.sort_by(|a, b| b.priority.cmp(&a.priority));
        }

        tracing::debug!(
            "Registered loader for {} ({:?})",
            loader.asset_type_name(),
            ErasedAssetLoader::extensions(&*loader)
        );
        self.by_type.entry(type_id).or_default().push(loader);
    }

    /// The loader that would decode `type_id` with `extension`.
    pub fn get(&self, type_id: TypeId, extension: &str) -> Option<&Arc<dyn ErasedAssetLoader>> {
        let key = LoaderKey {
            type_id,
            extension: extension.to_lowercase(),
        };
        self.by_type_and_ext
            .get(&key)
            .and_then(|entries| entries.first())
            .map(|entry| &entry.loader)
    }

    pub fn has_loader_for<T: 'static>(&self, extension: &str) -> bool {
        self.get(TypeId::of::<T>(), extension).is_some()
    }

    pub fn has_loader_for_type<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// Decode `bytes` as the type `key` is tagged with.
    pub fn load(&self, key: &ResourceKey, bytes: &[u8]) -> AssetResult<ErasedAsset> {
        let no_loader = || AssetError::NoLoader { key: key.clone() };
        let ext = key.extension().ok_or_else(no_loader)?;
        let loader = self.get(key.type_id(), ext).ok_or_else(no_loader)?;
        loader.load_erased(LoadContext::new(key, bytes))
    }

    /// Decode `bytes` and downcast to `T`.
    pub fn load_typed<T: Asset>(&self, key: &ResourceKey, bytes: &[u8]) -> AssetResult<Arc<T>> {
        let value = self.load(key, bytes)?;
        crate::fetch::downcast::<T>(key, value)
    }

    /// All extensions registered for a type.
    pub fn extensions_for_type<T: 'static>(&self) -> Vec<&str> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|loaders| {
                loaders
                    .iter()
                    .flat_map(|l| l.extensions().iter().copied())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Loads UTF-8 text.
pub struct TextLoader;

impl AssetLoader for TextLoader {
    type Asset = String;

    fn extensions(&self) -> &[&str] {
        &["txt", "text", "md", "json", "csv"]
    }

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        String::from_utf8(ctx.bytes.to_vec()).map_err(|e| ctx.error(format!("Invalid UTF-8: {}", e)))
    }
}

/// Loads raw bytes.
pub struct BytesLoader;

impl AssetLoader for BytesLoader {
    type Asset = Vec<u8>;

    fn extensions(&self) -> &[&str] {
        &["bin", "bytes", "dat"]
    }

    fn load(&self, ctx: LoadContext<'_>) -> AssetResult<Self::Asset> {
        Ok(ctx.bytes.to_vec())
    }
}
