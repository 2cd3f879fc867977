//! A fetcher that reads bytes and decodes them with registered loaders.

use std::sync::Arc;

use hearth_core::TaskPool;
use hearth_core::alloc::HashSet;
use parking_lot::Mutex;

use crate::error::{AssetError, AssetResult};
use crate::fetch::{
    self, AssetFetcher, ErasedAsset, FetchFuture, FetchRequest, InstantiateRequest, Placement,
};
use crate::handle::FetchHandle;
use crate::instantiator::{AssetInstantiator, InstantiateContext, InstantiatorRegistry};
use crate::io::BytesReader;
use crate::key::ResourceKey;
use crate::loader::{AssetLoader, LoaderRegistry};

/// [`AssetFetcher`] backed by a [`BytesReader`], a [`LoaderRegistry`] and an
/// [`InstantiatorRegistry`].
///
/// Reading and decoding run on the [`TaskPool`]; `fetch` and `instantiate`
/// return at once. Dropping a returned future cancels its work.
///
/// ```ignore
/// let fetcher = LoaderFetcher::builder(FileReader::new("assets"))
///     .with_loader(TextLoader)
///     .build(pool);
/// let server = AssetServer::new(Arc::new(fetcher));
/// ```
pub struct LoaderFetcher {
    reader: Arc<dyn BytesReader>,
    loaders: Arc<LoaderRegistry>,
    instantiators: Arc<InstantiatorRegistry>,
    pool: Arc<TaskPool>,
    live: Mutex<HashSet<FetchHandle>>,
}

impl LoaderFetcher {
    pub fn builder(reader: impl BytesReader) -> LoaderFetcherBuilder {
        LoaderFetcherBuilder {
            reader: Arc::new(reader),
            loaders: LoaderRegistry::new(),
            instantiators: InstantiatorRegistry::new(),
        }
    }

    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    pub fn instantiators(&self) -> &InstantiatorRegistry {
        &self.instantiators
    }

    /// Handles issued to this fetcher and not yet released.
    pub fn live_handles(&self) -> Vec<FetchHandle> {
        let mut handles: Vec<_> = self.live.lock().iter().copied().collect();
        handles.sort();
        handles
    }

    fn track(&self, handle: FetchHandle) {
        self.live.lock().insert(handle);
    }
}

impl AssetFetcher for LoaderFetcher {
    fn fetch(&self, request: &FetchRequest) -> FetchFuture {
        self.track(request.handle);
        let reader = Arc::clone(&self.reader);
        let loaders = Arc::clone(&self.loaders);
        let key = request.key.clone();

        let task = self.pool.spawn_blocking(move || -> AssetResult<ErasedAsset> {
            let bytes = reader.read(&key)?;
            loaders.load(&key, &bytes)
        });
        Box::pin(task)
    }

    fn instantiate(&self, request: &InstantiateRequest) -> FetchFuture {
        self.track(request.handle);
        let source_key = match self.instantiators.source_key(&request.key) {
            Ok(source_key) => source_key,
            Err(err) => return fetch::ready(Err(err)),
        };
        let reader = Arc::clone(&self.reader);
        let loaders = Arc::clone(&self.loaders);
        let instantiators = Arc::clone(&self.instantiators);
        let key = request.key.clone();
        let placement = request.placement;

        let task = self.pool.spawn_blocking(move || -> AssetResult<ErasedAsset> {
            let bytes = reader.read(&source_key)?;
            let source = loaders.load(&source_key, &bytes)?;
            instantiate_from(&instantiators, &key, &source, placement)
        });
        Box::pin(task)
    }

    fn release(&self, handle: FetchHandle) {
        if self.live.lock().remove(&handle) {
            tracing::trace!("LoaderFetcher released {}", handle);
        }
    }
}

fn instantiate_from(
    instantiators: &InstantiatorRegistry,
    key: &ResourceKey,
    source: &ErasedAsset,
    placement: Placement,
) -> AssetResult<ErasedAsset> {
    let instantiator = instantiators
        .get(key.type_id())
        .ok_or_else(|| AssetError::NoInstantiator { key: key.clone() })?;
    instantiator.instantiate_erased(source, InstantiateContext { key, placement })
}

impl std::fmt::Debug for LoaderFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderFetcher")
            .field("instantiators", &self.instantiators.len())
            .field("live", &self.live.lock().len())
            .finish()
    }
}

/// Collects loaders and instantiators for a [`LoaderFetcher`].
pub struct LoaderFetcherBuilder {
    reader: Arc<dyn BytesReader>,
    loaders: LoaderRegistry,
    instantiators: InstantiatorRegistry,
}

impl LoaderFetcherBuilder {
    pub fn with_loader<L: AssetLoader>(mut self, loader: L) -> Self {
        self.loaders.register(loader);
        self
    }

    pub fn with_instantiator<I: AssetInstantiator>(mut self, instantiator: I) -> Self {
        self.instantiators.register(instantiator);
        self
    }

    pub fn build(self, pool: Arc<TaskPool>) -> LoaderFetcher {
        LoaderFetcher {
            reader: self.reader,
            loaders: Arc::new(self.loaders),
            instantiators: Arc::new(self.instantiators),
            pool,
            live: Mutex::new(HashSet::default()),
        }
    }
}
