//! Keyed asset loading for Hearth.
//!
//! A resource is identified by a [`ResourceKey`] (type tag plus name), fetched
//! at most once through an [`AssetFetcher`], shared by every caller that asks
//! for it, and released explicitly.
//!
//! - [`AssetCache`] partitions in-flight and loaded operations by type and
//!   coalesces concurrent requests for a pending key onto one fetch.
//! - [`InstantiationTracker`] maps each placed object back to the fetch that
//!   produced it, so releasing the object also releases its handle.
//! - [`AssetServer`] combines both and records [`AssetEvent`]s.
//!
//! Completion is cooperative: nothing happens until the host calls
//! [`AssetServer::update`], which polls every outstanding fetch once and runs
//! observers on the calling thread.

pub mod cache;
pub mod error;
pub mod event;
pub mod fetch;
pub mod handle;
pub mod instantiator;
pub mod io;
pub mod key;
pub mod loader;
pub mod loader_fetcher;
pub mod operation;
pub mod server;
pub mod state;
pub mod tracker;

pub use cache::{AssetCache, Completion, LoadOutcome};
pub use error::{AssetError, AssetResult};
pub use event::{AssetEvent, AssetEventBuffer};
pub use fetch::{AssetFetcher, ErasedAsset, FetchFuture, FetchRequest, InstantiateRequest, Placement};
pub use handle::{FetchHandle, HandleAllocator, Instance, InstanceId};
pub use instantiator::{AssetInstantiator, InstantiateContext, InstantiatorRegistry};
pub use io::{BytesReader, FileReader, MemoryReader};
pub use key::ResourceKey;
pub use loader::{AssetLoader, BytesLoader, LoadContext, LoaderRegistry, TextLoader};
pub use loader_fetcher::{LoaderFetcher, LoaderFetcherBuilder};
pub use operation::{LoadOperation, Observer};
pub use server::AssetServer;
pub use state::{LoadResult, LoadState, OperationState};
pub use tracker::{InstanceCompletion, InstantiationTracker};

/// Marker trait for values that can be loaded through the asset system.
pub trait Asset: Send + Sync + 'static {
    /// Human-readable name used in keys, logs and errors.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

impl Asset for String {
    fn type_name() -> &'static str {
        "String"
    }
}

impl Asset for Vec<u8> {
    fn type_name() -> &'static str {
        "Bytes"
    }
}

pub mod prelude {
    pub use crate::{
        Asset, AssetError, AssetEvent, AssetFetcher, AssetLoader, AssetServer, Instance,
        InstanceId, LoadContext, LoadOutcome, LoadState, Placement, ResourceKey,
    };
}
