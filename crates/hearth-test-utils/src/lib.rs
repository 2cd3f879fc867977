//! Test utilities for Hearth.
//!
//! The main component is `MockFetcher` (requires the `mock` feature): an
//! [`AssetFetcher`](hearth_assets::AssetFetcher) whose requests stay pending
//! until the test completes them, and which records every request and
//! release for later assertions.
//!
//! # Example
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use std::sync::Arc;
//! use hearth_assets::AssetServer;
//! use hearth_test_utils::MockFetcher;
//!
//! let mock = Arc::new(MockFetcher::new());
//! mock.insert::<String>("intro.txt", "hello".to_string());
//!
//! let mut server = AssetServer::new(mock.clone());
//! server.request::<String>("intro.txt");
//! server.request::<String>("intro.txt");
//! assert_eq!(mock.fetch_count_of::<String>("intro.txt"), 1);
//!
//! mock.complete_all();
//! server.update();
//! assert!(server.is_cached::<String>("intro.txt"));
//! # }
//! ```
//!
//! # Interior Mutability
//!
//! Fetcher methods take `&self` but record calls, so all state sits behind
//! `parking_lot::Mutex`. `Mutex` keeps the mock `Send + Sync`, which the
//! fetcher trait requires.

#[cfg(feature = "mock")]
pub mod mock_fetcher;

#[cfg(feature = "mock")]
pub use mock_fetcher::*;
