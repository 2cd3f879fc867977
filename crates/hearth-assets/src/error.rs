//! Error types for the asset system.

use std::fmt;
use std::path::PathBuf;

use crate::key::ResourceKey;

/// Errors surfaced to load and instantiate observers.
///
/// Every variant names the key it concerns, so an error callback can always
/// tell which request failed.
#[derive(Debug)]
pub enum AssetError {
    /// The fetch capability reported a failure.
    FetchFailed {
        key: ResourceKey,
        /// Description from the fetcher.
        reason: String,
    },

    /// No bytes exist for the key's path.
    NotFound {
        key: ResourceKey,
        /// The path that was probed.
        path: String,
    },

    /// Reading the key's bytes failed.
    IoError {
        key: ResourceKey,
        path: PathBuf,
        source: std::io::Error,
    },

    /// No loader handles this key's type and extension.
    NoLoader { key: ResourceKey },

    /// No instantiator is registered for this key's instance type.
    NoInstantiator { key: ResourceKey },

    /// A loader or instantiator rejected the data.
    LoaderError { key: ResourceKey, message: String },

    /// The fetched value is not of the type the key is tagged with.
    TypeMismatch {
        key: ResourceKey,
        /// Name of the type the caller asked for.
        expected: &'static str,
    },
}

impl AssetError {
    /// Shorthand for [`AssetError::FetchFailed`].
    pub fn fetch_failed(key: ResourceKey, reason: impl Into<String>) -> Self {
        AssetError::FetchFailed {
            key,
            reason: reason.into(),
        }
    }

    /// The key this error is about.
    pub fn key(&self) -> &ResourceKey {
        match self {
            AssetError::FetchFailed { key, .. }
            | AssetError::NotFound { key, .. }
            | AssetError::IoError { key, .. }
            | AssetError::NoLoader { key }
            | AssetError::NoInstantiator { key }
            | AssetError::LoaderError { key, .. }
            | AssetError::TypeMismatch { key, .. } => key,
        }
    }
}

impl fmt::Display for AssetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetError::FetchFailed { key, reason } => {
                write!(f, "Failed to load asset {}: {}", key, reason)
            }
            AssetError::NotFound { key, path } => {
                write!(f, "Asset {} not found at '{}'", key, path)
            }
            AssetError::IoError { key, path, source } => {
                write!(f, "IO error loading {} from '{}': {}", key, path.display(), source)
            }
            AssetError::NoLoader { key } => match key.extension() {
                Some(ext) => write!(f, "No loader registered for {} with extension .{}", key.type_name(), ext),
                None => write!(f, "No loader registered for {} ({} has no extension)", key.type_name(), key.name()),
            },
            AssetError::NoInstantiator { key } => {
                write!(f, "No instantiator registered for {}", key.type_name())
            }
            AssetError::LoaderError { key, message } => {
                write!(f, "Failed to decode {}: {}", key, message)
            }
            AssetError::TypeMismatch { key, expected } => {
                write!(f, "Type mismatch for {}: expected {}", key, expected)
            }
        }
    }
}

impl std::error::Error for AssetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AssetError::IoError { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_names_its_key() {
        let key = ResourceKey::of::<String>("missing.txt");
        let err = AssetError::fetch_failed(key.clone(), "remote unavailable");
        assert_eq!(err.key(), &key);
        assert!(err.to_string().contains("missing.txt"));
        assert!(err.to_string().contains("remote unavailable"));
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error;

        let key = ResourceKey::of::<String>("locked.txt");
        let err = AssetError::IoError {
            key,
            path: PathBuf::from("locked.txt"),
            source: std::io::Error::other("denied"),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn test_no_loader_mentions_extension() {
        let err = AssetError::NoLoader {
            key: ResourceKey::of::<String>("song.ogg"),
        };
        assert!(err.to_string().contains(".ogg"));
    }
}
