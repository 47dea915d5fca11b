//! Storage backend trait and implementations.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use std::path::Path;

/// Unified interface for storing cover assets.
///
/// # Path Handling
/// All paths are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// ```
/// use std::path::Path;
/// use catalog_storage::{StorageBackend, error::Result};
///
/// async fn cover_size(backend: &dyn StorageBackend, path: &Path) -> Result<u64> {
///     if backend.exists(path).await? {
///         Ok(backend.stat(path).await?.size)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read file contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or overwrite a file. Parent directories are created as needed.
    async fn write(&self, path: &Path, data: &[u8]) -> Result<()>;

    /// Delete a file.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the file
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Get file metadata without reading contents.
    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}
