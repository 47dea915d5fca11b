//! Content-addressed cover images.

use crate::BackendHandle;
use crate::error::Result;
use std::path::Path;
use tracing::instrument;

const DEFAULT_PREFIX: &str = "covers";
const DEFAULT_EXTENSION: &str = "jpg";

/// Stores cover images under the BLAKE3 hash of their bytes.
///
/// Identical images scraped from different sites end up as one file, and
/// saving the same bytes twice doesn't rewrite anything. Paths look like
/// `covers/ab/abcdef....jpg` and are what Items store as their cover.
#[derive(Clone)]
pub struct CoverStore {
    backend: BackendHandle,
    prefix: String,
}
impl CoverStore {
    pub fn new(backend: BackendHandle) -> Self {
        Self { backend, prefix: DEFAULT_PREFIX.to_string() }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_matches('/').to_string();
        self
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    /// The relative path the given bytes are stored at.
    pub fn path_for(&self, data: &[u8], extension: Option<&str>) -> String {
        let hash = blake3::hash(data).to_hex();
        let extension = extension.and_then(sanitize_extension).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
        format!("{}/{}/{}.{}", self.prefix, &hash[..2], hash, extension)
    }

    /// Store cover bytes, returning their relative path.
    #[instrument(skip(self, data), fields(backend = self.backend.name(), size = data.len()))]
    pub async fn save(&self, data: &[u8], extension: Option<&str>) -> Result<String> {
        let path = self.path_for(data, extension);
        if self.backend.exists(Path::new(&path)).await? {
            tracing::debug!(%path, "Cover already stored");
            return Ok(path);
        }
        self.backend.write(Path::new(&path), data).await?;
        tracing::debug!(%path, "Stored cover");
        Ok(path)
    }

    pub async fn load(&self, path: &str) -> Result<Vec<u8>> {
        self.backend.read(Path::new(path)).await
    }
}

/// Lowercase alphanumeric extensions of at most five characters; anything
/// else falls back to the default.
fn sanitize_extension(extension: &str) -> Option<String> {
    let extension = extension.trim().trim_start_matches('.').to_ascii_lowercase();
    let valid = !extension.is_empty() && extension.len() <= 5 && extension.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(extension)
}
