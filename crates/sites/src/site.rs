//! The adapter contract every external source implements.

use crate::error::Result;
use crate::models::{ExternalSearchResult, IdType, ItemCategory, ItemModel, ResourceContent};
use async_trait::async_trait;
use regex::Regex;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

/// Unified interface for external sources.
///
/// Adapters are stateless: everything about a particular resource is passed
/// in. URL handling must be pure and deterministic, so that
/// `id_to_url(url_to_id(url))` always yields the same canonical URL.
///
/// # Examples
///
/// ```
/// use catalog_sites::SiteAdapter;
///
/// fn canonical(adapter: &dyn SiteAdapter, url: &str) -> Option<String> {
///     adapter.url_to_id(url).map(|id| adapter.id_to_url(&id))
/// }
/// ```
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Human readable name of the site (used for logging and search results).
    fn name(&self) -> &str;

    /// The identifier type this site's ids belong to.
    fn id_type(&self) -> IdType;

    /// The Item variant resources from this site become, unless the scraped
    /// metadata says otherwise.
    fn default_model(&self) -> ItemModel;

    /// Ordered URL patterns, each with exactly one capture group for the id.
    fn url_patterns(&self) -> &[Regex];

    /// Build the canonical URL for an id.
    fn id_to_url(&self, id_value: &str) -> String;

    /// Extract the id from a URL; the first matching pattern wins.
    fn url_to_id(&self, url: &str) -> Option<String> {
        self.url_patterns()
            .iter()
            .find_map(|pattern| pattern.captures(url))
            .and_then(|captures| captures.get(1))
            .map(|id| id.as_str().to_string())
    }

    fn validate_url(&self, url: &str) -> bool {
        self.url_to_id(url).is_some()
    }

    /// Fetch and normalize the resource. Performs network I/O.
    async fn scrape(&self, id_value: &str, url: &str) -> Result<ResourceContent>;

    /// Search the external site. Most sites don't support this.
    async fn search(&self, _query: &str, _page: u32, _category: Option<ItemCategory>) -> Result<Vec<ExternalSearchResult>> {
        Ok(Vec::new())
    }
}

pub type AdapterHandle = Arc<dyn SiteAdapter>;

/// An adapter bound to one specific external resource.
#[derive(Clone)]
pub struct Site {
    adapter: AdapterHandle,
    id_value: String,
    url: String,
}
impl Site {
    /// Bind an adapter to an id, computing the canonical URL.
    pub fn from_id(adapter: AdapterHandle, id_value: impl Into<String>) -> Self {
        let id_value = id_value.into();
        let url = adapter.id_to_url(&id_value);
        Self { adapter, id_value, url }
    }

    /// Bind an adapter to a URL it recognises. The URL is replaced with the
    /// canonical form.
    pub fn from_url(adapter: AdapterHandle, url: &str) -> Option<Self> {
        let id_value = adapter.url_to_id(url)?;
        Some(Self::from_id(adapter, id_value))
    }

    pub fn adapter(&self) -> &AdapterHandle {
        &self.adapter
    }

    pub fn id_type(&self) -> IdType {
        self.adapter.id_type()
    }

    pub fn id_value(&self) -> &str {
        &self.id_value
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn default_model(&self) -> ItemModel {
        self.adapter.default_model()
    }

    pub async fn scrape(&self) -> Result<ResourceContent> {
        self.adapter.scrape(&self.id_value, &self.url).await
    }
}
impl Debug for Site {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Site")
            .field("site", &self.adapter.name())
            .field("id_type", &self.adapter.id_type())
            .field("id_value", &self.id_value)
            .field("url", &self.url)
            .finish()
    }
}
impl PartialEq for Site {
    fn eq(&self, other: &Self) -> bool {
        self.id_type() == other.id_type() && self.id_value == other.id_value
    }
}
