//! Resolves URLs and id types to site adapters.
//!
//! The registry is built once at startup from an explicit list of adapters
//! and handed to whatever needs it. There is no global registration.

use crate::consts::HTTP_URL_REGEX;
use crate::error::{ErrorKind, Result};
use crate::models::{ExternalSearchResult, IdType, ItemCategory};
use crate::redirect::{NoRedirects, RedirectProbe};
use crate::site::{AdapterHandle, Site};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// How long external search waits for slow sites before giving up on them.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(2);

pub struct SiteRegistry {
    /// Registration order matters: the first adapter whose pattern matches wins.
    adapters: Vec<AdapterHandle>,
    by_id_type: HashMap<IdType, AdapterHandle>,
    redirects: Arc<dyn RedirectProbe>,
    search_timeout: Duration,
}

impl Default for SiteRegistry {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            by_id_type: HashMap::new(),
            redirects: Arc::new(NoRedirects),
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }
}

impl SiteRegistry {
    pub fn new(redirects: Arc<dyn RedirectProbe>) -> Self {
        Self { redirects, ..Self::default() }
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Build a registry from a static list of adapters.
    pub fn from_adapters(
        adapters: impl IntoIterator<Item = AdapterHandle>,
        redirects: Arc<dyn RedirectProbe>,
    ) -> Result<Self> {
        let mut registry = Self::new(redirects);
        for adapter in adapters {
            registry.register(adapter)?;
        }
        Ok(registry)
    }

    /// Add an adapter. Each id type may only be served by one adapter.
    pub fn register(&mut self, adapter: AdapterHandle) -> Result<()> {
        let id_type = adapter.id_type();
        if self.by_id_type.contains_key(&id_type) {
            exn::bail!(ErrorKind::DuplicateIdType(id_type.as_str()));
        }
        tracing::debug!(site = adapter.name(), %id_type, "Registered site adapter");
        self.by_id_type.insert(id_type, adapter.clone());
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    fn match_url(&self, url: &str) -> Option<Site> {
        self.adapters.iter().find(|a| a.validate_url(url)).and_then(|a| Site::from_url(a.clone(), url))
    }

    /// Resolve a URL to a site bound to its canonical URL.
    ///
    /// With `detect_redirection`, a URL that no adapter recognises gets one
    /// redirect hop (shortened links, legacy domains) before giving up.
    #[instrument(skip(self))]
    pub async fn get_site_by_url(&self, url: &str, detect_redirection: bool) -> Option<Site> {
        let url = url.trim();
        if !HTTP_URL_REGEX.is_match(url) {
            return None;
        }
        if let Some(site) = self.match_url(url) {
            return Some(site);
        }
        if !detect_redirection {
            return None;
        }
        let target = self.redirects.redirect_target(url).await?;
        if target == url {
            return None;
        }
        tracing::debug!(from = url, to = %target, "Following redirect to resolve site");
        self.match_url(&target)
    }

    /// Same as [`get_site_by_url`](Self::get_site_by_url) but an unsupported
    /// URL is an error.
    pub async fn require_site_by_url(&self, url: &str, detect_redirection: bool) -> Result<Site> {
        match self.get_site_by_url(url, detect_redirection).await {
            Some(site) => Ok(site),
            None => exn::bail!(ErrorKind::UnsupportedUrl(url.to_string())),
        }
    }

    pub fn get_adapter_by_id_type(&self, id_type: IdType) -> Option<AdapterHandle> {
        self.by_id_type.get(&id_type).cloned()
    }

    pub fn get_site_by_id_type(&self, id_type: IdType, id_value: impl Into<String>) -> Option<Site> {
        self.get_adapter_by_id_type(id_type).map(|adapter| Site::from_id(adapter, id_value))
    }

    /// Query every adapter concurrently and gather whatever arrives before
    /// the search timeout. Slow or failing sites are skipped.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, page: u32, category: Option<ItemCategory>) -> Vec<ExternalSearchResult> {
        let timeout = self.search_timeout;
        let tasks = self.adapters.iter().map(|adapter| async move {
            match tokio::time::timeout(timeout, adapter.search(query, page, category)).await {
                Ok(Ok(results)) => results,
                Ok(Err(err)) => {
                    tracing::warn!(site = adapter.name(), error = %err, "External search failed");
                    Vec::new()
                },
                Err(_) => {
                    tracing::warn!(site = adapter.name(), "External search timed out");
                    Vec::new()
                },
            }
        });
        join_all(tasks).await.into_iter().flatten().collect()
    }
}
