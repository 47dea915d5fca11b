use crate::error::{ErrorKind, Result};
use crate::keyed::KeyedLocks;
use catalog_config::{Config, LinkConfig};
use catalog_sites::{AdapterHandle, HttpRedirectProbe, SiteRegistry};
use catalog_storage::CoverStore;
use catalog_storage::backend::LocalBackend;
use catalog_store::index::IndexSink;
use catalog_store::{Database, Repository};
use exn::ResultExt;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

/// Everything the linker and the fetch coordinator need, cheap to clone.
#[derive(Clone)]
pub struct Context {
    pub registry: Arc<SiteRegistry>,
    pub repository: Repository,
    /// Where scraped covers are stored. Without one, covers are skipped.
    pub covers: Option<CoverStore>,
    pub link: LinkConfig,
    pub(crate) locks: KeyedLocks,
}
impl Context {
    pub fn new(registry: Arc<SiteRegistry>, repository: Repository) -> Self {
        Self {
            registry,
            repository,
            covers: None,
            link: LinkConfig::default(),
            locks: KeyedLocks::default(),
        }
    }

    pub fn with_covers(mut self, covers: CoverStore) -> Self {
        self.covers = Some(covers);
        self
    }

    pub fn with_link_config(mut self, link: LinkConfig) -> Self {
        self.link = link;
        self
    }

    /// Open the database and cover storage named in the configuration and
    /// register the given adapters. The database handle is returned so the
    /// caller can close it on shutdown.
    pub async fn from_config(
        config: &Config,
        adapters: impl IntoIterator<Item = AdapterHandle>,
        index: Arc<dyn IndexSink>,
    ) -> Result<(Self, Database)> {
        let db = Database::connect(&config.database.path, config.database.max_connections)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let backend = LocalBackend::new("covers", &config.covers.root).or_raise(|| ErrorKind::Storage)?;
        let covers = CoverStore::new(Arc::new(backend)).with_prefix(config.covers.prefix.as_str());
        let probe = HttpRedirectProbe::new(config.link.redirect_timeout()).or_raise(|| ErrorKind::Registry)?;
        let registry = SiteRegistry::from_adapters(adapters, Arc::new(probe))
            .or_raise(|| ErrorKind::Registry)?
            .with_search_timeout(config.link.search_timeout());
        tracing::info!(
            database = %config.database.path.display(),
            covers = %config.covers.root.display(),
            sites = registry.len(),
            "Catalog context ready"
        );
        let repository = Repository::from(&db).with_index(index);
        let context = Self::new(Arc::new(registry), repository)
            .with_covers(covers)
            .with_link_config(config.link.clone());
        Ok((context, db))
    }
}
impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Context")
            .field("sites", &self.registry.len())
            .field("repository", &self.repository)
            .field("covers", &self.covers.is_some())
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}
