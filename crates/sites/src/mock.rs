//! In-memory site adapter for testing.

use crate::error::{DownloadErrorKind, ErrorKind, Result};
use crate::models::{ExternalSearchResult, IdType, ItemCategory, ItemModel, ResourceContent};
use crate::site::SiteAdapter;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

enum Response {
    Content(ResourceContent),
    Failure(ErrorKind),
}

/// Site adapter serving canned content from memory.
///
/// URLs look like `https://{name}.example/item/{id}`. Every scrape is
/// counted so tests can assert how much real work happened.
///
/// # Examples
///
/// ```
/// use catalog_sites::mock::MockSite;
/// use catalog_sites::models::{IdType, ItemModel, ResourceContent};
/// use catalog_sites::SiteAdapter;
///
/// let site = MockSite::new("books", IdType::Goodreads, ItemModel::Edition)
///     .with_content("1", ResourceContent::titled("Dune"));
/// assert_eq!(site.url_to_id("https://books.example/item/1").as_deref(), Some("1"));
/// ```
pub struct MockSite {
    name: String,
    id_type: IdType,
    model: ItemModel,
    patterns: Vec<Regex>,
    responses: Mutex<HashMap<String, Response>>,
    scrapes: Mutex<HashMap<String, usize>>,
    total_scrapes: AtomicUsize,
    delay: Option<Duration>,
    search_results: Vec<String>,
}

impl MockSite {
    pub fn new(name: impl Into<String>, id_type: IdType, model: ItemModel) -> Self {
        let name = name.into();
        // The panic here is DELIBERATE. MockSite is intended to be used in
        // tests; a bad site name is a broken test.
        let pattern = Regex::new(&format!(r"^https?://{}\.example/item/([^/?#]+)", regex::escape(&name)))
            .unwrap_or_else(|_| panic!("MockSite::new: invalid site name {name}"));
        Self {
            name,
            id_type,
            model,
            patterns: vec![pattern],
            responses: Mutex::new(HashMap::new()),
            scrapes: Mutex::new(HashMap::new()),
            total_scrapes: AtomicUsize::new(0),
            delay: None,
            search_results: Vec::new(),
        }
    }

    pub fn with_content(self, id_value: impl Into<String>, content: ResourceContent) -> Self {
        self.set_content(id_value, content);
        self
    }

    pub fn with_failure(self, id_value: impl Into<String>, kind: ErrorKind) -> Self {
        self.lock_responses().insert(id_value.into(), Response::Failure(kind));
        self
    }

    /// Every scrape and search sleeps this long first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_search_result(mut self, title: impl Into<String>) -> Self {
        self.search_results.push(title.into());
        self
    }

    /// Replace the canned content for an id (simulates the source changing).
    pub fn set_content(&self, id_value: impl Into<String>, content: ResourceContent) {
        self.lock_responses().insert(id_value.into(), Response::Content(content));
    }

    pub fn scrape_count(&self) -> usize {
        self.total_scrapes.load(Ordering::SeqCst)
    }

    pub fn scrape_count_for(&self, id_value: &str) -> usize {
        self.scrapes.lock().map(|s| s.get(id_value).copied().unwrap_or(0)).unwrap_or(0)
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, HashMap<String, Response>> {
        // A poisoned lock means another test thread already panicked.
        self.responses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SiteAdapter for MockSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn id_type(&self) -> IdType {
        self.id_type
    }

    fn default_model(&self) -> ItemModel {
        self.model
    }

    fn url_patterns(&self) -> &[Regex] {
        &self.patterns
    }

    fn id_to_url(&self, id_value: &str) -> String {
        format!("https://{}.example/item/{}", self.name, id_value)
    }

    async fn scrape(&self, id_value: &str, _url: &str) -> Result<ResourceContent> {
        self.total_scrapes.fetch_add(1, Ordering::SeqCst);
        {
            let mut scrapes = self.scrapes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            *scrapes.entry(id_value.to_string()).or_default() += 1;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let response = {
            let responses = self.lock_responses();
            match responses.get(id_value) {
                Some(Response::Content(content)) => Ok(content.clone()),
                Some(Response::Failure(kind)) => Err(kind.clone()),
                None => Err(ErrorKind::Download(DownloadErrorKind::InvalidContent, format!("no such item: {id_value}"))),
            }
        };
        response.map_err(exn::Exn::from)
    }

    async fn search(&self, _query: &str, _page: u32, _category: Option<ItemCategory>) -> Result<Vec<ExternalSearchResult>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .search_results
            .iter()
            .map(|title| ExternalSearchResult {
                category: self.model.category(),
                title: title.clone(),
                url: self.id_to_url(title),
                subtitle: None,
                source: self.name.clone(),
            })
            .collect())
    }
}
