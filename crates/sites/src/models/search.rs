use crate::models::ItemCategory;

/// One hit from an adapter's external search, not yet linked to anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalSearchResult {
    pub category: ItemCategory,
    pub title: String,
    pub url: String,
    pub subtitle: Option<String>,
    /// Name of the site that produced the hit.
    pub source: String,
}
