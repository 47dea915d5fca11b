//! Snapshots of external sources.

use catalog_sites::models::{IdType, ItemModel, PREFERRED_MODEL_KEY, ResourceContent, ResourceDescriptor, normalize_pair};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use time::UtcDateTime;
use uuid::Uuid;

/// What one external source said about one external id.
///
/// There is exactly one of these per `(id_type, id_value)`; a forced refresh
/// rewrites it in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalResource {
    pub id_type: IdType,
    pub id_value: String,
    pub url: String,
    pub metadata: Map<String, Value>,
    /// Other identifiers the source revealed, as scraped (not normalized).
    pub lookup_ids: BTreeMap<IdType, String>,
    /// Storage path of the cover this source provided.
    pub cover: Option<String>,
    pub required_resources: Vec<ResourceDescriptor>,
    pub related_resources: Vec<ResourceDescriptor>,
    pub item: Option<Uuid>,
    pub scraped_at: UtcDateTime,
}

impl ExternalResource {
    /// Snapshot freshly scraped content. The cover bytes aren't kept, only
    /// the path they were stored at (set later).
    pub fn new(id_type: IdType, id_value: impl Into<String>, url: impl Into<String>, content: &ResourceContent) -> Self {
        Self {
            id_type,
            id_value: id_value.into(),
            url: url.into(),
            metadata: content.metadata.clone(),
            lookup_ids: content.lookup_ids.clone(),
            cover: None,
            required_resources: content.required_resources.iter().map(without_content).collect(),
            related_resources: content.related_resources.iter().map(without_content).collect(),
            item: None,
            scraped_at: UtcDateTime::now(),
        }
    }

    /// The variant the metadata asks for, if it names a known one.
    pub fn preferred_model(&self) -> Option<ItemModel> {
        let raw = self.metadata.get(PREFERRED_MODEL_KEY)?.as_str()?;
        raw.parse().ok()
    }

    /// Every identifier this resource can be matched by, normalized, with
    /// the resource's own id first. Malformed ids are skipped.
    pub fn candidate_ids(&self) -> Vec<(IdType, String)> {
        let own = std::iter::once((self.id_type, self.id_value.as_str()));
        let others = self.lookup_ids.iter().map(|(id_type, value)| (*id_type, value.as_str()));
        let mut candidates: Vec<(IdType, String)> = Vec::new();
        for (id_type, raw) in own.chain(others) {
            match normalize_pair(id_type, raw) {
                Ok(pair) if !candidates.contains(&pair) => candidates.push(pair),
                Ok(_) => {},
                Err(err) => tracing::debug!(%id_type, value = raw, error = %err, "Skipping malformed lookup id"),
            }
        }
        candidates
    }
}

fn without_content(descriptor: &ResourceDescriptor) -> ResourceDescriptor {
    ResourceDescriptor { content: None, ..descriptor.clone() }
}
