use crate::models::{IdType, ItemModel};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Metadata key an adapter (or a richer source) uses to override its
/// adapter's default variant.
pub const PREFERRED_MODEL_KEY: &str = "preferred_model";

/// Points at another external resource that the scraped one depends on
/// (required) or is associated with (related).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// The variant the referenced resource is expected to become.
    pub model: Option<ItemModel>,
    pub id_type: IdType,
    pub id_value: String,
    pub title: Option<String>,
    pub url: Option<String>,
    /// Content the adapter already has in hand, which saves a scrape.
    pub content: Option<Box<ResourceContent>>,
}
impl ResourceDescriptor {
    pub fn new(id_type: IdType, id_value: impl Into<String>) -> Self {
        Self {
            model: None,
            id_type,
            id_value: id_value.into(),
            title: None,
            url: None,
            content: None,
        }
    }

    pub fn with_model(mut self, model: ItemModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_content(mut self, content: ResourceContent) -> Self {
        self.content = Some(Box::new(content));
        self
    }
}

/// The normalized result of scraping one external resource.
///
/// Transient: the linker persists what it needs of this into an external
/// resource row and (possibly) an Item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceContent {
    pub metadata: Map<String, Value>,
    /// Every external identifier the source revealed for this resource.
    pub lookup_ids: BTreeMap<IdType, String>,
    pub cover_image: Option<Vec<u8>>,
    pub cover_image_extension: Option<String>,
    pub required_resources: Vec<ResourceDescriptor>,
    pub related_resources: Vec<ResourceDescriptor>,
}
impl ResourceContent {
    pub fn new(metadata: Map<String, Value>) -> Self {
        Self { metadata, ..Self::default() }
    }

    /// Convenience constructor for the (very common) title-only content.
    pub fn titled(title: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("title".to_string(), Value::String(title.into()));
        Self::new(metadata)
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_lookup_id(mut self, id_type: IdType, value: impl Into<String>) -> Self {
        self.lookup_ids.insert(id_type, value.into());
        self
    }

    pub fn with_cover(mut self, bytes: impl Into<Vec<u8>>, extension: impl Into<String>) -> Self {
        self.cover_image = Some(bytes.into());
        self.cover_image_extension = Some(extension.into());
        self
    }

    pub fn with_required(mut self, descriptor: ResourceDescriptor) -> Self {
        self.required_resources.push(descriptor);
        self
    }

    pub fn with_related(mut self, descriptor: ResourceDescriptor) -> Self {
        self.related_resources.push(descriptor);
        self
    }

    /// The variant explicitly requested by the metadata, if it names a known one.
    ///
    /// An unknown value is ignored (and logged) rather than failing the
    /// whole resource: the adapter's default still applies.
    pub fn preferred_model(&self) -> Option<ItemModel> {
        let raw = self.metadata.get(PREFERRED_MODEL_KEY)?.as_str()?;
        match raw.parse() {
            Ok(model) => Some(model),
            Err(_) => {
                tracing::warn!(preferred_model = raw, "Ignoring unknown preferred model in scraped metadata");
                None
            },
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_model() {
        let content = ResourceContent::titled("Dune").with_metadata(PREFERRED_MODEL_KEY, "TVShow");
        assert_eq!(content.preferred_model(), Some(ItemModel::TVShow));
        let content = ResourceContent::titled("Dune").with_metadata(PREFERRED_MODEL_KEY, "Spaceship");
        assert_eq!(content.preferred_model(), None);
        assert_eq!(ResourceContent::titled("Dune").preferred_model(), None);
    }

    #[test]
    fn test_builders() {
        let content = ResourceContent::titled("Foundation")
            .with_lookup_id(IdType::Isbn, "9780553293357")
            .with_required(ResourceDescriptor::new(IdType::GoodreadsWork, "1").with_model(ItemModel::Work))
            .with_cover(b"jpeg".to_vec(), "jpg");
        assert_eq!(content.title(), Some("Foundation"));
        assert_eq!(content.lookup_ids.get(&IdType::Isbn).map(String::as_str), Some("9780553293357"));
        assert_eq!(content.required_resources.len(), 1);
        assert_eq!(content.cover_image_extension.as_deref(), Some("jpg"));
    }
}
