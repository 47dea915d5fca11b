use super::proxy::{DescriptorProxy, LookupIdsProxy};
use super::{parse_timestamp, parse_uuid};
use crate::error::{Error, ErrorKind};
use crate::resource::ExternalResource;
use catalog_sites::models::{IdType, ResourceDescriptor};
use exn::ResultExt;
use std::collections::BTreeMap;

#[derive(sqlx::FromRow)]
pub(crate) struct ResourceRow {
    pub(crate) id_type: String,
    pub(crate) id_value: String,
    pub(crate) url: String,
    pub(crate) metadata: String,
    pub(crate) lookup_ids: String,
    pub(crate) cover: Option<String>,
    pub(crate) required_resources: String,
    pub(crate) related_resources: String,
    pub(crate) item_uuid: Option<String>,
    pub(crate) scraped_at: i64,
}

fn descriptors_to_json(descriptors: &[ResourceDescriptor], field: &'static str) -> Result<String, Error> {
    let proxies = descriptors.iter().map(DescriptorProxy::from).collect::<Vec<_>>();
    serde_json::to_string(&proxies).or_raise(|| ErrorKind::InvalidData(field))
}

fn descriptors_from_json(raw: &str, field: &'static str) -> Result<Vec<ResourceDescriptor>, Error> {
    serde_json::from_str::<Vec<DescriptorProxy>>(raw)
        .or_raise(|| ErrorKind::InvalidData(field))?
        .into_iter()
        .map(ResourceDescriptor::try_from)
        .collect()
}

impl TryFrom<&ExternalResource> for ResourceRow {
    type Error = Error;
    fn try_from(resource: &ExternalResource) -> Result<Self, Self::Error> {
        Ok(Self {
            id_type: resource.id_type.to_string(),
            id_value: resource.id_value.clone(),
            url: resource.url.clone(),
            metadata: serde_json::to_string(&resource.metadata).or_raise(|| ErrorKind::InvalidData("metadata"))?,
            lookup_ids: serde_json::to_string(&LookupIdsProxy::from(&resource.lookup_ids))
                .or_raise(|| ErrorKind::InvalidData("lookup ids"))?,
            cover: resource.cover.clone(),
            required_resources: descriptors_to_json(&resource.required_resources, "required resources")?,
            related_resources: descriptors_to_json(&resource.related_resources, "related resources")?,
            item_uuid: resource.item.map(|uuid| uuid.to_string()),
            scraped_at: resource.scraped_at.unix_timestamp(),
        })
    }
}
impl TryFrom<ResourceRow> for ExternalResource {
    type Error = Error;
    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        let lookup_ids: LookupIdsProxy =
            serde_json::from_str(&row.lookup_ids).or_raise(|| ErrorKind::InvalidData("lookup ids"))?;
        Ok(Self {
            id_type: row.id_type.parse::<IdType>().or_raise(|| ErrorKind::InvalidData("id type"))?,
            id_value: row.id_value,
            url: row.url,
            metadata: serde_json::from_str(&row.metadata).or_raise(|| ErrorKind::InvalidData("metadata"))?,
            lookup_ids: BTreeMap::try_from(lookup_ids)?,
            cover: row.cover,
            required_resources: descriptors_from_json(&row.required_resources, "required resources")?,
            related_resources: descriptors_from_json(&row.related_resources, "related resources")?,
            item: row.item_uuid.as_deref().map(|raw| parse_uuid(raw, "item uuid")).transpose()?,
            scraped_at: parse_timestamp(row.scraped_at, "scrape date")?,
        })
    }
}
