use crate::error::{Error, ErrorKind};
use catalog_sites::models::{IdType, ItemModel, ResourceDescriptor};
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored form of a resource descriptor. Preloaded content is never stored.
#[derive(Serialize, Deserialize)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub(crate) struct DescriptorProxy {
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    model: Option<ItemModel>,
    #[serde(rename = "t")]
    id_type: String,
    #[serde(rename = "v")]
    id_value: String,
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}
impl From<&ResourceDescriptor> for DescriptorProxy {
    fn from(descriptor: &ResourceDescriptor) -> Self {
        Self {
            model: descriptor.model,
            id_type: descriptor.id_type.to_string(),
            id_value: descriptor.id_value.clone(),
            title: descriptor.title.clone(),
            url: descriptor.url.clone(),
        }
    }
}
impl TryFrom<DescriptorProxy> for ResourceDescriptor {
    type Error = Error;
    fn try_from(proxy: DescriptorProxy) -> Result<Self, Self::Error> {
        Ok(Self {
            model: proxy.model,
            id_type: proxy.id_type.parse::<IdType>().or_raise(|| ErrorKind::InvalidData("descriptor id type"))?,
            id_value: proxy.id_value,
            title: proxy.title,
            url: proxy.url,
            content: None,
        })
    }
}

/// Stored form of a lookup id map, keyed by the id type's string form.
#[derive(Serialize, Deserialize, Default)]
#[serde(transparent)]
pub(crate) struct LookupIdsProxy(BTreeMap<String, String>);
impl From<&BTreeMap<IdType, String>> for LookupIdsProxy {
    fn from(ids: &BTreeMap<IdType, String>) -> Self {
        Self(ids.iter().map(|(id_type, value)| (id_type.to_string(), value.clone())).collect())
    }
}
impl TryFrom<LookupIdsProxy> for BTreeMap<IdType, String> {
    type Error = Error;
    fn try_from(proxy: LookupIdsProxy) -> Result<Self, Self::Error> {
        proxy
            .0
            .into_iter()
            .map(|(id_type, value)| {
                let id_type = id_type.parse::<IdType>().or_raise(|| ErrorKind::InvalidData("lookup id type"))?;
                Ok((id_type, value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_uses_short_keys() {
        let descriptor = ResourceDescriptor::new(IdType::GoodreadsWork, "3634639").with_model(ItemModel::Work);
        let json = serde_json::to_string(&DescriptorProxy::from(&descriptor)).unwrap();
        assert_eq!(json, r#"{"m":"Work","t":"goodreads_work","v":"3634639"}"#);
        let back: DescriptorProxy = serde_json::from_str(&json).unwrap();
        assert_eq!(ResourceDescriptor::try_from(back).unwrap(), descriptor);
    }

    #[test]
    fn test_unknown_id_type_is_invalid_data() {
        let proxy: DescriptorProxy = serde_json::from_str(r#"{"t":"myspace","v":"1"}"#).unwrap();
        let err = ResourceDescriptor::try_from(proxy).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("descriptor id type")));
    }
}
