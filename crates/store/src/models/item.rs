use super::{parse_timestamp, parse_uuid};
use crate::error::{Error, ErrorKind};
use crate::item::{Item, ItemKind, ItemStatus};
use catalog_sites::models::{IdType, ItemModel};
use exn::ResultExt;
use serde_json::{Map, Value};

#[derive(sqlx::FromRow)]
#[cfg_attr(test, derive(Debug))]
pub(crate) struct ItemRow {
    pub(crate) uuid: String,
    pub(crate) model: String,
    pub(crate) category: String,
    pub(crate) primary_lookup_id_type: Option<String>,
    pub(crate) primary_lookup_id_value: Option<String>,
    pub(crate) is_deleted: bool,
    pub(crate) merged_to_item: Option<String>,
    pub(crate) parent_item: Option<String>,
    pub(crate) cover: Option<String>,
    pub(crate) payload: String,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}
impl TryFrom<&Item> for ItemRow {
    type Error = Error;
    fn try_from(item: &Item) -> Result<Self, Self::Error> {
        let (id_type, id_value) = match item.get_primary_id() {
            Some((id_type, value)) => (Some(id_type.to_string()), Some(value.to_string())),
            None => (None, None),
        };
        Ok(Self {
            uuid: item.uuid.to_string(),
            model: item.model().to_string(),
            category: item.category().to_string(),
            primary_lookup_id_type: id_type,
            primary_lookup_id_value: id_value,
            is_deleted: item.is_deleted(),
            merged_to_item: item.merged_to.map(|uuid| uuid.to_string()),
            parent_item: item.parent.map(|uuid| uuid.to_string()),
            cover: item.cover.clone(),
            payload: serde_json::to_string(&item.kind.to_map()).or_raise(|| ErrorKind::InvalidData("payload"))?,
            created_at: item.created_at.unix_timestamp(),
            updated_at: item.updated_at.unix_timestamp(),
        })
    }
}
impl TryFrom<ItemRow> for Item {
    type Error = Error;
    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        let model = row.model.parse::<ItemModel>().or_raise(|| ErrorKind::InvalidData("model"))?;
        let payload: Map<String, Value> =
            serde_json::from_str(&row.payload).or_raise(|| ErrorKind::InvalidData("payload"))?;
        let primary_id = match (row.primary_lookup_id_type, row.primary_lookup_id_value) {
            (Some(id_type), Some(value)) => Some((
                id_type.parse::<IdType>().or_raise(|| ErrorKind::InvalidData("primary lookup id type"))?,
                value,
            )),
            (None, None) => None,
            _ => exn::bail!(ErrorKind::InvalidData("primary lookup id")),
        };
        Ok(Item::from_parts(
            parse_uuid(&row.uuid, "uuid")?,
            ItemKind::from_map(model, &payload),
            primary_id,
            if row.is_deleted { ItemStatus::Deleted } else { ItemStatus::Active },
            row.merged_to_item.as_deref().map(|raw| parse_uuid(raw, "merged to item")).transpose()?,
            row.parent_item.as_deref().map(|raw| parse_uuid(raw, "parent item")).transpose()?,
            row.cover,
            parse_timestamp(row.created_at, "creation date")?,
            parse_timestamp(row.updated_at, "update date")?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> ItemRow {
        ItemRow {
            uuid: "7d0b9e1c-8f4a-4c43-9a53-1b7f4b1f2a10".to_string(),
            model: "Edition".to_string(),
            category: "book".to_string(),
            primary_lookup_id_type: Some("isbn".to_string()),
            primary_lookup_id_value: Some("9780553283686".to_string()),
            is_deleted: false,
            merged_to_item: None,
            parent_item: Some("0b6f9c55-5f8e-4b0a-8a39-2c6f6a1d9e02".to_string()),
            cover: None,
            payload: r#"{"title":"Hyperion","pages":482}"#.to_string(),
            created_at: 1_767_225_600,
            updated_at: 1_767_225_600,
        }
    }

    #[test]
    fn test_row_to_model() {
        let item = Item::try_from(row()).unwrap();
        assert_eq!(item.model(), ItemModel::Edition);
        assert_eq!(item.title(), "Hyperion");
        assert_eq!(item.get_primary_id(), Some((IdType::Isbn, "9780553283686")));
        assert!(item.parent.is_some());
        assert_eq!(item.status, ItemStatus::Active);
    }

    #[test]
    fn test_model_to_row() {
        let mut item = Item::new(ItemKind::empty(ItemModel::TVShow));
        item.set_primary_id(IdType::Imdb, "tt0098936").unwrap();
        let row = ItemRow::try_from(&item).unwrap();
        assert_eq!(row.model, "TVShow");
        assert_eq!(row.category, "tv");
        assert_eq!(row.primary_lookup_id_type.as_deref(), Some("imdb"));
        // Converting to a Unix timestamp (measured in seconds) inherently strips the nanoseconds component.
        let back = Item::try_from(row).unwrap();
        assert_eq!(back.created_at, item.created_at.replace_nanosecond(0).unwrap());
        assert_eq!(back.kind, item.kind);
    }

    #[test]
    fn test_half_primary_id_is_invalid() {
        let mut row = row();
        row.primary_lookup_id_value = None;
        let err = Item::try_from(row).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("primary lookup id")));
    }
}
