//! The canonical catalog record.

mod kind;

pub use self::kind::{
    Album, Edition, Game, ItemKind, Movie, Performance, PerformanceProduction, Podcast, PodcastEpisode, TVEpisode,
    TVSeason, TVShow, Work,
};
use crate::error::{ErrorKind, Result};
use catalog_sites::models::{IdType, ItemCategory, ItemModel, normalize_pair};
use exn::ResultExt;
use time::UtcDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    Active,
    Deleted,
}

/// A canonical record for a work, or part of one.
///
/// The uuid never changes, not even when the Item is recast to another
/// variant or merged away.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub uuid: Uuid,
    pub kind: ItemKind,
    primary_id: Option<(IdType, String)>,
    pub status: ItemStatus,
    /// Set when this Item has been superseded by another one.
    pub merged_to: Option<Uuid>,
    pub parent: Option<Uuid>,
    /// Storage path of the cover image.
    pub cover: Option<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

impl Item {
    pub fn new(kind: ItemKind) -> Self {
        let now = UtcDateTime::now();
        Self {
            uuid: Uuid::new_v4(),
            kind,
            primary_id: None,
            status: ItemStatus::Active,
            merged_to: None,
            parent: None,
            cover: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild an Item from stored columns, without re-validating the
    /// primary id.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        uuid: Uuid,
        kind: ItemKind,
        primary_id: Option<(IdType, String)>,
        status: ItemStatus,
        merged_to: Option<Uuid>,
        parent: Option<Uuid>,
        cover: Option<String>,
        created_at: UtcDateTime,
        updated_at: UtcDateTime,
    ) -> Self {
        Self { uuid, kind, primary_id, status, merged_to, parent, cover, created_at, updated_at }
    }

    pub fn model(&self) -> ItemModel {
        self.kind.model()
    }

    pub fn category(&self) -> ItemCategory {
        self.model().category()
    }

    pub fn title(&self) -> &str {
        self.kind.title()
    }

    pub fn get_primary_id(&self) -> Option<(IdType, &str)> {
        self.primary_id.as_ref().map(|(id_type, value)| (*id_type, value.as_str()))
    }

    /// Normalize and set the primary lookup id, replacing any previous one.
    ///
    /// Checks the value is well formed and that this variant supports the
    /// (normalized) type. Catalog-wide uniqueness is only checked when the
    /// Item is saved; see [`Repository::set_primary_id`](crate::Repository::set_primary_id).
    pub fn set_primary_id(&mut self, id_type: IdType, raw: &str) -> Result<()> {
        let invalid = || ErrorKind::InvalidIdentifier { id_type, value: raw.to_string() };
        let (id_type, value) = normalize_pair(id_type, raw).or_raise(invalid)?;
        if !self.model().supports_id_type(id_type) {
            exn::bail!(invalid());
        }
        self.primary_id = Some((id_type, value));
        Ok(())
    }

    pub fn clear_primary_id(&mut self) {
        self.primary_id = None;
    }

    pub fn is_deleted(&self) -> bool {
        self.status == ItemStatus::Deleted
    }

    pub fn is_merged(&self) -> bool {
        self.merged_to.is_some()
    }

    /// Active and not superseded by another Item.
    pub fn is_live(&self) -> bool {
        !self.is_deleted() && !self.is_merged()
    }

    /// Switch to another variant, keeping the identity.
    ///
    /// The primary id survives only if the new variant supports its type.
    /// Returns `false` if the Item already is of that variant.
    pub fn recast(&mut self, model: ItemModel) -> bool {
        if self.model() == model {
            return false;
        }
        self.kind = self.kind.recast(model);
        if let Some((id_type, _)) = &self.primary_id
            && !model.supports_id_type(*id_type)
        {
            self.primary_id = None;
        }
        if model.parent_model().is_none() {
            self.parent = None;
        }
        true
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = UtcDateTime::now();
    }
}
