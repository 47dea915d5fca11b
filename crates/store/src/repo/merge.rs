//! Merge, soft delete, recast and merge-aware resolution.
//!
//! An Item moves through these states:
//!
//! - `Active → Deleted` ([`Repository::delete`])
//! - `Active → Merged(T)` ([`Repository::merge_to`])
//! - `Merged(T1) → Merged(T2)` (re-merge; chains are flattened)
//! - `Merged → Active` (`merge_to(uuid, None)`)
//!
//! `Deleted → Merged` is forbidden, and a deleted Item can never become a
//! merge target.

use super::{Repository, sql};
use crate::error::{ErrorKind, Result};
use crate::index::IndexEvent;
use crate::item::{Item, ItemStatus};
use crate::log::LogAction;
use catalog_sites::models::{IdType, ItemModel, normalize_pair};
use exn::ResultExt;
use serde_json::json;
use sqlx::SqliteConnection;
use tracing::instrument;
use uuid::Uuid;

/// Ways to refer to an Item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemRef {
    Uuid(Uuid),
    /// The Item an external resource is linked to.
    Resource { id_type: IdType, id_value: String },
    /// The live Item holding a primary lookup id (normalized before lookup).
    PrimaryId { id_type: IdType, value: String },
}

/// Outcome of resolving an [`ItemRef`].
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Found(Item),
    /// The referenced Item was merged away. `to` is the end of the merge
    /// chain; callers holding `from.uuid` should update their reference.
    Redirect { from: Item, to: Item },
    /// The Item (or the end of its merge chain) was soft deleted. The row
    /// still exists, which tells it apart from [`Resolution::NotFound`].
    Deleted(Item),
    NotFound,
}
impl Resolution {
    /// The Item a normal caller should see, if any.
    pub fn into_live(self) -> Option<Item> {
        match self {
            Self::Found(item) | Self::Redirect { to: item, .. } => Some(item),
            Self::Deleted(_) | Self::NotFound => None,
        }
    }
}

/// Switch an Item to another variant inside an open transaction, fixing up
/// its relations. The Item itself is not written; the caller saves it.
///
/// Returns `false` if the Item already was of that variant.
pub(super) async fn recast_in(
    conn: &mut SqliteConnection,
    item: &mut Item,
    model: ItemModel,
    events: &mut Vec<IndexEvent>,
) -> Result<bool> {
    let from = item.model();
    let previous_id = item.get_primary_id().map(|(id_type, value)| format!("{id_type}:{value}"));
    if !item.recast(model) {
        return Ok(false);
    }
    if let Some(parent) = item.parent {
        let keep = match sql::fetch_item(conn, parent).await? {
            Some(parent) => model.parent_model() == Some(parent.model()),
            None => false,
        };
        if !keep {
            item.parent = None;
        }
    }
    for mut child in sql::list_children(conn, item.uuid).await? {
        if child.model().parent_model() != Some(model) {
            child.parent = None;
            child.touch();
            sql::update_item(conn, &child).await?;
            events.push(IndexEvent::for_item(&child));
        }
    }
    item.touch();
    let kept_id = item.get_primary_id().map(|(id_type, value)| format!("{id_type}:{value}"));
    let detail = json!({ "from": from, "to": model, "dropped_primary_id": previous_id.filter(|_| kept_id.is_none()) });
    sql::append_log(conn, item.uuid, LogAction::Recast, detail).await?;
    Ok(true)
}

impl Repository {
    /// Resolve a reference to an Item.
    ///
    /// With `resolve_merge`, a merged Item resolves straight to the end of
    /// its merge chain ([`Resolution::Found`]); without it the caller gets a
    /// [`Resolution::Redirect`] so it can update its own stored reference.
    ///
    /// Merge chains are followed iteratively and at most
    /// [`MAX_MERGE_DEPTH`](super::MAX_MERGE_DEPTH) deep; a loop is reported
    /// as [`ErrorKind::MergeCycle`].
    #[instrument(skip(self))]
    pub async fn resolve(&self, reference: &ItemRef, resolve_merge: bool) -> Result<Resolution> {
        let mut conn = self.acquire().await?;
        let item = match reference {
            ItemRef::Uuid(uuid) => sql::fetch_item(&mut conn, *uuid).await?,
            ItemRef::Resource { id_type, id_value } => {
                match sql::fetch_resource(&mut conn, *id_type, id_value).await?.and_then(|r| r.item) {
                    Some(uuid) => sql::fetch_item(&mut conn, uuid).await?,
                    None => None,
                }
            },
            ItemRef::PrimaryId { id_type, value } => match normalize_pair(*id_type, value) {
                Ok((id_type, value)) => sql::find_by_primary_id(&mut conn, id_type, &value).await?,
                Err(_) => None,
            },
        };
        let Some(item) = item else {
            return Ok(Resolution::NotFound);
        };
        if item.is_deleted() {
            return Ok(Resolution::Deleted(item));
        }
        if !item.is_merged() {
            return Ok(Resolution::Found(item));
        }
        let target = sql::terminal(&mut conn, item.clone()).await?;
        Ok(if target.is_deleted() {
            Resolution::Deleted(target)
        } else if resolve_merge || target.uuid == item.uuid {
            Resolution::Found(target)
        } else {
            Resolution::Redirect { from: item, to: target }
        })
    }

    /// Merge `source` into `target`, or unmerge it with `None`.
    ///
    /// The target is first resolved to the end of its own merge chain, and
    /// Items previously merged into `source` are repointed there too, so
    /// chains never grow. The source's external resources and children move
    /// to the target, list fields are unioned into the target and the
    /// target adopts the source's cover if it has none.
    ///
    /// Rejected when merging an Item into itself (directly or through the
    /// target's chain), when either side is deleted, or across categories.
    /// Returns the updated source.
    #[instrument(skip(self))]
    pub async fn merge_to(&self, source: Uuid, target: Option<Uuid>) -> Result<Item> {
        let mut tx = self.begin().await?;
        let mut source = sql::require_item(&mut tx, source).await?;
        let mut events = Vec::new();

        let Some(target) = target else {
            let Some(previous) = source.merged_to else {
                return Ok(source);
            };
            if source.is_deleted() {
                exn::bail!(ErrorKind::ItemDeleted(source.uuid));
            }
            source.merged_to = None;
            source.touch();
            sql::update_item(&mut tx, &source).await?;
            sql::append_log(&mut tx, source.uuid, LogAction::Unmerge, json!({ "from": previous })).await?;
            tx.commit().await.or_raise(|| ErrorKind::Database)?;
            tracing::info!(item = %source.uuid, %previous, "Unmerged item");
            self.publish([IndexEvent::for_item(&source)]);
            return Ok(source);
        };

        if target == source.uuid {
            exn::bail!(ErrorKind::MergeRejected("cannot merge an item into itself"));
        }
        if source.is_deleted() {
            exn::bail!(ErrorKind::MergeRejected("source item is deleted"));
        }
        let target = sql::require_item(&mut tx, target).await?;
        if target.is_deleted() {
            exn::bail!(ErrorKind::MergeRejected("target item is deleted"));
        }
        let mut target = sql::terminal(&mut tx, target).await?;
        if target.is_deleted() {
            exn::bail!(ErrorKind::MergeRejected("target item is deleted"));
        }
        if target.uuid == source.uuid {
            exn::bail!(ErrorKind::MergeRejected("target is already merged into the source"));
        }
        if target.category() != source.category() {
            exn::bail!(ErrorKind::MergeRejected("items belong to different categories"));
        }
        if source.merged_to == Some(target.uuid) {
            return Ok(source);
        }

        for mut merged in sql::list_merged_into(&mut tx, source.uuid).await? {
            merged.merged_to = Some(target.uuid);
            merged.touch();
            sql::update_item(&mut tx, &merged).await?;
            let detail = json!({ "to": target.uuid, "via": source.uuid });
            sql::append_log(&mut tx, merged.uuid, LogAction::Merge, detail).await?;
        }
        let previous = source.merged_to.replace(target.uuid);
        source.touch();
        sql::update_item(&mut tx, &source).await?;
        sql::append_log(&mut tx, source.uuid, LogAction::Merge, json!({ "to": target.uuid, "previous": previous }))
            .await?;

        let resources = sql::move_resources(&mut tx, source.uuid, Some(target.uuid)).await?;
        for mut child in sql::list_children(&mut tx, source.uuid).await? {
            child.parent = Some(target.uuid);
            child.touch();
            sql::update_item(&mut tx, &child).await?;
            events.push(IndexEvent::for_item(&child));
        }
        target.kind.absorb(&source.kind);
        if target.cover.is_none() {
            target.cover = source.cover.clone();
        }
        target.touch();
        sql::update_item(&mut tx, &target).await?;
        sql::append_log(&mut tx, target.uuid, LogAction::Merge, json!({ "from": source.uuid, "resources": resources }))
            .await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        tracing::info!(source = %source.uuid, target = %target.uuid, resources, "Merged item");
        events.push(IndexEvent::Remove(source.uuid));
        events.push(IndexEvent::for_item(&target));
        self.publish(events);
        Ok(source)
    }

    /// Soft delete an Item.
    ///
    /// The row stays (resolving its uuid reports [`Resolution::Deleted`]) but
    /// the Item gives up its primary lookup id, its external resources and
    /// its parent link, and its children are detached. Deleting twice is a
    /// no-op.
    #[instrument(skip(self))]
    pub async fn delete(&self, uuid: Uuid) -> Result<Item> {
        let mut tx = self.begin().await?;
        let mut item = sql::require_item(&mut tx, uuid).await?;
        if item.is_deleted() {
            return Ok(item);
        }
        let mut events = Vec::new();
        let primary_id = item.get_primary_id().map(|(id_type, value)| format!("{id_type}:{value}"));
        item.clear_primary_id();
        item.status = ItemStatus::Deleted;
        item.parent = None;
        item.touch();
        sql::update_item(&mut tx, &item).await?;
        let resources = sql::move_resources(&mut tx, uuid, None).await?;
        let mut children = 0;
        for mut child in sql::list_children(&mut tx, uuid).await? {
            child.parent = None;
            child.touch();
            sql::update_item(&mut tx, &child).await?;
            events.push(IndexEvent::for_item(&child));
            children += 1;
        }
        let detail = json!({ "primary_id": primary_id, "resources": resources, "children": children });
        sql::append_log(&mut tx, uuid, LogAction::Delete, detail).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        tracing::info!(item = %uuid, resources, children, "Deleted item");
        events.push(IndexEvent::Remove(uuid));
        self.publish(events);
        Ok(item)
    }

    /// Remove an Item row for good.
    ///
    /// Merge pointers, parent links and resource links that referenced it are
    /// cleared by the database. Items that were merged into it therefore
    /// become live again.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, uuid: Uuid) -> Result<()> {
        let mut tx = self.begin().await?;
        let merged = sql::list_merged_into(&mut tx, uuid).await?;
        if !sql::hard_delete_item(&mut tx, uuid).await? {
            exn::bail!(ErrorKind::ItemNotFound(uuid));
        }
        sql::append_log(&mut tx, uuid, LogAction::HardDelete, json!({ "unmerged": merged.len() })).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;

        tracing::warn!(item = %uuid, "Hard deleted item");
        let mut events = vec![IndexEvent::Remove(uuid)];
        for mut item in merged {
            item.merged_to = None;
            events.push(IndexEvent::for_item(&item));
        }
        self.publish(events);
        Ok(())
    }

    /// Change an Item's variant, keeping its uuid.
    ///
    /// Fields the new variant doesn't declare are dropped, the primary id
    /// is kept only if the new variant supports its type, a parent link the
    /// new variant can't hold is dropped and children that can no longer
    /// point at it are detached.
    #[instrument(skip(self))]
    pub async fn recast_to(&self, uuid: Uuid, model: ItemModel) -> Result<Item> {
        let mut tx = self.begin().await?;
        let mut item = sql::require_item(&mut tx, uuid).await?;
        if item.is_deleted() {
            exn::bail!(ErrorKind::ItemDeleted(uuid));
        }
        let mut events = Vec::new();
        if !recast_in(&mut tx, &mut item, model, &mut events).await? {
            return Ok(item);
        }
        sql::update_item(&mut tx, &item).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        tracing::info!(item = %uuid, %model, "Recast item");
        events.push(IndexEvent::for_item(&item));
        self.publish(events);
        Ok(item)
    }
}
