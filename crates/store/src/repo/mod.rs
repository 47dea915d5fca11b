//! Repository for Items, their external resources and their audit trail.
//!
//! Items and external resources are tightly coupled: a resource points at
//! the Item it was linked to, and merging or deleting an Item moves or
//! detaches its resources in the same transaction.

mod link;
mod merge;
mod sql;

pub use self::link::{LinkRequest, Linked};
pub use self::merge::{ItemRef, Resolution};
pub use self::sql::MAX_MERGE_DEPTH;

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::index::{IndexEvent, IndexSink, NoopIndex};
use crate::item::Item;
use crate::log::{LogAction, LogEntry};
use crate::models::LogRow;
use crate::resource::ExternalResource;
use catalog_sites::models::{IdType, normalize_pair};
use exn::ResultExt;
use serde_json::json;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Repository for managing Items and External Resources in the catalog database.
///
/// # Relationships
///
/// - Many external resources can point at the same Item (one per source)
/// - An Item can be merged into another; the merged Item stays behind as a
///   redirect
/// - Deleting an Item detaches its resources and children instead of
///   cascading
///
/// Every committed change is published to the configured [`IndexSink`].
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
    index: Arc<dyn IndexSink>,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self::new(db.pool().clone())
    }
}
impl Debug for Repository {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Repository").field("pool", &self.pool).finish_non_exhaustive()
    }
}
impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, index: Arc::new(NoopIndex) }
    }

    /// Publish change notifications to the given sink instead of discarding them.
    pub fn with_index(mut self, index: Arc<dyn IndexSink>) -> Self {
        self.index = index;
        self
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.or_raise(|| ErrorKind::Database)
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.or_raise(|| ErrorKind::Database)
    }

    fn publish(&self, events: impl IntoIterator<Item = IndexEvent>) {
        for event in events {
            self.index.publish(event);
        }
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// Get an Item by uuid, whatever its state.
    pub async fn get_item(&self, uuid: Uuid) -> Result<Option<Item>> {
        let mut conn = self.acquire().await?;
        sql::fetch_item(&mut conn, uuid).await
    }

    /// Get the live (non-deleted) Item holding a primary lookup id.
    ///
    /// The value is normalized first, so any accepted spelling of the id
    /// finds the Item.
    pub async fn find_by_primary_id(&self, id_type: IdType, raw: &str) -> Result<Option<Item>> {
        let (id_type, value) = normalize_pair(id_type, raw)
            .or_raise(|| ErrorKind::InvalidIdentifier { id_type, value: raw.to_string() })?;
        let mut conn = self.acquire().await?;
        sql::find_by_primary_id(&mut conn, id_type, &value).await
    }

    pub async fn get_resource(&self, id_type: IdType, id_value: &str) -> Result<Option<ExternalResource>> {
        let mut conn = self.acquire().await?;
        sql::fetch_resource(&mut conn, id_type, id_value).await
    }

    /// Every external resource currently linked to an Item.
    pub async fn list_resources(&self, uuid: Uuid) -> Result<Vec<ExternalResource>> {
        let mut conn = self.acquire().await?;
        sql::list_resources_for_item(&mut conn, uuid).await
    }

    /// Items whose parent link points at this Item.
    pub async fn list_children(&self, uuid: Uuid) -> Result<Vec<Item>> {
        let mut conn = self.acquire().await?;
        sql::list_children(&mut conn, uuid).await
    }

    /// The audit trail of an Item, oldest first.
    ///
    /// Entries survive a hard delete.
    pub async fn history(&self, uuid: Uuid) -> Result<Vec<LogEntry>> {
        let rows: Vec<LogRow> = sqlx::query_as(include_str!("../../queries/list_log.sql"))
            .bind(uuid.to_string())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(LogEntry::try_from).collect()
    }

    // =========================================================================
    // Insert/Update
    // =========================================================================

    /// Insert a new Item.
    ///
    /// Returns [`ErrorKind::IdentityConflict`] if another live Item already
    /// holds its primary lookup id.
    #[instrument(skip_all, fields(item = %item.uuid, model = %item.model()))]
    pub async fn insert_item(&self, item: &Item) -> Result<()> {
        let mut tx = self.begin().await?;
        sql::insert_item(&mut tx, item).await?;
        sql::append_log(&mut tx, item.uuid, LogAction::Create, json!({ "model": item.model() })).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        self.publish([IndexEvent::for_item(item)]);
        Ok(())
    }

    /// Save changes to an existing Item's payload, cover or parent link.
    ///
    /// Status, merge pointer, primary id and variant have their own
    /// operations and are ignored here; changing the variant is rejected.
    #[instrument(skip_all, fields(item = %item.uuid))]
    pub async fn update_item(&self, item: &Item) -> Result<Item> {
        let mut tx = self.begin().await?;
        let mut stored = sql::require_item(&mut tx, item.uuid).await?;
        if stored.is_deleted() {
            exn::bail!(ErrorKind::ItemDeleted(item.uuid));
        }
        if stored.model() != item.model() {
            exn::bail!(ErrorKind::InvalidData("item variant"));
        }
        stored.kind = item.kind.clone();
        stored.cover = item.cover.clone();
        stored.parent = item.parent;
        stored.touch();
        sql::update_item(&mut tx, &stored).await?;
        sql::append_log(&mut tx, stored.uuid, LogAction::Update, json!({})).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        self.publish([IndexEvent::for_item(&stored)]);
        Ok(stored)
    }

    /// Normalize and set an Item's primary lookup id, replacing the previous
    /// one.
    ///
    /// Returns [`ErrorKind::IdentityConflict`] if another live Item already
    /// holds the (normalized) id.
    #[instrument(skip(self))]
    pub async fn set_primary_id(&self, uuid: Uuid, id_type: IdType, raw: &str) -> Result<Item> {
        let mut tx = self.begin().await?;
        let mut item = sql::require_item(&mut tx, uuid).await?;
        if item.is_deleted() {
            exn::bail!(ErrorKind::ItemDeleted(uuid));
        }
        let previous = item.get_primary_id().map(|(id_type, value)| format!("{id_type}:{value}"));
        item.set_primary_id(id_type, raw)?;
        if let Some((id_type, value)) = item.get_primary_id()
            && let Some(holder) = sql::find_by_primary_id(&mut tx, id_type, value).await?
            && holder.uuid != uuid
        {
            exn::bail!(ErrorKind::IdentityConflict { id_type, value: value.to_string() });
        }
        item.touch();
        sql::update_item(&mut tx, &item).await?;
        let current = item.get_primary_id().map(|(id_type, value)| format!("{id_type}:{value}"));
        sql::append_log(&mut tx, uuid, LogAction::PrimaryId, json!({ "from": previous, "to": current })).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        self.publish([IndexEvent::for_item(&item)]);
        Ok(item)
    }
}
