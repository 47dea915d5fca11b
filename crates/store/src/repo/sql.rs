//! Connection-level queries shared by the repository operations.
//!
//! Everything here takes a plain connection so the same code runs inside
//! and outside a transaction. Never acquire from the pool while a
//! transaction is open: an in-memory database only has one connection.

use crate::error::{Error, ErrorKind, Result};
use crate::item::Item;
use crate::log::LogAction;
use crate::models::{ItemRow, ResourceRow};
use crate::resource::ExternalResource;
use catalog_sites::models::IdType;
use exn::ResultExt;
use serde_json::Value;
use sqlx::SqliteConnection;
use std::collections::HashSet;
use time::UtcDateTime;
use uuid::Uuid;

/// Longest merge chain that will be followed before giving up.
pub const MAX_MERGE_DEPTH: usize = 16;

/// A unique violation on the primary lookup id index means another live
/// Item already holds the key.
fn write_error(err: sqlx::Error, item: &Item) -> Error {
    if let sqlx::Error::Database(db_err) = &err
        && db_err.is_unique_violation()
        && let Some((id_type, value)) = item.get_primary_id()
    {
        return exn::Exn::from(err).raise(ErrorKind::IdentityConflict { id_type, value: value.to_string() });
    }
    exn::Exn::from(err).raise(ErrorKind::Database)
}

pub(super) async fn fetch_item(conn: &mut SqliteConnection, uuid: Uuid) -> Result<Option<Item>> {
    let row: Option<ItemRow> = sqlx::query_as(include_str!("../../queries/get_item.sql"))
        .bind(uuid.to_string())
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(Item::try_from).transpose()
}

pub(super) async fn require_item(conn: &mut SqliteConnection, uuid: Uuid) -> Result<Item> {
    match fetch_item(conn, uuid).await? {
        Some(item) => Ok(item),
        None => exn::bail!(ErrorKind::ItemNotFound(uuid)),
    }
}

pub(super) async fn insert_item(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
    let row = ItemRow::try_from(item)?;
    sqlx::query(include_str!("../../queries/insert_item.sql"))
        .bind(row.uuid)
        .bind(row.model)
        .bind(row.category)
        .bind(row.primary_lookup_id_type)
        .bind(row.primary_lookup_id_value)
        .bind(row.is_deleted)
        .bind(row.merged_to_item)
        .bind(row.parent_item)
        .bind(row.cover)
        .bind(row.payload)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|err| write_error(err, item))?;
    Ok(())
}

pub(super) async fn update_item(conn: &mut SqliteConnection, item: &Item) -> Result<()> {
    let row = ItemRow::try_from(item)?;
    let result = sqlx::query(include_str!("../../queries/update_item.sql"))
        .bind(row.uuid)
        .bind(row.model)
        .bind(row.category)
        .bind(row.primary_lookup_id_type)
        .bind(row.primary_lookup_id_value)
        .bind(row.is_deleted)
        .bind(row.merged_to_item)
        .bind(row.parent_item)
        .bind(row.cover)
        .bind(row.payload)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|err| write_error(err, item))?;
    if result.rows_affected() == 0 {
        exn::bail!(ErrorKind::ItemNotFound(item.uuid));
    }
    Ok(())
}

pub(super) async fn find_by_primary_id(conn: &mut SqliteConnection, id_type: IdType, value: &str) -> Result<Option<Item>> {
    let row: Option<ItemRow> = sqlx::query_as(include_str!("../../queries/find_by_primary_id.sql"))
        .bind(id_type.as_str())
        .bind(value)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(Item::try_from).transpose()
}

pub(super) async fn list_children(conn: &mut SqliteConnection, uuid: Uuid) -> Result<Vec<Item>> {
    let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../../queries/list_children.sql"))
        .bind(uuid.to_string())
        .fetch_all(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    rows.into_iter().map(Item::try_from).collect()
}

pub(super) async fn list_merged_into(conn: &mut SqliteConnection, uuid: Uuid) -> Result<Vec<Item>> {
    let rows: Vec<ItemRow> = sqlx::query_as(include_str!("../../queries/list_merged_into.sql"))
        .bind(uuid.to_string())
        .fetch_all(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    rows.into_iter().map(Item::try_from).collect()
}

pub(super) async fn hard_delete_item(conn: &mut SqliteConnection, uuid: Uuid) -> Result<bool> {
    let result = sqlx::query(include_str!("../../queries/hard_delete_item.sql"))
        .bind(uuid.to_string())
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(result.rows_affected() > 0)
}

/// Follow an Item's merge chain to the Item that finally superseded it.
///
/// Iterative and bounded: a chain longer than [`MAX_MERGE_DEPTH`] or one that
/// revisits an Item is a [`ErrorKind::MergeCycle`]. A dangling pointer (the
/// target was hard deleted) ends the chain at the last Item found.
pub(super) async fn terminal(conn: &mut SqliteConnection, item: Item) -> Result<Item> {
    let mut current = item;
    let mut visited = HashSet::from([current.uuid]);
    while let Some(next) = current.merged_to {
        if !visited.insert(next) || visited.len() > MAX_MERGE_DEPTH + 1 {
            tracing::error!(item = %current.uuid, next = %next, "Merge chain loops or is too deep");
            exn::bail!(ErrorKind::MergeCycle(current.uuid));
        }
        match fetch_item(conn, next).await? {
            Some(target) => current = target,
            None => {
                tracing::warn!(item = %current.uuid, missing = %next, "Merge target no longer exists");
                break;
            },
        }
    }
    Ok(current)
}

pub(super) async fn fetch_resource(
    conn: &mut SqliteConnection,
    id_type: IdType,
    id_value: &str,
) -> Result<Option<ExternalResource>> {
    let row: Option<ResourceRow> = sqlx::query_as(include_str!("../../queries/get_resource.sql"))
        .bind(id_type.as_str())
        .bind(id_value)
        .fetch_optional(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    row.map(ExternalResource::try_from).transpose()
}

pub(super) async fn list_resources_for_item(conn: &mut SqliteConnection, uuid: Uuid) -> Result<Vec<ExternalResource>> {
    let rows: Vec<ResourceRow> = sqlx::query_as(include_str!("../../queries/list_resources_for_item.sql"))
        .bind(uuid.to_string())
        .fetch_all(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    rows.into_iter().map(ExternalResource::try_from).collect()
}

pub(super) async fn upsert_resource(conn: &mut SqliteConnection, resource: &ExternalResource) -> Result<()> {
    let row = ResourceRow::try_from(resource)?;
    sqlx::query(include_str!("../../queries/upsert_resource.sql"))
        .bind(row.id_type)
        .bind(row.id_value)
        .bind(row.url)
        .bind(row.metadata)
        .bind(row.lookup_ids)
        .bind(row.cover)
        .bind(row.required_resources)
        .bind(row.related_resources)
        .bind(row.item_uuid)
        .bind(row.scraped_at)
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(())
}

/// Re-home every external resource of one Item (or orphan them with `None`).
pub(super) async fn move_resources(conn: &mut SqliteConnection, from: Uuid, to: Option<Uuid>) -> Result<u64> {
    let result = sqlx::query(include_str!("../../queries/move_resources.sql"))
        .bind(from.to_string())
        .bind(to.map(|uuid| uuid.to_string()))
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(result.rows_affected())
}

pub(super) async fn append_log(conn: &mut SqliteConnection, uuid: Uuid, action: LogAction, detail: Value) -> Result<()> {
    let detail = serde_json::to_string(&detail).or_raise(|| ErrorKind::InvalidData("log detail"))?;
    sqlx::query(include_str!("../../queries/append_log.sql"))
        .bind(uuid.to_string())
        .bind(action.as_str())
        .bind(detail)
        .bind(UtcDateTime::now().unix_timestamp())
        .execute(&mut *conn)
        .await
        .or_raise(|| ErrorKind::Database)?;
    Ok(())
}
