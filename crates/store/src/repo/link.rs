//! Transactional find-or-create of the Item behind an external resource.

use super::{Repository, merge, sql};
use crate::error::{ErrorKind, Result};
use crate::index::IndexEvent;
use crate::item::{Item, ItemKind};
use crate::log::LogAction;
use crate::resource::ExternalResource;
use catalog_sites::models::{IDEAL_ID_TYPES, IdType, ItemModel};
use exn::ResultExt;
use serde_json::json;
use std::collections::HashSet;
use tracing::instrument;
use uuid::Uuid;

/// Everything needed to attach one freshly scraped resource to an Item.
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub resource: ExternalResource,
    /// Variant a newly created Item gets.
    pub model: ItemModel,
    /// The variant was asked for by the scraped metadata rather than being
    /// the adapter's default. Only then may an Item of another category be
    /// recast to it.
    pub explicit_model: bool,
    /// Parent link for the Item, from an already resolved required resource.
    pub parent: Option<Uuid>,
    /// Forced re-scrape: if the resource was already linked to the Item, its
    /// new values overwrite the Item's.
    pub refresh: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Linked {
    pub item: Item,
    pub created: bool,
}

/// Matchable ids in the order they should be tried: widely shared types
/// first, then the variant's own preference. Types the variant can't hold as
/// a primary id are dropped.
fn rank_candidates(candidates: Vec<(IdType, String)>, model: ItemModel) -> Vec<(IdType, String)> {
    let order: Vec<IdType> = IDEAL_ID_TYPES.iter().chain(model.lookup_id_types()).copied().collect();
    let mut ranked: Vec<(IdType, String)> = candidates.into_iter().filter(|(t, _)| model.supports_id_type(*t)).collect();
    ranked.sort_by_key(|(t, _)| order.iter().position(|o| o == t).unwrap_or(usize::MAX));
    ranked
}

impl Repository {
    /// Find the Item an external resource describes, or create it, and save
    /// the resource pointing at it. All in one transaction.
    ///
    /// Matching tries every normalized lookup id of the resource against the
    /// primary ids of live Items of the same category, best id first. A
    /// matched Item only has its empty fields filled (first writer wins),
    /// unless this is a forced refresh of a resource already linked to it.
    ///
    /// Returns [`ErrorKind::IdentityConflict`] when an id is held by an Item
    /// of another category and the variant wasn't requested explicitly, or
    /// when a concurrent writer created the same key first. Re-running the
    /// link in that case will find the other Item.
    #[instrument(skip_all, fields(id_type = %request.resource.id_type, id_value = %request.resource.id_value, model = %request.model))]
    pub async fn link(&self, request: LinkRequest) -> Result<Linked> {
        let LinkRequest { mut resource, model, explicit_model, parent, refresh } = request;
        let category = model.category();
        let candidates = rank_candidates(resource.candidate_ids(), model);
        let mut events = Vec::new();
        let mut tx = self.begin().await?;

        let previous = match sql::fetch_resource(&mut tx, resource.id_type, &resource.id_value).await? {
            Some(existing) => existing.item,
            None => None,
        };

        let mut held = HashSet::new();
        let mut matched = None;
        for (id_type, value) in &candidates {
            let Some(holder) = sql::find_by_primary_id(&mut tx, *id_type, value).await? else {
                continue;
            };
            held.insert((*id_type, value.clone()));
            let mut holder = sql::terminal(&mut tx, holder).await?;
            if holder.is_deleted() {
                continue;
            }
            if holder.category() != category {
                if !explicit_model {
                    tracing::warn!(
                        holder = %holder.uuid,
                        holder_model = %holder.model(),
                        %id_type,
                        value,
                        "Lookup id already belongs to an item of another category"
                    );
                    exn::bail!(ErrorKind::IdentityConflict { id_type: *id_type, value: value.clone() });
                }
                tracing::info!(item = %holder.uuid, from = %holder.model(), to = %model, "Recasting item to requested variant");
                merge::recast_in(&mut tx, &mut holder, model, &mut events).await?;
            }
            matched = Some(holder);
            break;
        }
        if matched.is_none()
            && let Some(uuid) = previous
            && let Some(item) = sql::fetch_item(&mut tx, uuid).await?
        {
            let item = sql::terminal(&mut tx, item).await?;
            if !item.is_deleted() {
                matched = Some(item);
            }
        }
        let (item, created) = match matched {
            Some(mut item) => {
                let same_source = previous == Some(item.uuid);
                if refresh && same_source {
                    item.kind.overwrite(&resource.metadata);
                } else {
                    item.kind.fill_missing(&resource.metadata);
                }
                if item.get_primary_id().is_none() {
                    // The matched Item may be of another variant than the one
                    // asked for (found through the resource after a recast).
                    for (id_type, value) in rank_candidates(resource.candidate_ids(), item.model()) {
                        if held.contains(&(id_type, value.clone()))
                            || sql::find_by_primary_id(&mut tx, id_type, &value).await?.is_some()
                        {
                            continue;
                        }
                        item.set_primary_id(id_type, &value)?;
                        break;
                    }
                }
                if item.parent.is_none() && item.model().parent_model().is_some() {
                    item.parent = parent;
                }
                if item.cover.is_none() {
                    item.cover = resource.cover.clone();
                }
                item.touch();
                sql::update_item(&mut tx, &item).await?;
                if !same_source {
                    let detail = json!({ "id_type": resource.id_type.as_str(), "id_value": resource.id_value });
                    sql::append_log(&mut tx, item.uuid, LogAction::Link, detail).await?;
                }
                (item, false)
            },
            None => {
                let mut item = Item::new(ItemKind::from_map(model, &resource.metadata));
                if let Some((id_type, value)) = candidates.iter().find(|pair| !held.contains(*pair)) {
                    item.set_primary_id(*id_type, value)?;
                }
                if model.parent_model().is_some() {
                    item.parent = parent;
                }
                item.cover = resource.cover.clone();
                sql::insert_item(&mut tx, &item).await?;
                let detail = json!({
                    "model": model,
                    "id_type": resource.id_type.as_str(),
                    "id_value": resource.id_value,
                });
                sql::append_log(&mut tx, item.uuid, LogAction::Create, detail).await?;
                tracing::info!(item = %item.uuid, %model, title = item.title(), "Created item");
                (item, true)
            },
        };

        resource.item = Some(item.uuid);
        sql::upsert_resource(&mut tx, &resource).await?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        events.push(IndexEvent::for_item(&item));
        self.publish(events);
        Ok(Linked { item, created })
    }
}
