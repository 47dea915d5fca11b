//! Turning an external resource into a live Item.
//!
//! The linker is the memoized entry point of the catalog: the external
//! resource row is the memo, so a resource that was linked before is served
//! from the database without scraping. Otherwise the resource is scraped,
//! everything it requires is linked first, and the result is matched (or
//! created) in a single store transaction.

pub mod error;

use self::error::{ErrorKind, Result};
use crate::Context;
use catalog_sites::Site;
use catalog_sites::error::ErrorKind as SiteErrorKind;
use catalog_sites::models::{IdType, ItemModel, ResourceContent, ResourceDescriptor};
use catalog_store::error::ErrorKind as StoreErrorKind;
use catalog_store::item::Item;
use catalog_store::{ExternalResource, ItemRef, LinkRequest, Linked};
use exn::ResultExt;
use futures::future::{BoxFuture, FutureExt};
use tracing::instrument;

/// A resource that is linked to a live Item.
#[derive(Debug, Clone, PartialEq)]
pub struct Ready {
    pub item: Item,
    /// A new Item was created for the resource.
    pub created: bool,
    /// The resource was scraped (as opposed to served from the catalog).
    pub scraped: bool,
    /// Associated resources worth fetching next, capped by configuration.
    /// Only filled when the resource was scraped.
    pub related: Vec<ResourceDescriptor>,
}

/// One resource to link, with whatever is already known about it.
struct Target {
    site: Site,
    /// The variant the referencing resource expects this one to become.
    expected_model: Option<ItemModel>,
    /// Content handed over by the referencing resource, which saves a scrape.
    content: Option<ResourceContent>,
}

/// Link the resource behind `site` to an Item, scraping it if needed.
///
/// Without `force`, a resource that already points at a live Item (after
/// following merges) is returned as is. With `force`, the resource is
/// scraped again and its fresh values overwrite the Item it is linked to.
#[instrument(skip_all, fields(site = site.adapter().name(), id_type = %site.id_type(), id_value = site.id_value(), force))]
pub async fn get_resource_ready(ctx: &Context, site: &Site, force: bool) -> Result<Ready> {
    let target = Target { site: site.clone(), expected_model: None, content: None };
    link_target(ctx, target, force, Vec::new()).await
}

/// Recursive worker behind [`get_resource_ready`]. `chain` holds the
/// resources currently being linked above this one.
fn link_target<'a>(ctx: &'a Context, target: Target, force: bool, chain: Vec<(IdType, String)>) -> BoxFuture<'a, Result<Ready>> {
    link_target_inner(ctx, target, force, chain).boxed()
}

async fn link_target_inner(ctx: &Context, target: Target, force: bool, mut chain: Vec<(IdType, String)>) -> Result<Ready> {
    let Target { site, expected_model, content } = target;
    let key = (site.id_type(), site.id_value().to_string());
    if chain.contains(&key) {
        exn::bail!(ErrorKind::DependencyCycle { id_type: key.0, id_value: key.1 });
    }
    if chain.len() >= ctx.link.max_depth {
        exn::bail!(ErrorKind::DepthExceeded(ctx.link.max_depth));
    }

    if !force && let Some(item) = linked_item(ctx, &site).await? {
        tracing::debug!(item = %item.uuid, "Resource already linked");
        return Ok(Ready { item, created: false, scraped: false, related: Vec::new() });
    }

    let content = match content {
        Some(content) => content,
        None => scrape(ctx, &site).await?,
    };
    let (model, explicit_model) = match content.preferred_model() {
        Some(model) => (model, true),
        None => (expected_model.unwrap_or_else(|| site.default_model()), false),
    };

    chain.push(key);
    let required = link_required(ctx, &content.required_resources, &chain).await?;
    let parent = model
        .parent_model()
        .and_then(|parent_model| required.iter().find(|item| item.model() == parent_model))
        .map(|item| item.uuid);

    let mut resource = ExternalResource::new(site.id_type(), site.id_value(), site.url(), &content);
    if let (Some(bytes), Some(covers)) = (&content.cover_image, &ctx.covers) {
        let path = covers
            .save(bytes, content.cover_image_extension.as_deref())
            .await
            .or_raise(|| ErrorKind::Storage)?;
        resource.cover = Some(path);
    }

    let request = LinkRequest { resource, model, explicit_model, parent, refresh: force };
    let Linked { item, created } = link_locked(ctx, request).await?;
    tracing::info!(item = %item.uuid, model = %item.model(), created, "Linked resource");

    let mut related = content.related_resources;
    related.truncate(ctx.link.max_related);
    Ok(Ready { item, created, scraped: true, related })
}

/// The live Item an already stored resource points at, following merges.
async fn linked_item(ctx: &Context, site: &Site) -> Result<Option<Item>> {
    let existing = ctx
        .repository
        .get_resource(site.id_type(), site.id_value())
        .await
        .map_err(ErrorKind::store)?;
    if existing.and_then(|resource| resource.item).is_none() {
        return Ok(None);
    }
    let reference = ItemRef::Resource { id_type: site.id_type(), id_value: site.id_value().to_string() };
    let resolution = ctx.repository.resolve(&reference, true).await.map_err(ErrorKind::store)?;
    Ok(resolution.into_live())
}

async fn scrape(ctx: &Context, site: &Site) -> Result<ResourceContent> {
    let result = match tokio::time::timeout(ctx.link.scrape_timeout(), site.scrape()).await {
        Ok(result) => result,
        Err(_) => Err(exn::Exn::from(SiteErrorKind::Timeout)),
    };
    result.map_err(|err| {
        if err.is_expected() {
            tracing::warn!(url = site.url(), error = %err, "Scrape returned unusable content");
        } else {
            tracing::error!(url = site.url(), error = %err, "Scrape failed");
        }
        ErrorKind::scrape(err)
    })
}

/// Link every required resource, in order. Each one must end up as a live
/// Item; anything else fails the dependent link.
async fn link_required(ctx: &Context, descriptors: &[ResourceDescriptor], chain: &[(IdType, String)]) -> Result<Vec<Item>> {
    let mut items = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let Some(site) = ctx.registry.get_site_by_id_type(descriptor.id_type, descriptor.id_value.clone()) else {
            exn::bail!(ErrorKind::UnsupportedResource {
                id_type: descriptor.id_type,
                id_value: descriptor.id_value.clone(),
            });
        };
        let target = Target {
            site,
            expected_model: descriptor.model,
            content: descriptor.content.as_deref().cloned(),
        };
        match link_target(ctx, target, false, chain.to_vec()).await {
            Ok(ready) => items.push(ready.item),
            // Structural failures describe the whole chain, not this resource.
            Err(err) if matches!(&*err, ErrorKind::DependencyCycle { .. } | ErrorKind::DepthExceeded(_)) => {
                return Err(err);
            },
            Err(err) => {
                return Err(err.raise(ErrorKind::RequiredResource {
                    id_type: descriptor.id_type,
                    id_value: descriptor.id_value.clone(),
                }));
            },
        }
    }
    Ok(items)
}

/// Run the store link under the advisory locks of every candidate id. A
/// unique-index conflict means another writer got there first; matching
/// again finds its Item.
async fn link_locked(ctx: &Context, request: LinkRequest) -> Result<Linked> {
    let keys = request.resource.candidate_ids().into_iter().map(|(id_type, value)| format!("{id_type}:{value}"));
    let _guard = ctx.locks.lock_all(keys).await;
    match ctx.repository.link(request.clone()).await {
        Ok(linked) => Ok(linked),
        Err(err) if matches!(&*err, StoreErrorKind::IdentityConflict { .. }) && !request.explicit_model => {
            tracing::debug!(error = %err, "Identity conflict, matching again");
            ctx.repository.link(request).await.map_err(ErrorKind::store)
        },
        Err(err) => Err(ErrorKind::store(err)),
    }
}
