//! Looking up Items by the URLs users paste.

use crate::Context;
use crate::error::{ErrorKind, Result};
use catalog_store::{ItemRef, Resolution};
use exn::ResultExt;
use tracing::instrument;

/// Resolve a URL to the Item its resource is linked to, without fetching.
///
/// The URL is canonicalized by the site registry first, following at most
/// one redirect. A URL no site recognises, or one that was never linked,
/// resolves to [`Resolution::NotFound`].
#[instrument(skip(ctx))]
pub async fn get_by_url(ctx: &Context, url: &str, resolve_merge: bool) -> Result<Resolution> {
    let Some(site) = ctx.registry.get_site_by_url(url, true).await else {
        tracing::debug!("No site recognises the URL");
        return Ok(Resolution::NotFound);
    };
    let reference = ItemRef::Resource { id_type: site.id_type(), id_value: site.id_value().to_string() };
    ctx.repository.resolve(&reference, resolve_merge).await.or_raise(|| ErrorKind::Store)
}
