//! The catalog's moving parts, wired together.
//!
//! - [`link`] turns a [`Site`](catalog_sites::Site) into a live Item,
//!   scraping and linking its required resources first.
//! - [`fetch`] runs links as deduplicated background jobs and answers
//!   "is this URL ready yet" for request handlers.
//! - [`resolve`] looks URLs up without fetching anything.
//!
//! All of them work off a shared [`Context`].

mod context;
pub mod error;
pub mod fetch;
mod keyed;
pub mod link;
pub mod resolve;

pub use crate::context::Context;
pub use crate::fetch::{Caller, FetchCoordinator, FetchOutcome, JobId, JobStatus};
pub use crate::link::{Ready, get_resource_ready};
pub use crate::resolve::get_by_url;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use catalog_sites::mock::MockSite;
    use catalog_sites::{AdapterHandle, NoRedirects, SiteRegistry};
    use catalog_store::{Database, Repository};
    use std::sync::Arc;

    /// A context over a fresh in-memory database serving the given sites.
    pub(crate) async fn context(sites: Vec<Arc<MockSite>>) -> Context {
        let adapters = sites.into_iter().map(|site| site as AdapterHandle);
        let registry = SiteRegistry::from_adapters(adapters, Arc::new(NoRedirects)).unwrap();
        let db = Database::connect_in_memory().await.unwrap();
        Context::new(Arc::new(registry), Repository::from(&db))
    }
}
