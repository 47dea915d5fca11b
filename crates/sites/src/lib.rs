//! Site adapters and external identifiers.
//!
//! Everything the catalog knows about the outside world goes through this
//! crate: which external identifier types exist and how they are
//! normalized, which Item variants they can identify, what a scraped
//! resource looks like ([`models::ResourceContent`]), and how a URL finds
//! the adapter responsible for it ([`SiteRegistry`]).
//!
//! Per-site parsing lives in the adapters themselves; this crate only
//! defines the contract they implement.

mod consts;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod models;
pub mod redirect;
mod registry;
mod site;

#[cfg(feature = "http")]
pub use crate::redirect::HttpRedirectProbe;
pub use crate::redirect::{NoRedirects, RedirectProbe};
pub use crate::registry::{DEFAULT_SEARCH_TIMEOUT, SiteRegistry};
pub use crate::site::{AdapterHandle, Site, SiteAdapter};
