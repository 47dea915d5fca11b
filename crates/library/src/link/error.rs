//! Error types for the [`link`](super) module.

use catalog_sites::error::ErrorKind as SiteErrorKind;
use catalog_sites::models::IdType;
use catalog_store::error::ErrorKind as StoreErrorKind;
use derive_more::{Display, Error};

/// A link error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for link operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a link failure.
///
/// The dependency variants carry the inner kind so callers can tell, say,
/// an identity conflict from a broken database without walking the error
/// tree.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The adapter failed to scrape the resource (or timed out).
    #[display("scrape failed: {_0}")]
    Scrape(#[error(not(source))] SiteErrorKind),
    /// A required resource couldn't be resolved to a live Item.
    #[display("required resource {id_type}:{id_value} could not be resolved")]
    RequiredResource { id_type: IdType, id_value: String },
    /// No registered adapter serves a required resource's id type.
    #[display("no site adapter for required resource {id_type}:{id_value}")]
    UnsupportedResource { id_type: IdType, id_value: String },
    /// Required resources lead back to a resource already being linked.
    #[display("required resources form a cycle at {id_type}:{id_value}")]
    DependencyCycle { id_type: IdType, id_value: String },
    /// Required resources nest deeper than the configured limit.
    #[display("required resources nest deeper than {_0} levels")]
    DepthExceeded(#[error(not(source))] usize),
    /// The catalog store rejected or failed the operation.
    #[display("store error: {_0}")]
    Store(#[error(not(source))] StoreErrorKind),
    /// Cover bytes couldn't be stored.
    #[display("cover storage failed")]
    Storage,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Scrape(kind) => kind.is_retryable(),
            Self::Store(kind) => kind.is_retryable(),
            Self::Storage => true,
            Self::RequiredResource { .. }
            | Self::UnsupportedResource { .. }
            | Self::DependencyCycle { .. }
            | Self::DepthExceeded(_) => false,
        }
    }

    /// Block pages and placeholder content are expected now and then and
    /// get logged at a lower severity.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Scrape(kind) if kind.is_expected())
    }

    /// Convert a store error into a link error, keeping the store's frame
    /// as a child in the error tree.
    #[track_caller]
    pub fn store(err: catalog_store::error::Error) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Store(inner))
    }

    #[track_caller]
    pub fn scrape(err: catalog_sites::error::Error) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Scrape(inner))
    }
}
