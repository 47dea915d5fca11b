//! Error types for the [`fetch`](super) module.

use super::JobId;
use crate::link::error::ErrorKind as LinkErrorKind;
use catalog_store::error::ErrorKind as StoreErrorKind;
use derive_more::{Display, Error};

/// A fetch error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// No registered adapter recognises the URL.
    #[display("unsupported url: {_0}")]
    UnsupportedUrl(#[error(not(source))] String),
    /// The job ran and linking failed.
    #[display("fetch failed: {_0}")]
    Link(#[error(not(source))] LinkErrorKind),
    /// Looking up the catalog failed.
    #[display("store error: {_0}")]
    Store(#[error(not(source))] StoreErrorKind),
    /// The coordinator has never issued this job id.
    #[display("unknown fetch job {_0}")]
    UnknownJob(#[error(not(source))] JobId),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Link(kind) => kind.is_retryable(),
            Self::Store(kind) => kind.is_retryable(),
            Self::UnsupportedUrl(_) | Self::UnknownJob(_) => false,
        }
    }

    #[track_caller]
    pub fn store(err: catalog_store::error::Error) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Store(inner))
    }
}
