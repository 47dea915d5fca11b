//! Library Error Types
//!
//! Errors raised while wiring the catalog together. The linker and the fetch
//! coordinator have their own error kinds in their modules.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database couldn't be opened or migrated.
    #[display("could not open the catalog database")]
    Database,
    /// The cover storage root couldn't be prepared.
    #[display("could not prepare cover storage")]
    Storage,
    /// Building the site registry failed (duplicate adapters, HTTP client).
    #[display("could not build the site registry")]
    Registry,
    /// A store lookup failed.
    #[display("catalog lookup failed")]
    Store,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store)
    }
}
