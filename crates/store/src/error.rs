//! Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use catalog_sites::models::IdType;
use derive_more::{Display, Error};
use uuid::Uuid;

/// A store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// Serialization/deserialization error of a stored column.
    #[display("invalid catalog data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    #[display("item not found: {_0}")]
    ItemNotFound(#[error(not(source))] Uuid),
    /// The operation is not allowed on a soft-deleted item.
    #[display("item is deleted: {_0}")]
    ItemDeleted(#[error(not(source))] Uuid),
    /// A lookup id is already held by another live item and the conflict
    /// cannot be resolved automatically.
    #[display("identity conflict on {id_type}:{value}")]
    IdentityConflict {
        /// Identifier type of the contested key.
        id_type: IdType,
        /// Normalized value of the contested key.
        value: String,
    },
    /// The identifier is malformed or not supported by the item's variant.
    #[display("invalid identifier {id_type}:{value}")]
    InvalidIdentifier {
        /// Identifier type that was rejected.
        id_type: IdType,
        /// The raw value.
        value: String,
    },
    /// Following a merge chain exceeded the depth limit or revisited an item.
    #[display("merge cycle detected at {_0}")]
    MergeCycle(#[error(not(source))] Uuid),
    /// A merge request violates the merge rules.
    #[display("merge rejected: {_0}")]
    MergeRejected(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// An identity conflict can be caused by a concurrent writer creating the
    /// same key; re-running the match will then find that item.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database | Self::IdentityConflict { .. })
    }
}
