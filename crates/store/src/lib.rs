//! SQLite persistence for the catalog.
//!
//! This crate owns the catalog's state: canonical Items, the external
//! resources scraped for them, and an audit trail of everything that
//! happened to an Item. On top of plain storage it implements identity
//! resolution (the transactional find-or-create in [`Repository::link`]) and
//! the merge engine (merge, unmerge, soft delete, recast and merge-aware
//! resolution).
//!
//! # Architecture
//! - **Items** are keyed by a uuid that never changes. Among live Items the
//!   primary lookup id `(type, value)` is unique catalog-wide, enforced by a
//!   partial unique index.
//! - **External resources** are keyed by `(id_type, id_value)`, one per
//!   source record, and point at the Item they were linked to.
//! - Every committed change is published to an [`index::IndexSink`] for the
//!   search index, which is eventually consistent.

mod db;
pub mod error;
pub mod index;
pub mod item;
pub mod log;
mod models;
mod repo;
mod resource;

pub use crate::db::Database;
pub use crate::repo::{ItemRef, LinkRequest, Linked, MAX_MERGE_DEPTH, Repository, Resolution};
pub use crate::resource::ExternalResource;
