//! Per-item audit trail.

use crate::error::{Error, ErrorKind};
use serde_json::Value;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::UtcDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    Create,
    /// An external resource was linked to the Item.
    Link,
    Update,
    PrimaryId,
    Merge,
    Unmerge,
    Delete,
    HardDelete,
    Recast,
}
impl LogAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Link => "link",
            Self::Update => "update",
            Self::PrimaryId => "primary_id",
            Self::Merge => "merge",
            Self::Unmerge => "unmerge",
            Self::Delete => "delete",
            Self::HardDelete => "hard_delete",
            Self::Recast => "recast",
        }
    }
}
impl FromStr for LogAction {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create" => Self::Create,
            "link" => Self::Link,
            "update" => Self::Update,
            "primary_id" => Self::PrimaryId,
            "merge" => Self::Merge,
            "unmerge" => Self::Unmerge,
            "delete" => Self::Delete,
            "hard_delete" => Self::HardDelete,
            "recast" => Self::Recast,
            _ => exn::bail!(ErrorKind::InvalidData("log action")),
        })
    }
}
impl Display for LogAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub item: Uuid,
    pub action: LogAction,
    pub detail: Value,
    pub logged_at: UtcDateTime,
}
