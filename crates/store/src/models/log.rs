use super::{parse_timestamp, parse_uuid};
use crate::error::{Error, ErrorKind};
use crate::log::{LogAction, LogEntry};
use exn::ResultExt;

#[derive(sqlx::FromRow)]
pub(crate) struct LogRow {
    pub(crate) item_uuid: String,
    pub(crate) action: String,
    pub(crate) detail: String,
    pub(crate) logged_at: i64,
}
impl TryFrom<LogRow> for LogEntry {
    type Error = Error;
    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        Ok(Self {
            item: parse_uuid(&row.item_uuid, "log item uuid")?,
            action: row.action.parse::<LogAction>()?,
            detail: serde_json::from_str(&row.detail).or_raise(|| ErrorKind::InvalidData("log detail"))?,
            logged_at: parse_timestamp(row.logged_at, "log date")?,
        })
    }
}
