mod item;
mod log;
mod proxy;
mod resource;

pub(crate) use self::item::ItemRow;
pub(crate) use self::log::LogRow;
pub(crate) use self::resource::ResourceRow;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use time::UtcDateTime;
use uuid::Uuid;

fn parse_uuid(raw: &str, field: &'static str) -> Result<Uuid> {
    Uuid::parse_str(raw).or_raise(|| ErrorKind::InvalidData(field))
}

fn parse_timestamp(raw: i64, field: &'static str) -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(raw).or_raise(|| ErrorKind::InvalidData(field))
}
