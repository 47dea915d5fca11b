use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ErrorKind {
    /// The configuration sources couldn't be read or didn't deserialize.
    #[display("could not load configuration")]
    Load,
    /// A configuration file with an extension no provider understands.
    #[display("unsupported configuration file format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// Loaded fine, but a value is out of range.
    #[display("invalid configuration value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
