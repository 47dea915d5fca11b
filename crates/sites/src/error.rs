//! Site Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Adapters raise these from `scrape()`,
//! and the fetch coordinator catches them at the job boundary.

use derive_more::{Display, Error};

/// A site error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for site operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a download from an external site did not produce usable content.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum DownloadErrorKind {
    /// Connection failure, unexpected status code, truncated body...
    #[display("network error")]
    Network,
    /// The site answered, but with something that isn't the resource.
    #[display("invalid content")]
    InvalidContent,
    /// The site answered with a block or placeholder page.
    #[display("censored or blocked content")]
    Censorship,
}

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The scraped response is missing a required field.
    #[display("failed to parse scraped response, missing or invalid field: {field}")]
    Parse {
        /// The field that could not be extracted.
        field: &'static str,
    },
    /// The resource could not be downloaded.
    #[display("download failed ({_0}): {_1}")]
    Download(#[error(not(source))] DownloadErrorKind, #[error(not(source))] String),
    /// The scrape did not complete within the configured timeout.
    #[display("scrape timed out")]
    Timeout,
    /// No registered adapter recognises the URL.
    #[display("unsupported url: {_0}")]
    UnsupportedUrl(#[error(not(source))] String),
    /// An external identifier failed normalization.
    #[display("invalid identifier for {id_type}: {value}")]
    InvalidIdentifier {
        /// Identifier type name.
        id_type: &'static str,
        /// The rejected raw value.
        value: String,
    },
    /// An adapter for the same identifier type is already registered.
    #[display("adapter already registered for id type {_0}")]
    DuplicateIdType(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// Only transport-level failures are retryable; parsing failures and
    /// censorship pages will look exactly the same next time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download(DownloadErrorKind::Network, _) | Self::Timeout)
    }

    /// Expected failures (block pages, placeholder content) are logged at a
    /// lower severity than genuine breakage.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::Download(DownloadErrorKind::Censorship, _) | Self::Download(DownloadErrorKind::InvalidContent, _)
        )
    }

    /// Shorthand for a network-level download failure.
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Download(DownloadErrorKind::Network, detail.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ErrorKind::network("connection reset"), true)]
    #[case(ErrorKind::Timeout, true)]
    #[case(ErrorKind::Download(DownloadErrorKind::Censorship, "blocked".to_string()), false)]
    #[case(ErrorKind::Parse { field: "title" }, false)]
    fn test_retryable(#[case] kind: ErrorKind, #[case] expected: bool) {
        assert_eq!(kind.is_retryable(), expected);
    }

    #[test]
    fn test_display() {
        let kind = ErrorKind::Download(DownloadErrorKind::Censorship, "placeholder page".to_string());
        assert_eq!(kind.to_string(), "download failed (censored or blocked content): placeholder page");
    }
}
