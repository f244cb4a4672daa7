//! Collection errors.

use thiserror::Error;

/// Errors raised by a collector for the whole scrape.
///
/// Per-resource failures (a hung mount, a failed `statvfs`) are not errors at
/// this level; they are reported as `device_error` observations.
#[derive(Debug, Error)]
pub enum CollectError {
    /// The kernel table backing a collector could not be opened or parsed.
    #[error("cannot read {path}: {message}")]
    SourceUnreadable {
        path: &'static str,
        message: String,
    },
}

impl CollectError {
    pub fn unreadable(path: &'static str, err: impl std::fmt::Display) -> Self {
        Self::SourceUnreadable {
            path,
            message: err.to_string(),
        }
    }
}
