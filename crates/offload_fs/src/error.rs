// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use thiserror::Error;

use crate::blocking::Category;

/// A specialized `Result` type for facade operations that return an
/// [`Error`][enum@Error] on failure.
pub type Result<T> = std::result::Result<T, Error>;

/// An error surfaced by an offloaded operation.
///
/// Failures raised by the blocking primitive itself ([`Error::Io`],
/// [`Error::Archive`]) are passed through untouched, so callers can inspect
/// the original [`std::io::ErrorKind`] or archive error. The remaining variants
/// describe misuse of a facade and never reach a worker thread.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// We are re-packaging an error from the Rust standard library I/O logic
    /// without adding further details.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// We are re-packaging an error from the archive reader or writer
    /// without adding further details.
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    /// An operation was attempted after the facade was closed.
    #[error("`{operation}` called on a closed handle")]
    Closed {
        /// The name of the rejected operation.
        operation: &'static str,
    },

    /// An operation was attempted after the underlying handle was handed back
    /// to the caller.
    #[error("`{operation}` called after the underlying handle was detached")]
    Detached {
        /// The name of the rejected operation.
        operation: &'static str,
    },

    /// The wrapping policy received a handle outside its recognized
    /// capability categories.
    #[error("unsupported handle type: {type_name}")]
    UnsupportedCategory {
        /// The type name of the rejected handle.
        type_name: &'static str,
    },

    /// A facade was narrowed to a variant it does not hold.
    #[error("expected a {expected} handle, found a {actual} handle")]
    CategoryMismatch {
        /// The category the caller asked for.
        expected: Category,
        /// The category the facade actually wraps.
        actual: Category,
    },
}

impl Error {
    pub(crate) const fn closed(operation: &'static str) -> Self {
        Self::Closed { operation }
    }

    pub(crate) const fn detached(operation: &'static str) -> Self {
        Self::Detached { operation }
    }

    /// Returns `true` if this error reports misuse of a facade (use after
    /// close or after detach) rather than a failure of the underlying I/O.
    #[must_use]
    pub const fn is_state_error(&self) -> bool {
        matches!(self, Self::Closed { .. } | Self::Detached { .. })
    }

    /// Returns the [`std::io::ErrorKind`] of a wrapped I/O failure.
    #[must_use]
    pub fn io_kind(&self) -> Option<std::io::ErrorKind> {
        match self {
            Self::Io(e) => Some(e.kind()),
            Self::Archive(zip::result::ZipError::Io(e)) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(error: Error) -> Self {
        match error {
            Error::Io(e) => e,
            Error::Archive(zip::result::ZipError::Io(e)) => e,
            Error::Archive(e) => Self::new(std::io::ErrorKind::InvalidData, e),
            e @ (Error::Closed { .. } | Error::Detached { .. }) => Self::other(e),
            e @ (Error::UnsupportedCategory { .. } | Error::CategoryMismatch { .. }) => Self::new(std::io::ErrorKind::InvalidInput, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    #[test]
    fn io_errors_keep_their_kind() {
        let error = Error::from(std::io::Error::new(ErrorKind::NotFound, "missing"));
        assert_eq!(error.io_kind(), Some(ErrorKind::NotFound));
        assert!(!error.is_state_error());

        let back: std::io::Error = error.into();
        assert_eq!(back.kind(), ErrorKind::NotFound);
        assert_eq!(back.to_string(), "missing");
    }

    #[test]
    fn state_errors_are_distinct_from_io() {
        let closed = Error::closed("read");
        assert!(closed.is_state_error());
        assert_eq!(closed.io_kind(), None);
        assert_eq!(closed.to_string(), "`read` called on a closed handle");

        let detached = Error::detached("write");
        assert!(detached.is_state_error());
    }

    #[test]
    fn category_errors_are_not_state_errors() {
        let error = Error::UnsupportedCategory { type_name: "u32" };
        assert!(!error.is_state_error());
        assert_eq!(std::io::Error::from(error).kind(), ErrorKind::InvalidInput);
    }
}
