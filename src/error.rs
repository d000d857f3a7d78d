//! Error types shared by entries, sinks and the persistence layer.

use std::io;

use crate::encode::EncodeError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = LogError> = std::result::Result<T, E>;

/// Every failure the library reports.
///
/// Errors are raised to the immediate caller and never retried internally.
/// A failed operation leaves every previously returned sink or entry value
/// untouched.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// An entry was serialized before its payload and timestamp were set.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An entry map is missing required keys or carries ill-typed values.
    #[error("invalid entry data: {0}")]
    InvalidData(String),

    /// A tagged sink map is missing required keys or has the wrong shape.
    #[error("malformed sink data: {0}")]
    MalformedData(String),

    /// A type tag is unknown, or names a kind that cannot stand where it was found.
    #[error("cannot resolve sink type `{tag}`: {reason}")]
    TypeResolution {
        /// The offending tag.
        tag: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A sink was configured with values it cannot honor.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// `with_file` was called on a file sink that holds an open handle.
    #[error("file `{pathname}` is already open")]
    AlreadyOpen {
        /// Pathname of the open file.
        pathname: String,
    },

    /// Directory creation, open, write or close failed.
    #[error("{context}: {source}")]
    Io {
        /// What was being attempted.
        context: String,
        /// The OS error.
        #[source]
        source: io::Error,
    },

    /// A payload could not be encoded.
    #[error("couldn't encode payload: {0}")]
    Encode(#[from] EncodeError),
}

impl LogError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        LogError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn unresolved(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        LogError::TypeResolution {
            tag: tag.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for [`LogError::Io`].
    pub fn is_io(&self) -> bool {
        matches!(self, LogError::Io { .. })
    }

    /// Returns true for [`LogError::MalformedData`].
    pub fn is_malformed(&self) -> bool {
        matches!(self, LogError::MalformedData(_))
    }

    /// Returns true for [`LogError::TypeResolution`].
    pub fn is_type_resolution(&self) -> bool {
        matches!(self, LogError::TypeResolution { .. })
    }

    /// Returns true for [`LogError::InvalidData`].
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, LogError::InvalidData(_))
    }
}
