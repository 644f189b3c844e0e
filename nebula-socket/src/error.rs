//! Error types for Nebula sockets.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Configuration`], [`Error::Resolution`] |
//! | Usage | [`Error::UnavailableSocket`], [`Error::UnsupportedInput`] |
//! | Transport | [`Error::Io`] |
//!
//! Configuration and resolution errors are produced while building a
//! [`ConnectionConfig`](crate::ConnectionConfig) and never leave a partially
//! built value behind. Transport errors are the untouched [`std::io::Error`]
//! reported by the operating system.

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::resolve::RecordType;

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid domain, type, protocol or port, or a domain the current
    /// platform cannot open.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The host could not be turned into a literal address of the
    /// required family.
    #[error("Unable to find {record_type} address for host: {host}")]
    Resolution {
        /// Host name as supplied by the caller.
        host: String,
        /// DNS record type that was looked up.
        record_type: RecordType,
    },

    /// The operation needs a socket handle but the connection is closed
    /// or was never opened.
    #[error("Socket is not available")]
    UnavailableSocket,

    /// The payload kind cannot be used by this operation.
    #[error("Unsupported input: {message}")]
    UnsupportedInput {
        /// Description of why the input was rejected.
        message: String,
    },

    /// Failure reported by an OS socket primitive.
    #[error("IO error: {0}")]
    Io(#[from] IoError),
}

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a resolution error.
    #[inline]
    pub fn resolution(host: impl Into<String>, record_type: RecordType) -> Self {
        Self::Resolution {
            host: host.into(),
            record_type,
        }
    }

    /// Creates an unsupported input error.
    #[inline]
    pub fn unsupported_input(message: impl Into<String>) -> Self {
        Self::UnsupportedInput {
            message: message.into(),
        }
    }

    /// Returns `true` for configuration errors.
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` for resolution errors.
    #[inline]
    #[must_use]
    pub fn is_resolution(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }

    /// Returns `true` when the socket handle was missing.
    #[inline]
    #[must_use]
    pub fn is_unavailable_socket(&self) -> bool {
        matches!(self, Self::UnavailableSocket)
    }

    /// Returns `true` for unsupported input errors.
    #[inline]
    #[must_use]
    pub fn is_unsupported_input(&self) -> bool {
        matches!(self, Self::UnsupportedInput { .. })
    }

    /// Returns the underlying OS error, if any.
    #[inline]
    #[must_use]
    pub fn as_io(&self) -> Option<&IoError> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}
