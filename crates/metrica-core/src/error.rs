//! Error types for the Metrica core library.

use std::path::{Path, PathBuf};

/// Errors that can occur while configuring, deriving or persisting KPIs.
///
/// All error variants are marked with `#[non_exhaustive]` to allow
/// adding new error types without breaking changes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Input validation error
    #[error("Validation error: {message}")]
    Validation {
        /// Field or aspect that failed validation
        field: Option<String>,
        /// What went wrong
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// What configuration is problematic
        message: String,
    },

    /// A location code outside the configured enumeration
    #[error("Unknown location code: {code}")]
    UnknownLocation {
        /// The offending code
        code: String,
    },

    /// A month key that is not of the form `YYYY-MM`
    #[error("Invalid month key: {value:?}")]
    InvalidMonthKey {
        /// The rejected input
        value: String,
    },

    /// I/O error without path context
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a specific file
    #[error("I/O error on {path}: {source}")]
    IoPath {
        /// File that was being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Convenience `Result` type alias for Metrica core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new validation error.
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Error::Validation {
            field: None,
            message: message.into(),
        }
    }

    /// Creates a new validation error with a field name.
    pub fn validation_field<F, M>(field: F, message: M) -> Self
    where
        F: Into<String>,
        M: Into<String>,
    {
        Error::Validation {
            field: Some(field.into()),
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    pub fn config<S: Into<String>>(message: S) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    /// Wraps an I/O error with the path it occurred on.
    pub fn io_with_path(source: std::io::Error, path: impl AsRef<Path>) -> Self {
        Error::IoPath {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Returns `true` for errors caused by bad configuration or input,
    /// which retrying cannot fix.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::Validation { .. }
                | Error::UnknownLocation { .. }
                | Error::InvalidMonthKey { .. }
                | Error::Toml(_)
        )
    }
}
