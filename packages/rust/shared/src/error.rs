//! Error types for chargen.
//!
//! Library crates use [`ChargenError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all chargen operations.
#[derive(Debug, thiserror::Error)]
pub enum ChargenError {
    /// No parseable JSON object could be recovered from model output.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The parsed object lacks one or more required top-level fields.
    #[error("invalid character data: missing {}", missing.join(", "))]
    InvalidCharacterData { missing: Vec<String> },

    /// The text-generation provider returned a failure or an unusable envelope.
    #[error("generation failed: {0}")]
    UpstreamGenerationFailure(String),

    /// No provider credential was supplied.
    #[error("API key is required")]
    MissingCredential,

    /// A required request input was empty or absent.
    #[error("{field} is required")]
    MissingInput { field: String },

    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to the provider.
    #[error("network error: {0}")]
    Network(String),

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Binary-to-text conversion error (PDF and friends).
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A named record (e.g. a backup) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChargenError>;

impl ChargenError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-response error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create a missing-input error naming the absent field.
    pub fn missing_input(field: impl Into<String>) -> Self {
        Self::MissingInput {
            field: field.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller's input rather than by us
    /// or the provider.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingCredential | Self::MissingInput { .. })
    }
}
