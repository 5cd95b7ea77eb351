//! Error types for Listvault.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=store, 3=model, 4=validation, etc.)
//! - A setup/save split: setup errors leave the stack unusable,
//!   save errors only lose the pending changes of one flush
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for Listvault operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Callers match on the string; shell scripts on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Store (exit 2)
    StoreCorrupt,
    InvalidPassphrase,
    DatabaseError,

    // Model (exit 3)
    ModelNotFound,
    InvalidModel,
    IncompatibleModel,
    MappingUnavailable,

    // Validation (exit 4)
    ValidationFailed,
    ObjectNotFound,
    InvalidArgument,

    // Concurrency (exit 5)
    FlushTimeout,
    ContextClosed,
    ReentrantPerform,

    // Crypto (exit 6)
    CryptoError,
    PassphraseUnavailable,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::StoreCorrupt => "STORE_CORRUPT",
            Self::InvalidPassphrase => "INVALID_PASSPHRASE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ModelNotFound => "MODEL_NOT_FOUND",
            Self::InvalidModel => "INVALID_MODEL",
            Self::IncompatibleModel => "INCOMPATIBLE_MODEL",
            Self::MappingUnavailable => "MAPPING_UNAVAILABLE",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::ObjectNotFound => "OBJECT_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FlushTimeout => "FLUSH_TIMEOUT",
            Self::ContextClosed => "CONTEXT_CLOSED",
            Self::ReentrantPerform => "REENTRANT_PERFORM",
            Self::CryptoError => "CRYPTO_ERROR",
            Self::PassphraseUnavailable => "PASSPHRASE_UNAVAILABLE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::StoreCorrupt | Self::InvalidPassphrase | Self::DatabaseError => 2,
            Self::ModelNotFound
            | Self::InvalidModel
            | Self::IncompatibleModel
            | Self::MappingUnavailable => 3,
            Self::ValidationFailed | Self::ObjectNotFound | Self::InvalidArgument => 4,
            Self::FlushTimeout | Self::ContextClosed | Self::ReentrantPerform => 5,
            Self::CryptoError | Self::PassphraseUnavailable => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the error can only occur while building the stack.
    ///
    /// Setup errors mean the store or model is unusable; there is no
    /// degraded mode to fall back to.
    #[must_use]
    pub const fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::StoreCorrupt
                | Self::InvalidPassphrase
                | Self::ModelNotFound
                | Self::InvalidModel
                | Self::IncompatibleModel
                | Self::MappingUnavailable
                | Self::PassphraseUnavailable
                | Self::ConfigError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Listvault operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Model not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("Invalid model {name}: {reason}")]
    InvalidModel { name: String, reason: String },

    #[error("Store is corrupt or not a listvault store: {}", path.display())]
    StoreCorrupt { path: PathBuf },

    #[error("Invalid passphrase for store {}", path.display())]
    InvalidPassphrase { path: PathBuf },

    #[error("Store was written with model version {stored}, current model is {current}")]
    IncompatibleModel { stored: u32, current: u32 },

    #[error("Cannot infer mapping from model {from} to {to}: {reason}")]
    MappingUnavailable { from: u32, to: u32, reason: String },

    #[error("Validation failed for {entity} {id}: {reason}")]
    Validation {
        entity: String,
        id: String,
        reason: String,
    },

    #[error("Object not found: {id}")]
    ObjectNotFound { id: String },

    #[error("Flush did not complete within {}ms", timeout.as_millis())]
    FlushTimeout { timeout: Duration },

    #[error("Context queue {queue} is closed")]
    Closed { queue: String },

    #[error("perform_and_wait called from inside queue {queue}")]
    ReentrantPerform { queue: String },

    #[error("Passphrase unavailable: {0}")]
    Passphrase(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ModelNotFound { .. } => ErrorCode::ModelNotFound,
            Self::InvalidModel { .. } => ErrorCode::InvalidModel,
            Self::StoreCorrupt { .. } => ErrorCode::StoreCorrupt,
            Self::InvalidPassphrase { .. } => ErrorCode::InvalidPassphrase,
            Self::IncompatibleModel { .. } => ErrorCode::IncompatibleModel,
            Self::MappingUnavailable { .. } => ErrorCode::MappingUnavailable,
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::ObjectNotFound { .. } => ErrorCode::ObjectNotFound,
            Self::FlushTimeout { .. } => ErrorCode::FlushTimeout,
            Self::Closed { .. } => ErrorCode::ContextClosed,
            Self::ReentrantPerform { .. } => ErrorCode::ReentrantPerform,
            Self::Passphrase(_) => ErrorCode::PassphraseUnavailable,
            Self::Crypto(_) => ErrorCode::CryptoError,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Whether this error belongs to the setup tier.
    #[must_use]
    pub const fn is_setup_error(&self) -> bool {
        self.error_code().is_setup()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::ModelNotFound { path } => Some(format!(
                "Place the model definition at {} or pass --resources.",
                path.display()
            )),
            Self::StoreCorrupt { path } => Some(format!(
                "Move {} aside to start with a fresh store.",
                path.display()
            )),
            Self::InvalidPassphrase { .. } => {
                Some("Check the LISTVAULT_PASSPHRASE environment variable.".to_string())
            }
            Self::Passphrase(_) => {
                Some("Set LISTVAULT_PASSPHRASE to the store passphrase.".to_string())
            }
            Self::IncompatibleModel { .. } => Some(
                "Enable automatic migration or open the store with the matching model version."
                    .to_string(),
            ),
            Self::MappingUnavailable { .. } => Some(
                "Only additive changes, removals and defaulted attributes migrate automatically."
                    .to_string(),
            ),
            Self::FlushTimeout { .. } => {
                Some("Increase the flush timeout or reduce the pending change set.".to_string())
            }
            Self::InvalidModel { .. }
            | Self::Validation { .. }
            | Self::ObjectNotFound { .. }
            | Self::Closed { .. }
            | Self::ReentrantPerform { .. }
            | Self::Crypto(_)
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "setup": code.is_setup(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
