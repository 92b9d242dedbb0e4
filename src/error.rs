//! # Error Handling
//!
//! This module defines the centralized error type for the `plugsync`
//! library. It uses the `thiserror` library to build a single `Error` enum
//! whose variants carry enough context to produce a useful message.
//!
//! ## Propagation Policy
//!
//! Errors in this enum are the *global* failures: bad plugin declarations,
//! an unreadable manifest, an unparseable snapshot file. They abort the call
//! that produced them.
//!
//! Failures of individual git commands are *not* represented here. They are
//! recorded per job as a [`crate::job::JobError`] and reported through the
//! notifier, so one broken repository never aborts a batch. Callers inspect
//! the per-plugin state after a pipeline run instead of expecting an `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for plugsync operations
#[derive(Error, Debug)]
pub enum Error {
    /// A plugin declaration failed validation during normalization.
    ///
    /// `field` names the offending field (`source`, `name`, `checkout`,
    /// `track`, or one of the hook names).
    #[error("Invalid plugin spec: field '{field}': {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Validation {
        field: String,
        message: String,
        /// Optional hint for how to fix the declaration
        hint: Option<String>,
    },

    /// A checkout target file could not be loaded or did not contain a
    /// `name -> target` mapping.
    #[error("Snapshot parse error for {}: {message}", path.display())]
    SnapshotParse { path: PathBuf, message: String },

    /// The manifest file is structurally invalid (outside a single plugin
    /// entry).
    #[error("Manifest error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Manifest {
        message: String,
        /// Optional hint for how to fix the manifest
        hint: Option<String>,
    },

    /// A lifecycle hook returned an error or panicked.
    #[error("Hook {hook} of plugin '{plugin}' failed: {message}")]
    Hook {
        plugin: String,
        hook: String,
        message: String,
    },

    /// A plugin name that is not registered in the session.
    #[error("Unknown plugin: {name}")]
    UnknownPlugin { name: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for a validation failure without a hint.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
            hint: None,
        }
    }

    /// Returns the offending field name for validation errors.
    pub fn field(&self) -> Option<&str> {
        match self {
            Error::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
