//! Typed error definitions for git_store_meta.
//! Provides a small set of well-known failure modes for better logs and tests.
//!
//! Fatal: Config, MalformedStore, UnsupportedSchema, Io, Vcs.
//! Non-fatal (logged, processing continues): AttributeApply, PathMissing,
//! PathKindMismatch, Unsupported.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreMetaError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Malformed store file {path}: {reason}")]
    MalformedStore { path: PathBuf, reason: String },

    #[error("Unsupported store schema version '{version}' in {path}")]
    UnsupportedSchema { path: PathBuf, version: String },

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git command failed ({command}): {detail}")]
    Vcs { command: String, detail: String },

    #[error("Failed to set {field} on {path}: {detail}")]
    AttributeApply {
        path: PathBuf,
        field: &'static str,
        detail: String,
    },

    #[error("Path no longer exists: {0}")]
    PathMissing(PathBuf),

    #[error("Path {path} changed kind: recorded {recorded}, found {found}")]
    PathKindMismatch {
        path: PathBuf,
        recorded: char,
        found: String,
    },

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),
}

impl StoreMetaError {
    /// Stable numeric code for structured logs.
    pub fn code(&self) -> u16 {
        match self {
            StoreMetaError::Config(_) => 10,
            StoreMetaError::MalformedStore { .. } => 20,
            StoreMetaError::UnsupportedSchema { .. } => 21,
            StoreMetaError::Io { .. } => 30,
            StoreMetaError::Vcs { .. } => 40,
            StoreMetaError::AttributeApply { .. } => 50,
            StoreMetaError::PathMissing(_) => 51,
            StoreMetaError::PathKindMismatch { .. } => 52,
            StoreMetaError::Unsupported(_) => 60,
        }
    }

    /// Short machine-readable kind label.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreMetaError::Config(_) => "config",
            StoreMetaError::MalformedStore { .. } => "malformed_store",
            StoreMetaError::UnsupportedSchema { .. } => "unsupported_schema",
            StoreMetaError::Io { .. } => "io",
            StoreMetaError::Vcs { .. } => "vcs",
            StoreMetaError::AttributeApply { .. } => "attribute_apply",
            StoreMetaError::PathMissing(_) => "path_missing",
            StoreMetaError::PathKindMismatch { .. } => "path_kind_mismatch",
            StoreMetaError::Unsupported(_) => "unsupported",
        }
    }

    /// Fatal errors abort the whole invocation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoreMetaError::Config(_)
                | StoreMetaError::MalformedStore { .. }
                | StoreMetaError::UnsupportedSchema { .. }
                | StoreMetaError::Io { .. }
                | StoreMetaError::Vcs { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreMetaError::Io {
            path: path.into(),
            source,
        }
    }
}
