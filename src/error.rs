//! @acp:module "Errors"
//! @acp:summary "Error types for fallible seams (I/O, config, snapshots)"
//! @acp:domain cli
//! @acp:layer model
//!
//! Input-data problems (unparseable source, unknown declaration, missing file)
//! are not errors in this crate: the core reports them as empty results or
//! `false`. `AnnotateError` covers the seams that genuinely fail, such as
//! writing a file back or loading a malformed configuration.

use std::path::PathBuf;

use thiserror::Error;

/// @acp:summary "Unified library error"
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid glob: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config format: {0}")]
    ConfigFormat(String),

    /// A metadata accessor could not produce data for an entity
    #[error("{entity}: {message}")]
    Producer { entity: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl AnnotateError {
    pub fn producer(entity: impl Into<String>, message: impl Into<String>) -> Self {
        AnnotateError::Producer {
            entity: entity.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnotateError>;
