//! Error types for replace rules.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for rule loading and application.
#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Glob pattern error: {0}")]
    Glob(#[from] globset::Error),

    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Invalid rule: {message}")]
    InvalidRule { message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Edit failed: {message}")]
    EditFailed { message: String },
}

/// A specialized Result type for replace rule operations.
pub type Result<T> = std::result::Result<T, ReplaceError>;
