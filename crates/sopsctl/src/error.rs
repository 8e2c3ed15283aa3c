//! Error types shared by the profile store, resolver and capabilities

use std::path::PathBuf;
use thiserror::Error;

/// Profile-specific errors
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Profile already exists: {0}")]
    DuplicateName(String),

    #[error("Directory already mapped: {0}")]
    DuplicateDirectory(String),

    #[error("Directory not mapped: {0}")]
    DirectoryNotMapped(String),

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("No profile available - use -p, map a directory, or set a default profile")]
    NoProfileAvailable,

    #[error("Selection cancelled")]
    SelectionCancelled,

    #[error("At least one encryption backend is required (--age or --age-key-file)")]
    MissingBackend,

    #[error("Invalid {field} pattern: {message}")]
    InvalidRegex { field: &'static str, message: String },

    #[error("External tool not found: {path} ({source})")]
    ToolNotFound {
        path: String,
        #[source]
        source: which::Error,
    },

    #[error("Selection failed: {0}")]
    Selector(String),

    #[error("Editor failed: {0}")]
    Editor(String),
}

impl ProfileError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProfileError>;
