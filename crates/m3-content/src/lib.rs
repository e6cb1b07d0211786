//! m3-content: file operations on a game content tree
//!
//! Reads and writes level files, experience flows, flow step definitions and
//! narrative stages under a content root. Every write goes through a
//! [`ContentWriter`] so commands can run as a dry run.

use std::path::PathBuf;

use thiserror::Error;

use m3_core::{FlowError, LayoutError};

pub mod flows;
pub mod levels;
pub mod paths;
pub mod stages;
pub mod store;

pub use paths::ContentRoot;
pub use store::{BackupPolicy, ContentWriter, Indent};

/// Content errors
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("bad flow file {path}: {source}")]
    Flow {
        path: PathBuf,
        #[source]
        source: FlowError,
    },

    #[error("bad level file {path}: {source}")]
    Level {
        path: PathBuf,
        #[source]
        source: LayoutError,
    },

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("directory not found: {0}")]
    MissingDir(PathBuf),

    #[error("file not found: {0}")]
    NotFound(PathBuf),
}

impl ContentError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ContentError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ContentError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ContentError> = std::result::Result<T, E>;
