//! Error types for modlink

use std::path::PathBuf;
use thiserror::Error;

use crate::component::ComponentKind;
use crate::linker::LinkApplyError;
use crate::staging::StagingError;
use crate::state::PersistenceError;

/// Errors raised by controller operations
#[derive(Error, Debug)]
pub enum ModlinkError {
    #[error("Staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("Conflict computation failed: {0}")]
    ConflictComputation(String),

    #[error("Commit failed: {0}")]
    LinkApply(#[from] LinkApplyError),

    #[error("State persistence failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No {kind} at index {index} ({len} available)")]
    IndexOutOfRange {
        kind: ComponentKind,
        index: usize,
        len: usize,
    },

    #[error("Invalid target '{0}': expected an index or 'all'")]
    InvalidSelection(String),

    #[error("Unknown component '{0}': expected 'mod' or 'plugin'")]
    InvalidComponent(String),

    #[error("Invalid name '{0}'")]
    InvalidName(String),

    #[error("{0}")]
    Unsupported(String),
}

/// Result type alias for modlink operations
pub type Result<T> = std::result::Result<T, ModlinkError>;
