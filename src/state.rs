//! Persisted controller state
//!
//! The mod list, plugin order and the deployment applied by the last commit
//! are stored together as one JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::linker::Deployment;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize state: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("{} has state version {found}, expected {expected}", path.display())]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub version: u32,
    #[serde(default)]
    pub mods: Vec<ModRecord>,
    #[serde(default)]
    pub plugins: Vec<PluginRecord>,
    #[serde(default)]
    pub deployment: Deployment,
    #[serde(default)]
    pub last_commit: Option<DateTime<Utc>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            mods: Vec::new(),
            plugins: Vec::new(),
            deployment: Deployment::default(),
            last_commit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModRecord {
    pub name: String,
    pub location: PathBuf,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    pub path: PathBuf,
    #[serde(default)]
    pub active: bool,
}

/// Reads and writes [`State`] at a fixed path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state, or an empty one when nothing was saved yet.
    pub fn load(&self) -> Result<State, PersistenceError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(State::default()),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let state: State = serde_json::from_str(&raw).map_err(|source| PersistenceError::Parse {
            path: self.path.clone(),
            source,
        })?;
        if state.version != STATE_VERSION {
            return Err(PersistenceError::Version {
                path: self.path.clone(),
                found: state.version,
                expected: STATE_VERSION,
            });
        }
        Ok(state)
    }

    /// Write the state through a temporary file so a crash never leaves a torn file.
    pub fn save(&self, state: &State) -> Result<(), PersistenceError> {
        let write_err = |source| PersistenceError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let raw = serde_json::to_string_pretty(state).map_err(PersistenceError::Serialize)?;
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, raw).map_err(write_err)?;
        fs::rename(&temp, &self.path).map_err(write_err)?;
        Ok(())
    }
}
