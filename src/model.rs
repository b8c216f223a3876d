//! Mods, plugins and the entries they provide

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A staged mod and its position-independent state.
///
/// The staging `location` is the mod's identity; the display `name` may
/// change at any time. `conflict` is derived and only written by
/// [`crate::resolver::conflict_flags`] through the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mod {
    name: String,
    location: PathBuf,
    files: BTreeSet<PathBuf>,
    active: bool,
    conflict: bool,
}

impl Mod {
    /// Create an inactive mod from an already-staged directory
    pub fn new(name: impl Into<String>, location: impl Into<PathBuf>, files: BTreeSet<PathBuf>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            files,
            active: false,
            conflict: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Relative paths this mod places into the game directory
    pub fn files(&self) -> &BTreeSet<PathBuf> {
        &self.files
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn has_conflict(&self) -> bool {
        self.conflict
    }

    pub fn provides(&self, path: &Path) -> bool {
        self.files.contains(path)
    }

    /// Absolute path of the staged file backing `relative`
    pub fn source_of(&self, relative: &Path) -> PathBuf {
        self.location.join(relative)
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn set_conflict(&mut self, conflict: bool) {
        self.conflict = conflict;
    }

    pub(crate) fn forget_file(&mut self, relative: &Path) -> bool {
        self.files.remove(relative)
    }
}

/// A plugin file and its slot in the plugin load order.
///
/// Identity is the relative path. A plugin is listed only while at least one
/// active mod provides it; hidden plugins keep their position and flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    path: PathBuf,
    active: bool,
    providers: BTreeSet<PathBuf>,
}

impl Plugin {
    pub fn new(path: impl Into<PathBuf>, active: bool) -> Self {
        Self {
            path: path.into(),
            active,
            providers: BTreeSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name as written to the plugin load-order file
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Staging locations of the active mods currently exposing this plugin
    pub fn providers(&self) -> &BTreeSet<PathBuf> {
        &self.providers
    }

    pub fn is_visible(&self) -> bool {
        !self.providers.is_empty()
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn set_providers(&mut self, providers: BTreeSet<PathBuf>) {
        self.providers = providers;
    }
}

/// One resolved placement: a relative path and the mod that wins it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub path: PathBuf,
    /// Index of the winning mod in the mod list
    pub provider: usize,
    /// Staged file the game path should resolve to
    pub source: PathBuf,
}
