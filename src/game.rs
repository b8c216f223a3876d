//! Game target
//!
//! The game root receives every link; the data subdirectory is where the
//! game looks for plugins.

use std::fs;
use std::path::{Path, PathBuf};

use crate::model::Plugin;
use crate::state::PersistenceError;

#[derive(Debug, Clone)]
pub struct Game {
    directory: PathBuf,
    data_dir: PathBuf,
    plugin_extensions: Vec<String>,
    plugins_file: Option<PathBuf>,
}

impl Game {
    pub fn new(directory: impl Into<PathBuf>, data_dir: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.into(),
            data_dir: data_dir.as_ref().to_path_buf(),
            plugin_extensions: vec!["esp".into(), "esm".into(), "esl".into()],
            plugins_file: None,
        }
    }

    pub fn with_plugin_extensions(mut self, extensions: &[String]) -> Self {
        self.plugin_extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn with_plugins_file(mut self, plugins_file: Option<PathBuf>) -> Self {
        self.plugins_file = plugins_file;
        self
    }

    /// Game root; nothing is ever written outside it except the plugins file
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Data subdirectory, relative to the game root
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Absolute data directory
    pub fn data(&self) -> PathBuf {
        self.directory.join(&self.data_dir)
    }

    pub fn plugins_file(&self) -> Option<&Path> {
        self.plugins_file.as_deref()
    }

    /// A plugin sits directly in the data directory and carries a plugin extension.
    pub fn is_plugin(&self, relative: &Path) -> bool {
        if relative.parent() != Some(self.data_dir.as_path()) {
            return false;
        }
        relative
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.plugin_extensions.contains(&ext))
    }

    /// Rewrite the load-order file, one line per listed plugin, `*` marking active ones.
    ///
    /// Returns `false` when the file already had this content and was left alone.
    pub fn write_plugins_file<'a>(
        &self,
        plugins: impl IntoIterator<Item = &'a Plugin>,
    ) -> Result<bool, PersistenceError> {
        let Some(path) = &self.plugins_file else {
            return Ok(false);
        };

        let mut content = String::new();
        for plugin in plugins {
            if plugin.is_active() {
                content.push('*');
            }
            content.push_str(&plugin.name());
            content.push('\n');
        }
        if fs::read_to_string(path).is_ok_and(|existing| existing == content) {
            return Ok(false);
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| PersistenceError::Write {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Wrote plugins file");
        Ok(true)
    }
}
