//! Configuration parsing for modlink
//!
//! Handles the TOML file that tells modlink where the game lives, where
//! mods are staged and how links are created.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::game::Game;
use crate::linker::LinkMode;

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "modlink.toml";

/// Directory holding the config, staged mods and state
pub const DEFAULT_CONFIG_DIR: &str = ".modlink";

/// Root configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Directory where mods are staged (relative to config file)
    #[serde(default = "default_mods_dir")]
    pub mods_dir: String,

    /// File holding the mod list, plugin list and deployment (relative to config file)
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// How game paths are linked to staged files
    #[serde(default)]
    pub link_mode: LinkMode,

    /// Game location
    pub game: GameConfig,
}

fn default_mods_dir() -> String {
    "mods".to_string()
}

fn default_state_file() -> String {
    "state.json".to_string()
}

/// Where the game is installed and how its plugins are recognized
#[derive(Debug, Deserialize)]
pub struct GameConfig {
    /// Game root directory; every link is created below it
    pub directory: PathBuf,

    /// Subdirectory holding plugins (relative to the game directory)
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// File extensions that mark a data file as a plugin
    #[serde(default = "default_plugin_extensions")]
    pub plugin_extensions: Vec<String>,

    /// Load-order file rewritten on every commit
    #[serde(default)]
    pub plugins_file: Option<PathBuf>,
}

fn default_data_dir() -> String {
    "Data".to_string()
}

fn default_plugin_extensions() -> Vec<String> {
    vec!["esp".to_string(), "esm".to_string(), "esl".to_string()]
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        if config.game.data_dir.trim().is_empty() {
            anyhow::bail!("game.data_dir must not be empty in {}", path.display());
        }

        Ok(config)
    }

    /// Find configuration file by searching up from a directory
    pub fn find_config(start_dir: &Path) -> Result<PathBuf> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(DEFAULT_CONFIG_DIR).join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Ok(config_path);
            }

            let root_config = current.join(CONFIG_FILE_NAME);
            if root_config.exists() {
                return Ok(root_config);
            }

            if !current.pop() {
                anyhow::bail!(
                    "Could not find {} in {} or any parent directory",
                    CONFIG_FILE_NAME,
                    start_dir.display()
                );
            }
        }
    }

    /// Directory relative paths in the config are resolved against
    pub fn base_dir(config_path: &Path) -> PathBuf {
        config_path.parent().unwrap_or(config_path).to_path_buf()
    }

    /// Get the staging directory for installed mods
    pub fn mods_dir(&self, config_path: &Path) -> PathBuf {
        Self::base_dir(config_path).join(&self.mods_dir)
    }

    /// Get the state file path
    pub fn state_path(&self, config_path: &Path) -> PathBuf {
        Self::base_dir(config_path).join(&self.state_file)
    }

    /// Build the game target described by this configuration
    pub fn game(&self, config_path: &Path) -> Game {
        let base = Self::base_dir(config_path);
        let directory = base.join(&self.game.directory);
        let plugins_file = self.game.plugins_file.as_ref().map(|p| base.join(p));

        Game::new(directory, &self.game.data_dir)
            .with_plugin_extensions(&self.game.plugin_extensions)
            .with_plugins_file(plugins_file)
    }

    /// Render the configuration file written by `modlink init`
    pub fn render_default(game_dir: &Path, data_dir: &str) -> String {
        format!(
            r#"# modlink configuration
# Relative paths are resolved against the directory holding this file.

# Where installed mods are staged
mods_dir = "{mods_dir}"

# Mod list, plugin order and the links applied by the last commit
state_file = "{state_file}"

# "auto" tries symbolic links and falls back to hard links,
# "symlink" and "hardlink" force one kind
link_mode = "auto"

[game]
directory = {directory}
data_dir = {data_dir}
plugin_extensions = ["esp", "esm", "esl"]
# Load-order file rewritten on every commit:
# plugins_file = "/path/to/Plugins.txt"
"#,
            mods_dir = default_mods_dir(),
            state_file = default_state_file(),
            directory = toml_string(&game_dir.display().to_string()),
            data_dir = toml_string(data_dir),
        )
    }
}

fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}
