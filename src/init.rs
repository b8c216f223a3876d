//! Workspace initialization for the init command
//!
//! Creates `.modlink/` with a configuration file pointing at the game and an
//! empty staging directory.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{CONFIG_FILE_NAME, Config, DEFAULT_CONFIG_DIR};

/// Initialize a new configuration in the given directory.
///
/// Returns the path of the configuration file.
pub fn init(root: &Path, game_dir: &Path, data_dir: &str, force: bool) -> Result<PathBuf> {
    let modlink_dir = root.join(DEFAULT_CONFIG_DIR);
    let config_path = modlink_dir.join(CONFIG_FILE_NAME);

    if !modlink_dir.exists() {
        fs::create_dir_all(&modlink_dir)
            .with_context(|| format!("Failed to create directory: {}", modlink_dir.display()))?;
        println!(
            "  {} Created directory: {}",
            "✔".green(),
            modlink_dir.display()
        );
    }

    let mods_dir = modlink_dir.join("mods");
    if !mods_dir.exists() {
        fs::create_dir_all(&mods_dir)
            .with_context(|| format!("Failed to create directory: {}", mods_dir.display()))?;
        println!("  {} Created directory: {}", "✔".green(), mods_dir.display());
    }

    if config_path.exists() && !force {
        println!(
            "  {} Config already exists: {} (use --force to overwrite)",
            "!".yellow(),
            config_path.display()
        );
    } else {
        fs::write(&config_path, Config::render_default(game_dir, data_dir))
            .with_context(|| format!("Failed to write config: {}", config_path.display()))?;
        println!("  {} Created: {}", "✔".green(), config_path.display());
    }

    if !game_dir.is_dir() {
        println!(
            "  {} Game directory does not exist yet: {}",
            "!".yellow(),
            game_dir.display()
        );
    }

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let temp_dir = TempDir::new().unwrap();
        let game_dir = temp_dir.path().join("Skyrim Special Edition");
        fs::create_dir_all(&game_dir).unwrap();

        let config_path = init(temp_dir.path(), &game_dir, "Data", false).unwrap();

        assert!(temp_dir.path().join(".modlink/mods").is_dir());
        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.game.directory, game_dir);
        assert_eq!(config.game.data_dir, "Data");
    }

    #[test]
    fn test_init_keeps_existing_config_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(".modlink/modlink.toml");
        fs::create_dir_all(config_path.parent().unwrap()).unwrap();
        fs::write(&config_path, "# mine").unwrap();

        init(temp_dir.path(), Path::new("/games/x"), "Data", false).unwrap();
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "# mine");

        init(temp_dir.path(), Path::new("/games/x"), "Data", true).unwrap();
        assert_ne!(fs::read_to_string(&config_path).unwrap(), "# mine");
    }
}
