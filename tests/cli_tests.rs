//! End-to-End CLI Tests for modlink
//!
//! These tests run the binary against a throwaway game directory and check
//! both the output and the resulting links.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn modlink_cmd(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("modlink").unwrap();
    cmd.current_dir(root).env_remove("MODLINK_CONFIG");
    cmd
}

/// Initialize a workspace whose game directory already has a Data folder
fn setup_workspace(temp_dir: &TempDir) -> PathBuf {
    let game = temp_dir.path().join("game");
    fs::create_dir_all(game.join("Data")).unwrap();

    modlink_cmd(temp_dir.path())
        .arg("init")
        .arg("--game")
        .arg(&game)
        .assert()
        .success();
    game
}

fn write_mod(temp_dir: &TempDir, name: &str, files: &[&str]) -> PathBuf {
    let root = temp_dir.path().join("downloads").join(name);
    for file in files {
        let path = root.join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, name).unwrap();
    }
    root
}

// =============================================================================
// INIT COMMAND TESTS
// =============================================================================

#[test]
fn test_cli_init_creates_files() {
    let temp_dir = TempDir::new().unwrap();

    modlink_cmd(temp_dir.path())
        .arg("init")
        .arg("--game")
        .arg(temp_dir.path().join("game"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialization complete"))
        .stdout(predicate::str::contains("Next steps"));

    assert!(temp_dir.path().join(".modlink/modlink.toml").exists());
    assert!(temp_dir.path().join(".modlink/mods").is_dir());
}

#[test]
fn test_cli_init_without_force_warns_existing() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(&temp_dir);

    modlink_cmd(temp_dir.path())
        .arg("init")
        .arg("--game")
        .arg(temp_dir.path().join("game"))
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_cli_without_config_fails() {
    let temp_dir = TempDir::new().unwrap();

    modlink_cmd(temp_dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not find modlink.toml"));
}

// =============================================================================
// MOD MANAGEMENT TESTS
// =============================================================================

#[test]
fn test_cli_install_and_list() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(&temp_dir);
    let source = write_mod(&temp_dir, "conflict_1", &["Data/mock_plugin.esp", "file.dll"]);

    modlink_cmd(temp_dir.path())
        .arg("install")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed conflict_1 at index 0"));

    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "0"])
        .assert()
        .success();

    modlink_cmd(temp_dir.path())
        .args(["list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"conflict_1\""))
        .stdout(predicate::str::contains("\"active\": true"))
        .stdout(predicate::str::contains("mock_plugin.esp"));
}

#[test]
fn test_cli_rejects_bad_targets() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(&temp_dir);

    modlink_cmd(temp_dir.path())
        .args(["activate", "widget", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("widget"));

    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No mod at index 3"));

    modlink_cmd(temp_dir.path())
        .args(["rename", "plugin", "0", "x"])
        .assert()
        .failure();
}

#[test]
fn test_cli_collisions_reports_shared_files() {
    let temp_dir = TempDir::new().unwrap();
    setup_workspace(&temp_dir);
    for name in ["conflict_1", "conflict_2"] {
        let source = write_mod(&temp_dir, name, &["file.dll"]);
        modlink_cmd(temp_dir.path())
            .arg("install")
            .arg(&source)
            .assert()
            .success();
    }
    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "all"])
        .assert()
        .success();

    modlink_cmd(temp_dir.path())
        .args(["collisions", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file.dll"))
        .stdout(predicate::str::contains("lost to conflict_2"));
}

// =============================================================================
// DEPLOYMENT TESTS
// =============================================================================

#[test]
#[cfg(unix)]
fn test_cli_commit_links_winner_and_status_is_clean() {
    let temp_dir = TempDir::new().unwrap();
    let game = setup_workspace(&temp_dir);
    for name in ["conflict_1", "conflict_2"] {
        let source = write_mod(&temp_dir, name, &["Data/mock_plugin.esp", "file.dll"]);
        modlink_cmd(temp_dir.path())
            .arg("install")
            .arg(&source)
            .assert()
            .success();
    }
    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "all"])
        .assert()
        .success();

    modlink_cmd(temp_dir.path())
        .arg("commit")
        .assert()
        .success()
        .stdout(predicate::str::contains("Commit complete"))
        .stdout(predicate::str::contains("Created: "));

    assert_eq!(fs::read_to_string(game.join("file.dll")).unwrap(), "conflict_2");

    modlink_cmd(temp_dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("All good"));

    modlink_cmd(temp_dir.path())
        .args(["move", "mod", "1", "0"])
        .assert()
        .success();
    modlink_cmd(temp_dir.path())
        .arg("commit")
        .assert()
        .success();

    assert_eq!(fs::read_to_string(game.join("file.dll")).unwrap(), "conflict_1");
}

#[test]
#[cfg(unix)]
fn test_cli_status_detects_drift() {
    let temp_dir = TempDir::new().unwrap();
    let game = setup_workspace(&temp_dir);
    let source = write_mod(&temp_dir, "normal_mod", &["normal.dll"]);
    modlink_cmd(temp_dir.path())
        .arg("install")
        .arg(&source)
        .assert()
        .success();
    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "0"])
        .assert()
        .success();
    modlink_cmd(temp_dir.path()).arg("commit").assert().success();

    fs::remove_file(game.join("normal.dll")).unwrap();

    modlink_cmd(temp_dir.path())
        .arg("status")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Missing"));

    // the next commit repairs it
    modlink_cmd(temp_dir.path()).arg("commit").assert().success();
    assert!(game.join("normal.dll").exists());
}

#[test]
fn test_cli_commit_dry_run_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let game = setup_workspace(&temp_dir);
    let source = write_mod(&temp_dir, "normal_mod", &["normal.dll"]);
    modlink_cmd(temp_dir.path())
        .arg("install")
        .arg(&source)
        .assert()
        .success();
    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "0"])
        .assert()
        .success();

    modlink_cmd(temp_dir.path())
        .args(["commit", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dry run"));

    assert!(!game.join("normal.dll").exists());
}

#[test]
#[cfg(unix)]
fn test_cli_clean_removes_links() {
    let temp_dir = TempDir::new().unwrap();
    let game = setup_workspace(&temp_dir);
    let source = write_mod(&temp_dir, "normal_mod", &["Data/textures/normal.nif"]);
    modlink_cmd(temp_dir.path())
        .arg("install")
        .arg(&source)
        .assert()
        .success();
    modlink_cmd(temp_dir.path())
        .args(["activate", "mod", "all"])
        .assert()
        .success();
    modlink_cmd(temp_dir.path()).arg("commit").assert().success();
    assert!(game.join("Data/textures/normal.nif").is_symlink());

    modlink_cmd(temp_dir.path())
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("Clean complete"));

    assert!(!game.join("Data/textures").exists());
    assert!(game.join("Data").is_dir());
}
