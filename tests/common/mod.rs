//! Shared fixtures for integration tests
//!
//! Builds a throwaway game directory, staging directory and the mock mods
//! `conflict_1`, `conflict_2` (identical file sets) and `normal_mod`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use modlink::game::Game;
use modlink::state::StateStore;
use modlink::{ComponentKind, Controller, LinkMode, Selection, SyncOptions};

/// Files shipped by both conflicting mods
pub const CONFLICT_FILES: [&str; 3] = [
    "Data/textures/mock_texture.nif",
    "Data/mock_plugin.esp",
    "file.dll",
];

pub const NORMAL_FILES: [&str; 2] = ["Data/normal_plugin.esp", "normal.dll"];

pub struct Harness {
    pub temp: TempDir,
    pub controller: Controller,
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("game/Data")).unwrap();
        let controller = open_controller(temp.path());
        Self { temp, controller }
    }

    /// A second controller over the same game, staging and state
    pub fn reopen(&self) -> Controller {
        open_controller(self.temp.path())
    }

    pub fn game_dir(&self) -> PathBuf {
        self.temp.path().join("game")
    }

    /// Write the downloadable source of a mock mod
    pub fn fixture(&self, name: &str) -> PathBuf {
        let files: &[&str] = match name {
            "conflict_1" | "conflict_2" => &CONFLICT_FILES,
            "normal_mod" => &NORMAL_FILES,
            other => panic!("unknown fixture {other}"),
        };
        let root = self.temp.path().join("downloads").join(name);
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, format!("{name}:{file}")).unwrap();
        }
        root
    }

    /// Stage a mock mod without activating it
    pub fn extract_mod(&mut self, name: &str) -> usize {
        let source = self.fixture(name);
        self.controller.install(&source).unwrap()
    }

    /// Stage, activate and commit a mock mod
    pub fn install_mod(&mut self, name: &str) -> usize {
        let index = self.extract_mod(name);
        self.controller
            .activate(ComponentKind::Mod, Selection::Index(index))
            .unwrap();
        self.commit();
        index
    }

    pub fn commit(&mut self) {
        self.controller.commit(&SyncOptions::default()).unwrap();
    }

    pub fn index_of(&self, name: &str) -> usize {
        self.controller
            .mods()
            .iter()
            .position(|m| m.name() == name)
            .unwrap_or_else(|| panic!("mod {name} not installed"))
    }

    pub fn conflict_of(&self, name: &str) -> bool {
        self.controller.mods()[self.index_of(name)].has_conflict()
    }
}

fn open_controller(root: &Path) -> Controller {
    let game = Game::new(root.join("game"), "Data");
    Controller::load(
        game,
        root.join("mods"),
        StateStore::new(root.join("state.json")),
        LinkMode::Auto,
    )
    .unwrap()
}

/// Assert `game_file` resolves to `mod_file`, by symlink target or shared inode.
#[cfg(unix)]
pub fn assert_links_to(game_file: &Path, mod_file: &Path) {
    use std::os::unix::fs::MetadataExt;

    if game_file.is_symlink() {
        assert_eq!(fs::read_link(game_file).unwrap(), mod_file);
    } else {
        let expected = fs::metadata(mod_file).unwrap();
        let actual = fs::metadata(game_file).unwrap();
        assert_eq!(
            (actual.dev(), actual.ino()),
            (expected.dev(), expected.ino()),
            "{} is not a hard link to {}",
            game_file.display(),
            mod_file.display()
        );
    }
}
