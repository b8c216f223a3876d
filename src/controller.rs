//! Mod list controller
//!
//! Owns the ordered mod list, the plugin list and the deployment applied by
//! the last commit. In-memory mutations never touch the game directory;
//! only [`Controller::commit`] and [`Controller::clean`] do.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::component::{ComponentKind, Selection};
use crate::config::Config;
use crate::error::{ModlinkError, Result};
use crate::game::Game;
use crate::linker::{Deployment, LinkMode, Linker, SyncOptions, SyncResult};
use crate::model::{Mod, Plugin};
use crate::resolver::{self, Collision};
use crate::staging::{ArchiveStager, Stager, mod_name, scan_files};
use crate::state::{ModRecord, PluginRecord, State, StateStore};

pub struct Controller {
    game: Game,
    mods_dir: PathBuf,
    store: StateStore,
    linker: Linker,
    stager: Box<dyn Stager>,
    mods: Vec<Mod>,
    /// Every known plugin in load order, hidden ones included
    plugins: Vec<Plugin>,
    deployment: Deployment,
    last_commit: Option<DateTime<Utc>>,
}

impl Controller {
    /// Open the controller described by a configuration file
    pub fn open(config: &Config, config_path: &Path) -> Result<Self> {
        Self::load(
            config.game(config_path),
            config.mods_dir(config_path),
            StateStore::new(config.state_path(config_path)),
            config.link_mode,
        )
    }

    /// Load persisted state and reconcile it with the staging directory.
    pub fn load(
        game: Game,
        mods_dir: impl AsRef<Path>,
        store: StateStore,
        link_mode: LinkMode,
    ) -> Result<Self> {
        let mods_dir = std::path::absolute(mods_dir.as_ref()).map_err(|source| ModlinkError::Io {
            path: mods_dir.as_ref().to_path_buf(),
            source,
        })?;
        let state = store.load()?;

        let mut mods = Vec::with_capacity(state.mods.len());
        for record in state.mods {
            if !record.location.is_dir() {
                tracing::warn!(
                    name = %record.name,
                    location = %record.location.display(),
                    "Staging directory is gone, dropping mod"
                );
                continue;
            }
            let files = scan_files(&record.location)?;
            let mut m = Mod::new(record.name, record.location, files);
            m.set_active(record.active);
            mods.push(m);
        }

        for location in discover_staged(&mods_dir, &mods)? {
            let files = scan_files(&location)?;
            let name = location
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::info!(name = %name, "Found untracked staged mod");
            mods.push(Mod::new(name, location, files));
        }

        let plugins = state
            .plugins
            .into_iter()
            .map(|record| Plugin::new(record.path, record.active))
            .collect();

        let linker = Linker::new(game.directory(), link_mode);
        let mut controller = Self {
            game,
            mods_dir,
            store,
            linker,
            stager: Box::new(ArchiveStager),
            mods,
            plugins,
            deployment: state.deployment,
            last_commit: state.last_commit,
        };
        controller.refresh();
        Ok(controller)
    }

    /// Replace the staging provider used by [`Controller::install`]
    pub fn with_stager(mut self, stager: impl Stager + 'static) -> Self {
        self.stager = Box::new(stager);
        self
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    pub fn mods_dir(&self) -> &Path {
        &self.mods_dir
    }

    pub fn state_path(&self) -> &Path {
        self.store.path()
    }

    pub fn mods(&self) -> &[Mod] {
        &self.mods
    }

    /// Plugins with at least one active provider, in load order
    pub fn plugins(&self) -> Vec<&Plugin> {
        self.plugins.iter().filter(|p| p.is_visible()).collect()
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn linker(&self) -> &Linker {
        &self.linker
    }

    pub fn last_commit(&self) -> Option<DateTime<Utc>> {
        self.last_commit
    }

    /// Stage a mod and append it, inactive, to the end of the mod list.
    pub fn install(&mut self, source: &Path) -> Result<usize> {
        let name =
            mod_name(source).ok_or_else(|| ModlinkError::InvalidName(source.display().to_string()))?;
        let location = self.mods_dir.join(&name);

        self.stager.stage(source, &location)?;
        let files = scan_files(&location)?;
        tracing::info!(name = %name, files = files.len(), "Installed mod");

        self.mods.push(Mod::new(name, location, files));
        self.refresh();
        Ok(self.mods.len() - 1)
    }

    pub fn activate(&mut self, kind: ComponentKind, selection: Selection) -> Result<()> {
        self.set_active(kind, selection, true)
    }

    pub fn deactivate(&mut self, kind: ComponentKind, selection: Selection) -> Result<()> {
        self.set_active(kind, selection, false)
    }

    fn set_active(&mut self, kind: ComponentKind, selection: Selection, active: bool) -> Result<()> {
        match kind {
            ComponentKind::Mod => {
                for index in selection.indices(kind, self.mods.len())? {
                    self.mods[index].set_active(active);
                }
            }
            ComponentKind::Plugin => {
                let visible = self.visible_positions();
                for index in selection.indices(kind, visible.len())? {
                    self.plugins[visible[index]].set_active(active);
                }
            }
        }
        self.refresh();
        Ok(())
    }

    /// Move a component so it ends up at position `to` of its list.
    pub fn move_component(&mut self, kind: ComponentKind, from: usize, to: usize) -> Result<()> {
        match kind {
            ComponentKind::Mod => {
                let len = self.mods.len();
                check_index(kind, from, len)?;
                check_index(kind, to, len)?;
                let m = self.mods.remove(from);
                self.mods.insert(to, m);
            }
            ComponentKind::Plugin => {
                let visible = self.visible_positions();
                check_index(kind, from, visible.len())?;
                check_index(kind, to, visible.len())?;
                let plugin = self.plugins.remove(visible[from]);
                self.plugins.insert(visible[to], plugin);
            }
        }
        self.refresh();
        Ok(())
    }

    /// Change a mod's display name. Its staging location stays put.
    pub fn rename(&mut self, kind: ComponentKind, index: usize, name: &str) -> Result<()> {
        if kind == ComponentKind::Plugin {
            return Err(ModlinkError::Unsupported(
                "plugins are named by their file and cannot be renamed".to_string(),
            ));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(ModlinkError::InvalidName(name.to_string()));
        }
        check_index(kind, index, self.mods.len())?;
        self.mods[index].set_name(name.to_string());
        Ok(())
    }

    pub fn delete(&mut self, kind: ComponentKind, selection: Selection) -> Result<()> {
        match kind {
            ComponentKind::Mod => self.delete_mods(selection),
            ComponentKind::Plugin => self.delete_plugins(selection),
        }
    }

    fn delete_mods(&mut self, selection: Selection) -> Result<()> {
        let indices = selection.indices(ComponentKind::Mod, self.mods.len())?;

        for &index in indices.iter().rev() {
            let location = self.mods[index].location().to_path_buf();
            match fs::remove_dir_all(&location) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    self.refresh();
                    return Err(ModlinkError::Io {
                        path: location,
                        source,
                    });
                }
            }
            let removed = self.mods.remove(index);
            tracing::info!(name = %removed.name(), "Deleted mod");
        }

        self.refresh();
        Ok(())
    }

    /// Delete plugin files from every mod that ships them.
    fn delete_plugins(&mut self, selection: Selection) -> Result<()> {
        let visible = self.visible_positions();
        let indices = selection.indices(ComponentKind::Plugin, visible.len())?;
        let doomed: Vec<PathBuf> = indices
            .iter()
            .map(|&index| self.plugins[visible[index]].path().to_path_buf())
            .collect();

        for path in &doomed {
            for index in 0..self.mods.len() {
                if !self.mods[index].provides(path) {
                    continue;
                }
                let file = self.mods[index].source_of(path);
                match fs::remove_file(&file) {
                    Ok(()) => {}
                    Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => {
                        self.refresh();
                        return Err(ModlinkError::Io { path: file, source });
                    }
                }
                self.mods[index].forget_file(path);
            }
            self.plugins.retain(|p| p.path() != path.as_path());
            tracing::info!(plugin = %path.display(), "Deleted plugin");
        }

        self.refresh();
        Ok(())
    }

    /// Paths the mod at `index` shares with other active mods
    pub fn collisions(&self, index: usize) -> Result<Vec<Collision>> {
        check_index(ComponentKind::Mod, index, self.mods.len())?;
        Ok(resolver::collisions(&self.mods, index))
    }

    /// Resolve winners and converge the game directory onto them.
    ///
    /// State is saved even when linking fails partway, so the deployment
    /// always matches what is on disk.
    pub fn commit(&mut self, options: &SyncOptions) -> Result<SyncResult> {
        let winners = resolver::resolve(&self.mods)?;
        let plan: BTreeMap<PathBuf, PathBuf> = winners
            .into_iter()
            .map(|(path, entry)| (path, entry.source))
            .collect();

        if options.dry_run {
            let mut preview = self.deployment.clone();
            return Ok(self.linker.sync(&mut preview, &plan, options)?);
        }

        let result = match self.linker.sync(&mut self.deployment, &plan, options) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    path = %err.path.display(),
                    action = %err.action,
                    error = %err.source,
                    "Commit aborted"
                );
                if let Err(save_err) = self.save() {
                    tracing::error!(error = %save_err, "Failed to save partial deployment");
                }
                return Err(err.into());
            }
        };

        let written = self.game.write_plugins_file(self.plugins());
        if matches!(written, Ok(false)) && result.mutations() == 0 && self.matches_saved_state() {
            tracing::info!("Nothing to commit");
            return Ok(result);
        }
        if written.is_ok() {
            self.last_commit = Some(Utc::now());
        }
        self.save()?;
        written?;

        tracing::info!(
            created = result.created,
            updated = result.updated,
            removed = result.removed,
            skipped = result.skipped,
            "Committed"
        );
        Ok(result)
    }

    /// Remove every deployed link without touching the mod list.
    pub fn clean(&mut self, options: &SyncOptions) -> Result<SyncResult> {
        if options.dry_run {
            let mut preview = self.deployment.clone();
            return Ok(self.linker.clean(&mut preview, options)?);
        }
        let outcome = self.linker.clean(&mut self.deployment, options);
        self.save()?;
        Ok(outcome?)
    }

    /// Recompute conflict flags and plugin providers from the mod list.
    pub fn refresh(&mut self) {
        let flags = resolver::conflict_flags(&self.mods);
        for (m, conflict) in self.mods.iter_mut().zip(flags) {
            m.set_conflict(conflict);
        }

        let mut providers: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
        for m in self.mods.iter().filter(|m| m.is_active()) {
            for path in m.files().iter().filter(|p| self.game.is_plugin(p)) {
                providers
                    .entry(path.clone())
                    .or_default()
                    .insert(m.location().to_path_buf());
            }
        }

        for plugin in &mut self.plugins {
            plugin.set_providers(providers.remove(plugin.path()).unwrap_or_default());
        }
        for (path, owners) in providers {
            tracing::debug!(plugin = %path.display(), "New plugin");
            let mut plugin = Plugin::new(path, false);
            plugin.set_providers(owners);
            self.plugins.push(plugin);
        }
    }

    /// Persist the mod list, plugin list and deployment.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.snapshot())?;
        Ok(())
    }

    fn snapshot(&self) -> State {
        State {
            mods: self
                .mods
                .iter()
                .map(|m| ModRecord {
                    name: m.name().to_string(),
                    location: m.location().to_path_buf(),
                    active: m.is_active(),
                })
                .collect(),
            plugins: self
                .plugins
                .iter()
                .map(|p| PluginRecord {
                    path: p.path().to_path_buf(),
                    active: p.is_active(),
                })
                .collect(),
            deployment: self.deployment.clone(),
            last_commit: self.last_commit,
            ..State::default()
        }
    }

    /// The saved state already records this mod list, plugin order and deployment.
    fn matches_saved_state(&self) -> bool {
        let Ok(saved) = self.store.load() else {
            return false;
        };
        let current = self.snapshot();
        saved.mods == current.mods
            && saved.plugins == current.plugins
            && saved.deployment == current.deployment
    }

    fn visible_positions(&self) -> Vec<usize> {
        self.plugins
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_visible())
            .map(|(i, _)| i)
            .collect()
    }
}

fn check_index(kind: ComponentKind, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(ModlinkError::IndexOutOfRange { kind, index, len })
    }
}

/// Staging directories under `mods_dir` that no known mod claims, by name.
fn discover_staged(mods_dir: &Path, known: &[Mod]) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(mods_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ModlinkError::Io {
                path: mods_dir.to_path_buf(),
                source,
            });
        }
    };

    let claimed: HashSet<&Path> = known.iter().map(Mod::location).collect();
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ModlinkError::Io {
            path: mods_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        // leftovers from an interrupted install
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if path.is_dir() && !claimed.contains(path.as_path()) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
