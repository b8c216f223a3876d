//! Link creation and management
//!
//! Converges the game directory onto a winner mapping. The [`Deployment`]
//! records what the previous sync applied, so stale links can be removed
//! without rescanning the game directory.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::fs::is_empty_dir;

/// How game paths are linked to staged files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// Symbolic link, falling back to a hard link when the filesystem refuses
    #[default]
    Auto,
    Symlink,
    Hardlink,
}

/// Kind of link actually placed on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkKind {
    Symlink,
    Hardlink,
}

impl LinkKind {
    pub fn label(self) -> &'static str {
        match self {
            LinkKind::Symlink => "symlink",
            LinkKind::Hardlink => "hardlink",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedLink {
    pub source: PathBuf,
    pub kind: LinkKind,
}

/// Everything a sync placed in the game directory, keyed by relative path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    #[serde(default)]
    pub links: BTreeMap<PathBuf, DeployedLink>,
    /// Directories created to host links; only these are ever pruned
    #[serde(default)]
    pub directories: BTreeSet<PathBuf>,
    /// Pre-existing files moved aside, keyed by the path they occupied
    #[serde(default)]
    pub backups: BTreeMap<PathBuf, PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkAction {
    Inspect,
    Link,
    Unlink,
    CreateDirectory,
    RemoveDirectory,
    Backup,
    Restore,
}

impl fmt::Display for LinkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkAction::Inspect => "inspect",
            LinkAction::Link => "link",
            LinkAction::Unlink => "unlink",
            LinkAction::CreateDirectory => "create directory",
            LinkAction::RemoveDirectory => "remove directory",
            LinkAction::Backup => "back up",
            LinkAction::Restore => "restore",
        })
    }
}

/// A single filesystem operation failed; earlier operations stay applied.
#[derive(Debug, Error)]
#[error("failed to {action} {}: {source}", path.display())]
pub struct LinkApplyError {
    pub path: PathBuf,
    pub action: LinkAction,
    #[source]
    pub source: io::Error,
}

impl LinkApplyError {
    fn new(path: &Path, action: LinkAction) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| LinkApplyError {
            path: path.to_path_buf(),
            action,
            source,
        }
    }
}

/// Options for the sync operation
#[derive(Debug, Default)]
pub struct SyncOptions {
    /// Report what would change without touching the filesystem
    pub dry_run: bool,
}

/// Result of a sync operation
#[derive(Debug, Default)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub removed: usize,
    pub backed_up: usize,
    pub restored: usize,
    pub kinds: BTreeSet<LinkKind>,
}

impl SyncResult {
    /// Number of filesystem changes made (or planned, on a dry run)
    pub fn mutations(&self) -> usize {
        self.created + self.updated + self.removed + self.backed_up + self.restored
    }

    pub fn link_mode_summary(&self) -> &'static str {
        let mut kinds = self.kinds.iter();
        match (kinds.next(), kinds.next()) {
            (None, _) => "none",
            (Some(kind), None) => kind.label(),
            (Some(_), Some(_)) => "mixed",
        }
    }
}

/// On-disk condition of one deployed link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkHealth {
    Ok,
    Missing,
    /// Something other than the expected link occupies the path
    Drifted(String),
}

#[derive(Debug, Clone)]
pub struct LinkCheck {
    pub path: PathBuf,
    pub link: DeployedLink,
    pub health: LinkHealth,
}

#[derive(Debug)]
enum Action {
    Keep(PathBuf, DeployedLink),
    Create(PathBuf, PathBuf),
    Replace(PathBuf, PathBuf),
    BackupAndCreate(PathBuf, PathBuf),
}

enum Existing {
    Missing,
    Correct(LinkKind),
    Directory,
    Other,
}

/// Applies winner mappings to a game directory
pub struct Linker {
    game_dir: PathBuf,
    mode: LinkMode,
}

impl Linker {
    pub fn new(game_dir: impl Into<PathBuf>, mode: LinkMode) -> Self {
        Self {
            game_dir: game_dir.into(),
            mode,
        }
    }

    pub fn game_dir(&self) -> &Path {
        &self.game_dir
    }

    /// Converge the game directory onto `plan` (relative path → staged source).
    ///
    /// Stale links go first, so a path that turns from a file into a
    /// directory (or back) is free by the time it is inspected.
    /// `deployment` is updated after every applied operation, so on error it
    /// still describes the disk exactly.
    pub fn sync(
        &self,
        deployment: &mut Deployment,
        plan: &BTreeMap<PathBuf, PathBuf>,
        options: &SyncOptions,
    ) -> Result<SyncResult, LinkApplyError> {
        let stale: BTreeSet<PathBuf> = deployment
            .links
            .keys()
            .filter(|path| !plan.contains_key(*path))
            .cloned()
            .collect();
        let mut result = SyncResult::default();

        for path in &stale {
            if options.dry_run {
                tracing::info!(path = %path.display(), "Would remove link");
            } else {
                self.remove_link(deployment, path, &mut result)?;
            }
            result.removed += 1;
        }

        // on a dry run the stale links are still on disk
        let pending = if options.dry_run { stale } else { BTreeSet::new() };
        let actions = self.plan_actions(deployment, plan, &pending)?;

        for action in actions {
            if options.dry_run {
                self.tally(&action, &mut result);
                log_dry_run(&action);
                continue;
            }
            self.apply(deployment, action, &mut result)?;
        }

        Ok(result)
    }

    /// Remove every deployed link and restore backed-up files
    pub fn clean(
        &self,
        deployment: &mut Deployment,
        options: &SyncOptions,
    ) -> Result<SyncResult, LinkApplyError> {
        self.sync(deployment, &BTreeMap::new(), options)
    }

    /// Check each deployed link against the disk without changing anything
    pub fn verify(&self, deployment: &Deployment) -> Vec<LinkCheck> {
        deployment
            .links
            .iter()
            .map(|(path, link)| {
                let dest = self.game_dir.join(path);
                let health = match self.inspect(&dest, &link.source) {
                    Ok(Existing::Missing) => LinkHealth::Missing,
                    Ok(Existing::Correct(_)) => LinkHealth::Ok,
                    Ok(Existing::Directory) => {
                        LinkHealth::Drifted("replaced by a directory".to_string())
                    }
                    Ok(Existing::Other) => describe_drift(&dest),
                    Err(err) => LinkHealth::Drifted(err.to_string()),
                };
                LinkCheck {
                    path: path.clone(),
                    link: link.clone(),
                    health,
                }
            })
            .collect()
    }

    /// `pending` holds stale links not yet removed; whatever they block counts as free.
    fn plan_actions(
        &self,
        deployment: &Deployment,
        plan: &BTreeMap<PathBuf, PathBuf>,
        pending: &BTreeSet<PathBuf>,
    ) -> Result<Vec<Action>, LinkApplyError> {
        let mut actions = Vec::with_capacity(plan.len());

        for (path, source) in plan {
            fs::metadata(source).map_err(LinkApplyError::new(source, LinkAction::Inspect))?;

            let dest = self.game_dir.join(path);
            let tracked = deployment.links.get(path);
            let existing = match self.inspect(&dest, source) {
                Ok(Existing::Directory)
                    if deployment.directories.contains(path)
                        && pending.iter().any(|p| p.starts_with(path)) =>
                {
                    Existing::Missing
                }
                Ok(Existing::Directory) => {
                    return Err(LinkApplyError {
                        path: dest,
                        action: LinkAction::Link,
                        source: io::Error::other("destination exists as a directory"),
                    });
                }
                Err(err)
                    if err.source.kind() == io::ErrorKind::NotADirectory
                        && path.ancestors().skip(1).any(|a| pending.contains(a)) =>
                {
                    Existing::Missing
                }
                other => other?,
            };
            let action = match existing {
                Existing::Correct(kind) => Action::Keep(
                    path.clone(),
                    DeployedLink {
                        source: source.clone(),
                        kind,
                    },
                ),
                Existing::Missing if tracked.is_some() => {
                    Action::Replace(path.clone(), source.clone())
                }
                Existing::Missing => Action::Create(path.clone(), source.clone()),
                Existing::Other if tracked.is_some() => {
                    Action::Replace(path.clone(), source.clone())
                }
                Existing::Other | Existing::Directory => {
                    Action::BackupAndCreate(path.clone(), source.clone())
                }
            };
            actions.push(action);
        }

        Ok(actions)
    }

    fn inspect(&self, dest: &Path, source: &Path) -> Result<Existing, LinkApplyError> {
        let meta = match fs::symlink_metadata(dest) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Existing::Missing),
            Err(err) => return Err(LinkApplyError::new(dest, LinkAction::Inspect)(err)),
        };

        if meta.file_type().is_symlink() {
            let target = fs::read_link(dest).map_err(LinkApplyError::new(dest, LinkAction::Inspect))?;
            return Ok(if target == source {
                Existing::Correct(LinkKind::Symlink)
            } else {
                Existing::Other
            });
        }

        if meta.is_dir() {
            return Ok(Existing::Directory);
        }

        Ok(if same_inode(dest, source) {
            Existing::Correct(LinkKind::Hardlink)
        } else {
            Existing::Other
        })
    }

    fn tally(&self, action: &Action, result: &mut SyncResult) {
        match action {
            Action::Keep(_, link) => {
                result.skipped += 1;
                result.kinds.insert(link.kind);
            }
            Action::Create(..) => result.created += 1,
            Action::Replace(..) => result.updated += 1,
            Action::BackupAndCreate(..) => {
                result.backed_up += 1;
                result.created += 1;
            }
        }
    }

    fn apply(
        &self,
        deployment: &mut Deployment,
        action: Action,
        result: &mut SyncResult,
    ) -> Result<(), LinkApplyError> {
        match action {
            Action::Keep(path, link) => {
                result.kinds.insert(link.kind);
                deployment.links.insert(path, link);
                result.skipped += 1;
            }
            Action::Create(path, source) => {
                let kind = self.create_link(deployment, &path, &source)?;
                result.kinds.insert(kind);
                result.created += 1;
            }
            Action::Replace(path, source) => {
                if self.release(deployment, &path)? {
                    self.backup(deployment, &path)?;
                    result.backed_up += 1;
                }
                let kind = self.create_link(deployment, &path, &source)?;
                result.kinds.insert(kind);
                result.updated += 1;
            }
            Action::BackupAndCreate(path, source) => {
                self.backup(deployment, &path)?;
                result.backed_up += 1;
                let kind = self.create_link(deployment, &path, &source)?;
                result.kinds.insert(kind);
                result.created += 1;
            }
        }
        Ok(())
    }

    fn create_link(
        &self,
        deployment: &mut Deployment,
        path: &Path,
        source: &Path,
    ) -> Result<LinkKind, LinkApplyError> {
        self.ensure_parent(deployment, path)?;
        let dest = self.game_dir.join(path);
        let link_err = LinkApplyError::new(&dest, LinkAction::Link);

        let kind = match self.mode {
            LinkMode::Symlink => {
                create_symlink(source, &dest).map_err(link_err)?;
                LinkKind::Symlink
            }
            LinkMode::Hardlink => {
                fs::hard_link(source, &dest).map_err(link_err)?;
                LinkKind::Hardlink
            }
            LinkMode::Auto => match create_symlink(source, &dest) {
                Ok(()) => LinkKind::Symlink,
                Err(err) => {
                    tracing::debug!(
                        path = %dest.display(),
                        error = %err,
                        "Symlink refused, falling back to hard link"
                    );
                    fs::hard_link(source, &dest).map_err(link_err)?;
                    LinkKind::Hardlink
                }
            },
        };

        tracing::debug!(
            path = %path.display(),
            source = %source.display(),
            kind = kind.label(),
            "Linked"
        );
        deployment.links.insert(
            path.to_path_buf(),
            DeployedLink {
                source: source.to_path_buf(),
                kind,
            },
        );
        Ok(kind)
    }

    fn remove_link(
        &self,
        deployment: &mut Deployment,
        path: &Path,
        result: &mut SyncResult,
    ) -> Result<(), LinkApplyError> {
        let occupied = self.release(deployment, path)?;

        if let Some(backup) = deployment.backups.get(path).cloned() {
            let backup_path = self.game_dir.join(&backup);
            if occupied {
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup_path.display(),
                    "Path is in use, leaving backup in place"
                );
            } else {
                let dest = self.game_dir.join(path);
                fs::rename(&backup_path, &dest)
                    .map_err(LinkApplyError::new(&backup_path, LinkAction::Restore))?;
                result.restored += 1;
                tracing::info!(path = %path.display(), "Restored original file");
            }
            deployment.backups.remove(path);
        }

        self.prune(deployment, path)
    }

    /// Stop tracking `path`, unlinking it only if our link is still there.
    ///
    /// Returns `true` when something else now occupies the path.
    fn release(&self, deployment: &mut Deployment, path: &Path) -> Result<bool, LinkApplyError> {
        let dest = self.game_dir.join(path);
        let Some(link) = deployment.links.get(path) else {
            return Ok(false);
        };

        let meta = match fs::symlink_metadata(&dest) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                deployment.links.remove(path);
                return Ok(false);
            }
            Err(err) => return Err(LinkApplyError::new(&dest, LinkAction::Inspect)(err)),
        };

        let ours = if meta.is_dir() {
            false
        } else if meta.file_type().is_symlink() {
            fs::read_link(&dest).map_err(LinkApplyError::new(&dest, LinkAction::Inspect))?
                == link.source
        } else {
            link.kind == LinkKind::Hardlink && hardlink_is_ours(&dest, &link.source)
        };

        if ours {
            fs::remove_file(&dest).map_err(LinkApplyError::new(&dest, LinkAction::Unlink))?;
            tracing::debug!(path = %path.display(), "Removed link");
        } else {
            tracing::warn!(path = %dest.display(), "Deployed link was replaced on disk, leaving it");
        }
        deployment.links.remove(path);
        Ok(!ours)
    }

    fn backup(&self, deployment: &mut Deployment, path: &Path) -> Result<(), LinkApplyError> {
        let dest = self.game_dir.join(path);
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let mut backup = PathBuf::from(format!("{}.modlink-bak.{stamp}", path.display()));
        let mut attempt = 1;
        while fs::symlink_metadata(self.game_dir.join(&backup)).is_ok() {
            backup = PathBuf::from(format!("{}.modlink-bak.{stamp}.{attempt}", path.display()));
            attempt += 1;
        }

        fs::rename(&dest, self.game_dir.join(&backup))
            .map_err(LinkApplyError::new(&dest, LinkAction::Backup))?;
        tracing::info!(
            path = %path.display(),
            backup = %backup.display(),
            "Backed up existing file"
        );
        // the first backup holds the original game file and is the one restored
        if let Some(first) = deployment.backups.get(path) {
            tracing::warn!(
                path = %path.display(),
                restoring = %first.display(),
                "Path already has a backup, the new one is not restored"
            );
        } else {
            deployment.backups.insert(path.to_path_buf(), backup);
        }
        Ok(())
    }

    /// Create missing ancestors of `path`, remembering which ones were new.
    fn ensure_parent(&self, deployment: &mut Deployment, path: &Path) -> Result<(), LinkApplyError> {
        // the game root is never owned, so it is never pruned
        if fs::symlink_metadata(&self.game_dir).is_err() {
            fs::create_dir_all(&self.game_dir)
                .map_err(LinkApplyError::new(&self.game_dir, LinkAction::CreateDirectory))?;
        }

        let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };

        let mut missing = Vec::new();
        let mut current = Some(parent);
        while let Some(dir) = current.filter(|d| !d.as_os_str().is_empty()) {
            if fs::symlink_metadata(self.game_dir.join(dir)).is_ok() {
                break;
            }
            missing.push(dir.to_path_buf());
            current = dir.parent();
        }
        if missing.is_empty() {
            return Ok(());
        }

        let abs = self.game_dir.join(parent);
        fs::create_dir_all(&abs).map_err(LinkApplyError::new(&abs, LinkAction::CreateDirectory))?;
        deployment.directories.extend(missing);
        Ok(())
    }

    /// Remove owned directories left empty above `path`.
    fn prune(&self, deployment: &mut Deployment, path: &Path) -> Result<(), LinkApplyError> {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir.as_os_str().is_empty() || !deployment.directories.contains(dir) {
                break;
            }
            let abs = self.game_dir.join(dir);
            match is_empty_dir(&abs) {
                Ok(true) => {
                    fs::remove_dir(&abs)
                        .map_err(LinkApplyError::new(&abs, LinkAction::RemoveDirectory))?;
                    deployment.directories.remove(dir);
                }
                Ok(false) => break,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    deployment.directories.remove(dir);
                }
                Err(err) => return Err(LinkApplyError::new(&abs, LinkAction::Inspect)(err)),
            }
            current = dir.parent();
        }
        Ok(())
    }
}

fn log_dry_run(action: &Action) {
    match action {
        Action::Keep(..) => {}
        Action::Create(path, source) => {
            tracing::info!(path = %path.display(), source = %source.display(), "Would link")
        }
        Action::Replace(path, source) => {
            tracing::info!(path = %path.display(), source = %source.display(), "Would relink")
        }
        Action::BackupAndCreate(path, source) => tracing::info!(
            path = %path.display(),
            source = %source.display(),
            "Would back up existing file and link"
        ),
    }
}

fn describe_drift(dest: &Path) -> LinkHealth {
    match fs::read_link(dest) {
        Ok(target) => LinkHealth::Drifted(format!("points to {}", target.display())),
        Err(_) => LinkHealth::Drifted("not linked to the staged file".to_string()),
    }
}

#[cfg(unix)]
fn create_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, dest)
}

#[cfg(windows)]
fn create_symlink(source: &Path, dest: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(source, dest)
}

#[cfg(not(any(unix, windows)))]
fn create_symlink(_source: &Path, _dest: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlink unavailable on this platform",
    ))
}

#[cfg(unix)]
fn same_inode(a: &Path, b: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::metadata(a), fs::metadata(b)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

// Without inode numbers a hard link cannot be told apart from a copy
#[cfg(not(unix))]
fn same_inode(_a: &Path, _b: &Path) -> bool {
    false
}

/// A tracked hard link whose source is gone (its mod was deleted) is still ours.
#[cfg(unix)]
fn hardlink_is_ours(dest: &Path, source: &Path) -> bool {
    same_inode(dest, source) || fs::symlink_metadata(source).is_err()
}

#[cfg(not(unix))]
fn hardlink_is_ours(_dest: &Path, _source: &Path) -> bool {
    true
}
