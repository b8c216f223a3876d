//! Conflict resolution
//!
//! Pure functions over the ordered mod list. The winner of a path is the
//! active mod with the highest index that provides it; a mod is in conflict
//! when it shares any path with another active mod, whether it wins that
//! path or not.

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};

use crate::error::{ModlinkError, Result};
use crate::model::{Entry, Mod};

/// A path one mod shares with other active mods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    pub path: PathBuf,
    /// Indices of the other active mods providing `path`, in load order
    pub others: Vec<usize>,
    /// Index of the mod whose file ends up in the game directory
    pub winner: usize,
}

/// Compute the winning mod for every path provided by an active mod.
pub fn resolve(mods: &[Mod]) -> Result<BTreeMap<PathBuf, Entry>> {
    let mut winners: BTreeMap<PathBuf, Entry> = BTreeMap::new();

    for (index, m) in mods.iter().enumerate() {
        if !m.is_active() {
            continue;
        }
        for path in m.files() {
            if !is_placeable(path) {
                return Err(ModlinkError::ConflictComputation(format!(
                    "mod '{}' provides {} which cannot be placed inside the game directory",
                    m.name(),
                    path.display()
                )));
            }
            winners.insert(
                path.clone(),
                Entry {
                    path: path.clone(),
                    provider: index,
                    source: m.source_of(path),
                },
            );
        }
    }

    Ok(winners)
}

/// Conflict flag for each mod, by position.
pub fn conflict_flags(mods: &[Mod]) -> Vec<bool> {
    let counts = active_provider_counts(mods);

    mods.iter()
        .map(|m| {
            m.is_active()
                && m
                    .files()
                    .iter()
                    .any(|path| counts.get(path.as_path()).copied().unwrap_or(0) > 1)
        })
        .collect()
}

/// Paths of the mod at `index` that other active mods also provide.
///
/// Inactive mods collide with nothing.
pub fn collisions(mods: &[Mod], index: usize) -> Vec<Collision> {
    let Some(target) = mods.get(index) else {
        return Vec::new();
    };
    if !target.is_active() {
        return Vec::new();
    }

    let mut result = Vec::new();
    for path in target.files() {
        let providers: Vec<usize> = mods
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_active() && m.provides(path))
            .map(|(i, _)| i)
            .collect();
        if providers.len() < 2 {
            continue;
        }
        // providers is ascending, so the last entry wins
        let winner = providers[providers.len() - 1];
        result.push(Collision {
            path: path.clone(),
            others: providers.into_iter().filter(|&i| i != index).collect(),
            winner,
        });
    }
    result
}

fn active_provider_counts(mods: &[Mod]) -> HashMap<&Path, usize> {
    let mut counts: HashMap<&Path, usize> = HashMap::new();
    for m in mods.iter().filter(|m| m.is_active()) {
        for path in m.files() {
            *counts.entry(path.as_path()).or_default() += 1;
        }
    }
    counts
}

/// Whether `path` stays inside whatever directory it is joined onto
pub(crate) fn is_placeable(path: &Path) -> bool {
    path.components()
        .any(|component| matches!(component, Component::Normal(_)))
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}
