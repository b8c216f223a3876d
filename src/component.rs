//! Operation targets
//!
//! Commands address either the mod list or the plugin list, and either a
//! single position in that list or every member of it.

use std::fmt;
use std::str::FromStr;

use crate::error::ModlinkError;

/// Which ordered list an operation applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Mod,
    Plugin,
}

impl ComponentKind {
    pub fn label(self) -> &'static str {
        match self {
            ComponentKind::Mod => "mod",
            ComponentKind::Plugin => "plugin",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComponentKind {
    type Err = ModlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mod" | "mods" => Ok(ComponentKind::Mod),
            "plugin" | "plugins" => Ok(ComponentKind::Plugin),
            _ => Err(ModlinkError::InvalidComponent(s.to_string())),
        }
    }
}

/// A single list position, or the whole list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Index(usize),
    All,
}

impl Selection {
    /// Expand the selection into concrete indices for a list of `len` items.
    pub fn indices(self, kind: ComponentKind, len: usize) -> Result<Vec<usize>, ModlinkError> {
        match self {
            Selection::All => Ok((0..len).collect()),
            Selection::Index(index) if index < len => Ok(vec![index]),
            Selection::Index(index) => Err(ModlinkError::IndexOutOfRange { kind, index, len }),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Index(index) => write!(f, "{index}"),
            Selection::All => f.write_str("all"),
        }
    }
}

impl FromStr for Selection {
    type Err = ModlinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(Selection::All);
        }
        trimmed
            .parse::<usize>()
            .map(Selection::Index)
            .map_err(|_| ModlinkError::InvalidSelection(s.to_string()))
    }
}
