//! modlink - Mod deployment by links
//!
//! Keeps installed mods in a staging directory and overlays them onto a game
//! directory with symbolic or hard links. When several active mods provide
//! the same file, the one latest in the load order wins; nothing in the game
//! directory is ever copied over.

pub mod component;
pub mod config;
pub mod controller;
pub mod error;
pub mod fs;
pub mod game;
pub mod init;
pub mod linker;
pub mod model;
pub mod resolver;
pub mod staging;
pub mod state;

pub use component::{ComponentKind, Selection};
pub use config::Config;
pub use controller::Controller;
pub use error::{ModlinkError, Result};
pub use linker::{LinkMode, Linker, SyncOptions, SyncResult};
pub use model::{Mod, Plugin};
