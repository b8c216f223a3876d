//! modlink CLI
//!
//! Command-line interface for staging mods and deploying them into a game
//! directory.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use tracing::Level;

use commands::list::{ListArgs, run_list};
use commands::status::{StatusArgs, run_status};
use modlink::{ComponentKind, Config, Controller, Selection, SyncOptions, SyncResult, init};

#[derive(Parser)]
#[command(name = "modlink")]
#[command(
    author,
    version,
    about = "Deploy staged game mods into the game directory using links"
)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "MODLINK_CONFIG")]
    config: Option<PathBuf>,

    /// Show detailed output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new modlink configuration
    Init {
        /// Game directory links are created in
        #[arg(short, long)]
        game: PathBuf,

        /// Directory to initialize (default: current directory)
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Plugin directory inside the game directory
        #[arg(long, default_value = "Data")]
        data_dir: String,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(flatten)]
    Workspace(WorkspaceCommand),
}

/// Commands that operate on an initialized workspace
#[derive(Subcommand)]
enum WorkspaceCommand {
    /// Stage mods from directories or archives (.zip, .tar.gz)
    Install {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// Enable a mod or plugin
    Activate {
        /// "mod" or "plugin"
        component: ComponentKind,
        /// Index, or "all"
        target: Selection,
    },

    /// Disable a mod or plugin
    Deactivate {
        component: ComponentKind,
        target: Selection,
    },

    /// Change the load order
    Move {
        component: ComponentKind,
        from: usize,
        to: usize,
    },

    /// Rename a mod
    Rename {
        component: ComponentKind,
        index: usize,
        name: String,
    },

    /// Delete a mod's staging directory, or a plugin from every mod shipping it
    Delete {
        component: ComponentKind,
        target: Selection,
    },

    /// Apply the load order to the game directory
    Commit {
        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove all deployed links and restore backed-up files
    Clean {
        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },

    /// Show mods and visible plugins
    List(ListArgs),

    /// Show the files a mod shares with other active mods
    Collisions { index: usize },

    /// Verify deployed links against the disk
    Status(StatusArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init {
            game,
            path,
            data_dir,
            force,
        } => run_init(game, path, &data_dir, force),
        Commands::Workspace(command) => run_workspace(command, cli.config, cli.verbose),
    }
}

fn run_init(game: PathBuf, path: Option<PathBuf>, data_dir: &str, force: bool) -> Result<()> {
    let root = match path {
        Some(p) => p,
        None => env::current_dir().context("Failed to read current directory")?,
    };
    let game = std::path::absolute(&game)
        .with_context(|| format!("Invalid game directory: {}", game.display()))?;

    println!("{}", "Initializing modlink configuration...\n".cyan());
    let config_path = init::init(&root, &game, data_dir, force)?;

    println!("\n{}", "✨ Initialization complete!".green().bold());
    println!(
        "\nNext steps:\n  1. Review {}\n  2. Run {} and {}",
        config_path.display().to_string().cyan(),
        "modlink install <archive>".cyan(),
        "modlink commit".cyan()
    );
    Ok(())
}

fn run_workspace(command: WorkspaceCommand, config: Option<PathBuf>, verbose: bool) -> Result<()> {
    let config_path = match config {
        Some(p) => std::path::absolute(&p)
            .with_context(|| format!("Invalid config path: {}", p.display()))?,
        None => Config::find_config(&env::current_dir().context("Failed to read current directory")?)?,
    };
    if verbose {
        println!(
            "Using config: {}\n",
            config_path.display().to_string().dimmed()
        );
    }
    let config = Config::load(&config_path)?;
    let mut controller = Controller::open(&config, &config_path)?;

    match command {
        WorkspaceCommand::Install { sources } => {
            for source in sources {
                let index = controller.install(&source)?;
                controller.save()?;
                println!(
                    "  {} Installed {} at index {}",
                    "✔".green(),
                    controller.mods()[index].name(),
                    index
                );
            }
        }

        WorkspaceCommand::Activate { component, target } => {
            controller.activate(component, target)?;
            controller.save()?;
            println!("  {} Activated {} {}", "✔".green(), component, target);
        }

        WorkspaceCommand::Deactivate { component, target } => {
            controller.deactivate(component, target)?;
            controller.save()?;
            println!("  {} Deactivated {} {}", "✔".green(), component, target);
        }

        WorkspaceCommand::Move {
            component,
            from,
            to,
        } => {
            controller.move_component(component, from, to)?;
            controller.save()?;
            println!("  {} Moved {} {} to {}", "✔".green(), component, from, to);
        }

        WorkspaceCommand::Rename {
            component,
            index,
            name,
        } => {
            controller.rename(component, index, &name)?;
            controller.save()?;
            println!("  {} Renamed {} {} to {}", "✔".green(), component, index, name.trim());
        }

        WorkspaceCommand::Delete { component, target } => {
            controller.delete(component, target)?;
            controller.save()?;
            println!("  {} Deleted {} {}", "✔".green(), component, target);
        }

        WorkspaceCommand::Commit { dry_run } => {
            println!("{}", "➤ Deploying mods".cyan().bold());
            let result = controller.commit(&SyncOptions { dry_run })?;
            print_summary("Commit", &result, dry_run);
        }

        WorkspaceCommand::Clean { dry_run } => {
            println!("{}", "➤ Removing deployed links".cyan().bold());
            let result = controller.clean(&SyncOptions { dry_run })?;
            print_summary("Clean", &result, dry_run);
        }

        WorkspaceCommand::List(args) => run_list(args, &controller)?,

        WorkspaceCommand::Collisions { index } => {
            commands::collisions::run_collisions(index, &controller)?
        }

        WorkspaceCommand::Status(args) => {
            if run_status(args, &controller)? > 0 {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(action: &str, result: &SyncResult, dry_run: bool) {
    if dry_run {
        println!("\n{}", format!("{action} preview (dry run)").yellow().bold());
    } else {
        println!("\n{}", format!("✨ {action} complete!").green().bold());
    }
    println!(
        "  Created: {}, Updated: {}, Removed: {}, Skipped: {}",
        result.created.to_string().green(),
        result.updated.to_string().yellow(),
        result.removed.to_string().red(),
        result.skipped.to_string().dimmed()
    );
    if result.backed_up > 0 || result.restored > 0 {
        println!(
            "  Backed up: {}, Restored: {}",
            result.backed_up.to_string().yellow(),
            result.restored.to_string().green()
        );
    }
    println!("  Link mode: {}", result.link_mode_summary().dimmed());
}
