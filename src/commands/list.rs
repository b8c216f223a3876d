use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use modlink::Controller;

/// Arguments for the list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct ModEntry {
    index: usize,
    name: String,
    active: bool,
    conflict: bool,
    location: String,
}

#[derive(Serialize)]
struct PluginEntry {
    index: usize,
    name: String,
    active: bool,
}

#[derive(Serialize)]
struct Listing {
    mods: Vec<ModEntry>,
    plugins: Vec<PluginEntry>,
}

pub fn run_list(args: ListArgs, controller: &Controller) -> Result<()> {
    let listing = Listing {
        mods: controller
            .mods()
            .iter()
            .enumerate()
            .map(|(index, m)| ModEntry {
                index,
                name: m.name().to_string(),
                active: m.is_active(),
                conflict: m.has_conflict(),
                location: m.location().display().to_string(),
            })
            .collect(),
        plugins: controller
            .plugins()
            .iter()
            .enumerate()
            .map(|(index, p)| PluginEntry {
                index,
                name: p.name(),
                active: p.is_active(),
            })
            .collect(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!("{}", "Mods".cyan().bold());
    if listing.mods.is_empty() {
        println!("  {}", "(none installed)".dimmed());
    }
    for m in &listing.mods {
        let name = if m.conflict {
            format!("{} {}", m.name, "*".yellow())
        } else {
            m.name.clone()
        };
        println!("  {:>3} {} {}", m.index, checkbox(m.active), name);
    }

    println!("\n{}", "Plugins".cyan().bold());
    if listing.plugins.is_empty() {
        println!("  {}", "(none visible)".dimmed());
    }
    for p in &listing.plugins {
        println!("  {:>3} {} {}", p.index, checkbox(p.active), p.name);
    }

    if listing.mods.iter().any(|m| m.conflict) {
        println!(
            "\n{} marks mods sharing files with another active mod",
            "*".yellow()
        );
    }
    Ok(())
}

fn checkbox(active: bool) -> colored::ColoredString {
    if active {
        "[x]".green()
    } else {
        "[ ]".dimmed()
    }
}
