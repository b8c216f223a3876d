use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use modlink::Controller;
use modlink::linker::{LinkCheck, LinkHealth};
use modlink::resolver;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output machine-readable JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
pub struct StatusEntry {
    pub path: String,
    pub destination: String,
    pub kind: String,
    pub source: String,
    pub health: String,
    pub detail: Option<String>,
}

#[derive(Serialize)]
struct StatusReport {
    game_dir: String,
    last_commit: Option<String>,
    /// Paths whose winner differs from what is deployed
    pending: usize,
    links: Vec<StatusEntry>,
}

impl StatusEntry {
    fn from_check(check: LinkCheck, controller: &Controller) -> Self {
        let (health, detail) = match check.health {
            LinkHealth::Ok => ("ok", None),
            LinkHealth::Missing => ("missing", None),
            LinkHealth::Drifted(detail) => ("drifted", Some(detail)),
        };
        Self {
            path: check.path.display().to_string(),
            destination: controller
                .game()
                .directory()
                .join(&check.path)
                .display()
                .to_string(),
            kind: check.link.kind.label().to_string(),
            source: check.link.source.display().to_string(),
            health: health.to_string(),
            detail,
        }
    }
}

/// Anything but a verified link needs a commit to repair
pub fn entry_is_problematic(entry: &StatusEntry) -> bool {
    entry.health != "ok"
}

/// Print link health; returns the number of problems found.
pub fn run_status(args: StatusArgs, controller: &Controller) -> Result<usize> {
    let links: Vec<StatusEntry> = controller
        .linker()
        .verify(controller.deployment())
        .into_iter()
        .map(|check| StatusEntry::from_check(check, controller))
        .collect();
    let report = StatusReport {
        game_dir: controller.game().directory().display().to_string(),
        last_commit: controller.last_commit().map(|t| t.to_rfc3339()),
        pending: pending_changes(controller)?,
        links,
    };
    let problems = report
        .links
        .iter()
        .filter(|e| entry_is_problematic(e))
        .count();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(problems);
    }

    println!("Game: {}", report.game_dir.cyan());
    match &report.last_commit {
        Some(at) => println!("Last commit: {}", at.dimmed()),
        None => println!("Last commit: {}", "never".dimmed()),
    }

    for e in &report.links {
        match e.health.as_str() {
            "ok" => println!(
                "{} OK: {} -> {} ({})",
                "✔".green(),
                e.path,
                e.source,
                e.kind
            ),
            "missing" => println!("{} Missing: {}", "!".yellow(), e.destination),
            _ => println!(
                "{} Incorrect link: {} ({}, expected: {})",
                "✗".red(),
                e.destination,
                e.detail.as_deref().unwrap_or("unknown"),
                e.source
            ),
        }
    }

    if report.pending > 0 {
        println!(
            "\n{} {} path(s) change on the next commit",
            "→".cyan(),
            report.pending
        );
    }
    if problems > 0 {
        println!("\nStatus: {} problems found", problems);
    } else {
        println!("\nStatus: All good");
    }
    Ok(problems)
}

fn pending_changes(controller: &Controller) -> Result<usize> {
    let winners = resolver::resolve(controller.mods())?;
    let links = &controller.deployment().links;

    let changed = winners
        .iter()
        .filter(|(path, entry)| links.get(*path).map(|l| &l.source) != Some(&entry.source))
        .count();
    let stale = links.keys().filter(|p| !winners.contains_key(*p)).count();
    Ok(changed + stale)
}
