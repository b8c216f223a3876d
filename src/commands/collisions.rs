use anyhow::Result;
use colored::Colorize;

use modlink::Controller;

pub fn run_collisions(index: usize, controller: &Controller) -> Result<()> {
    let collisions = controller.collisions(index)?;
    let mods = controller.mods();
    let target = &mods[index];

    if collisions.is_empty() {
        println!(
            "{} {} shares no files with other active mods",
            "✔".green(),
            target.name()
        );
        return Ok(());
    }

    println!(
        "{} {} shares {} file(s):",
        "!".yellow(),
        target.name().bold(),
        collisions.len()
    );
    for collision in &collisions {
        let others: Vec<&str> = collision.others.iter().map(|&i| mods[i].name()).collect();
        let marker = if collision.winner == index {
            "wins".green()
        } else {
            format!("lost to {}", mods[collision.winner].name()).red()
        };
        println!(
            "  {} {} [{}] also in: {}",
            "→".cyan(),
            collision.path.display(),
            marker,
            others.join(", ")
        );
    }
    Ok(())
}
