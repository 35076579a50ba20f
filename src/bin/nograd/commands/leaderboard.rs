//! Leaderboard command

use anyhow::Result;

use crate::client::NogradClient;
use crate::style::*;

pub async fn run(client: &NogradClient, limit: Option<usize>) -> Result<()> {
    print_header("nograd Leaderboard");

    let entries = client.leaderboard(limit).await?;
    if entries.is_empty() {
        print_info("Nobody has earned points yet.");
        return Ok(());
    }

    println!();
    println!("{:>5}  {:<28}  {:>8}", "Rank", "Name", "Points");
    println!("{}", "─".repeat(45));

    for entry in &entries {
        let rank = format!("#{}", entry.rank);
        let rank_styled = match entry.rank {
            1 => style_yellow(&rank),
            2 | 3 => style_cyan(&rank),
            _ => rank.clone(),
        };
        // Pad before styling so escape codes don't break alignment
        let pad = 5usize.saturating_sub(rank.len());

        println!(
            "{}{}  {:<28}  {:>8}",
            " ".repeat(pad),
            rank_styled,
            truncate_text(&entry.display_name, 28),
            entry.points
        );
    }

    println!();
    println!("Total students: {}", entries.len());

    Ok(())
}
