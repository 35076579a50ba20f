//! Progress command - contributions in one category

use anyhow::Result;
use nograd::Category;

use crate::client::NogradClient;
use crate::style::*;

pub async fn run(client: &NogradClient, category: &str) -> Result<()> {
    let label = canonical_category(category);

    print_header(&format!("{} Progress", label));

    let records = client.contributions(&label).await?;
    if records.is_empty() {
        print_info(&format!("No {} contributions yet.", label));
        return Ok(());
    }

    for record in &records {
        let mark = if record.verified {
            style_green("✓ verified")
        } else {
            style_yellow("✗ unverified")
        };
        println!();
        println!(
            "{}  {}  {}",
            style_dim(&record.timestamp.format("%Y-%m-%d").to_string()),
            style_cyan(&record.language),
            mark
        );
        println!("  {}", record.description);
    }

    let verified = records.iter().filter(|r| r.verified).count();
    println!();
    println!("{} of {} verified", verified, records.len());

    Ok(())
}

/// Stored label for a known category typed loosely ("open-source", "cp");
/// anything else is passed through unchanged.
pub fn canonical_category(input: &str) -> String {
    let squash = |s: &str| {
        s.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    let wanted = squash(input);

    Category::ALL
        .iter()
        .find(|c| squash(c.label()) == wanted)
        .map(|c| c.label().to_string())
        .unwrap_or_else(|| input.trim().to_string())
}
