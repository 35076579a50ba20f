//! News command

use anyhow::Result;

use crate::client::NogradClient;
use crate::style::*;

pub async fn run(client: &NogradClient, limit: usize) -> Result<()> {
    print_header("Latest News");

    let articles = client.news().await?;
    if articles.is_empty() {
        print_info("No news right now.");
        return Ok(());
    }

    for article in articles.iter().take(limit) {
        println!();
        println!("{}", style_bold(&article.title));
        println!("  {}", truncate_text(&article.description, 160));
        if let Some(url) = &article.url {
            println!("  {}", style_dim(url));
        }
    }
    println!();

    Ok(())
}
