//! Home command - dashboard and latest headlines

use anyhow::Result;

use crate::client::NogradClient;
use crate::style::*;

const HEADLINES: usize = 5;

pub async fn run(client: &NogradClient) -> Result<()> {
    let dashboard = client.home().await?;

    println!();
    println!("{}", style_dim(&dashboard.greeting));
    print_header(&dashboard.title);
    println!(
        "Your Points:  {}",
        style_green(&dashboard.points.to_string())
    );

    println!();
    println!("{}", style_bold("Latest News"));
    match client.news().await {
        Ok(articles) if articles.is_empty() => print_info("No news right now."),
        Ok(articles) => {
            for article in articles.iter().take(HEADLINES) {
                println!("  • {}", truncate_text(&article.title, 72));
            }
            if articles.len() > HEADLINES {
                println!(
                    "  {}",
                    style_dim(&format!("{} more with `nograd news`", articles.len() - HEADLINES))
                );
            }
        }
        // The dashboard is still useful without headlines
        Err(e) => print_warning(&format!("News unavailable: {}", e)),
    }
    println!();

    Ok(())
}
