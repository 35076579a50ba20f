//! Profile command

use anyhow::Result;

use crate::client::NogradClient;
use crate::style::*;

pub async fn run(client: &NogradClient) -> Result<()> {
    let profile = client.profile().await?;

    let name = if profile.name.is_empty() {
        "User"
    } else {
        profile.name.as_str()
    };
    print_header(name);

    if !profile.college.is_empty() {
        println!("College:  {}", profile.college);
    }
    if !profile.bio.is_empty() {
        println!("Bio:      {}", style_dim(&profile.bio));
    }
    println!("Points:   {}", style_green(&profile.points.to_string()));
    println!("Badge:    {}", style_badge(profile.badge.name()));
    println!();

    Ok(())
}
