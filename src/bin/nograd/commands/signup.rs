//! Sign-up wizard - interactive account creation

use anyhow::Result;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Password};

use crate::client::{NogradClient, SignUpBody};
use crate::style::print_session_hint;

const MIN_PASSWORD_LEN: usize = 6;

pub async fn run(server_url: &str) -> Result<()> {
    println!();
    println!("{}", style("  Create your nograd account").cyan().bold());
    println!(
        "  {}",
        style("Earn points for open source, contests, projects and awards").dim()
    );
    println!();

    let theme = ColorfulTheme::default();

    // Step 1: Who you are
    println!("  {}", style("Step 1: About you").bold());
    println!();

    let name: String = Input::with_theme(&theme)
        .with_prompt("  Name")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                return Err("Name cannot be empty");
            }
            Ok(())
        })
        .interact_text()?;

    let college: String = Input::with_theme(&theme)
        .with_prompt("  College")
        .allow_empty(true)
        .interact_text()?;

    let bio: String = Input::with_theme(&theme)
        .with_prompt("  Bio")
        .allow_empty(true)
        .interact_text()?;

    // Step 2: Credentials
    println!();
    println!("  {}", style("Step 2: Credentials").bold());
    println!();

    let email: String = Input::with_theme(&theme)
        .with_prompt("  Email")
        .validate_with(|input: &String| -> Result<(), &str> {
            if !looks_like_email(input) {
                return Err("Enter a valid email address");
            }
            Ok(())
        })
        .interact_text()?;

    let password = Password::with_theme(&theme)
        .with_prompt("  Password")
        .with_confirmation("  Confirm password", "Passwords do not match")
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.chars().count() < MIN_PASSWORD_LEN {
                return Err("Password should be at least 6 characters");
            }
            Ok(())
        })
        .interact()?;

    // Step 3: Review
    println!();
    println!("  {}", style("Review").bold());
    println!("  {}", style("─".repeat(40)).dim());
    println!();
    println!("  Name:     {}", style(name.trim()).cyan());
    println!("  Email:    {}", email.trim());
    if !college.trim().is_empty() {
        println!("  College:  {}", college.trim());
    }
    println!();

    let confirmed = Confirm::with_theme(&theme)
        .with_prompt("  Create this account?")
        .default(true)
        .interact()?;

    if !confirmed {
        println!();
        println!("  {} Sign up cancelled", style("✗").red());
        return Ok(());
    }

    println!();
    let pb = super::spinner("Creating account...");

    let client = NogradClient::new(server_url, None);
    let body = SignUpBody {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        password,
        college: college.trim().to_string(),
        bio: bio.trim().to_string(),
    };

    match client.sign_up(&body).await {
        Ok(session) => {
            pb.finish_and_clear();
            println!(
                "  {} Welcome, {}!",
                style("✓").green().bold(),
                style(&body.name).cyan()
            );
            print_session_hint(&session.token);
            println!("  {}", style("Next steps:").bold());
            println!("    1. Upload proof of a contribution with `nograd upload <image>`");
            println!("    2. Watch your rank with `nograd leaderboard`");
            println!();
        }
        Err(e) => {
            pb.finish_and_clear();
            println!("  {} {}", style("✗").red(), e);
        }
    }

    Ok(())
}

/// Cheap shape check; the identity provider has the final word
fn looks_like_email(input: &str) -> bool {
    let input = input.trim();
    match input.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("ada@example.com"));
        assert!(looks_like_email(" ada@uni.ac.uk "));
        assert!(!looks_like_email("ada"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("ada@localhost"));
        assert!(!looks_like_email("ada@example."));
    }
}
