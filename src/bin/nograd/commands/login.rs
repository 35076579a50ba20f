//! Login command

use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Input, Password};

use crate::client::NogradClient;
use crate::style::*;

pub async fn run(server_url: &str, email: Option<String>) -> Result<()> {
    let theme = ColorfulTheme::default();

    let email = match email.filter(|e| !e.trim().is_empty()) {
        Some(email) => email,
        None => Input::with_theme(&theme)
            .with_prompt("  Email")
            .interact_text()?,
    };
    let password = Password::with_theme(&theme)
        .with_prompt("  Password")
        .interact()?;

    if email.trim().is_empty() || password.is_empty() {
        print_warning("Please fill all fields");
        return Ok(());
    }

    let pb = super::spinner("Logging in...");
    let client = NogradClient::new(server_url, None);
    let result = client.login(email.trim(), &password).await;
    pb.finish_and_clear();

    let session = result?;
    print_success(&format!("Logged in as {}", style_cyan(&session.email)));
    print_session_hint(&session.token);

    Ok(())
}
