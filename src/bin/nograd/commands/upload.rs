//! Upload command - submit proof of a contribution

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use base64::Engine;
use console::style;
use dialoguer::{theme::ColorfulTheme, Input, Select};
use nograd::Category;

use super::progress::canonical_category;
use crate::client::{NogradClient, UploadBody};

pub struct UploadArgs {
    pub image: PathBuf,
    pub category: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

pub async fn run(client: &NogradClient, args: UploadArgs) -> Result<()> {
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read image {}", args.image.display()))?;
    let theme = ColorfulTheme::default();

    let category = match args.category {
        Some(category) => canonical_category(&category),
        None => {
            let labels: Vec<&str> = Category::ALL.iter().map(|c| c.label()).collect();
            let choice = Select::with_theme(&theme)
                .with_prompt("  Category")
                .items(&labels)
                .default(0)
                .interact()?;
            labels[choice].to_string()
        }
    };

    let language = match args.language {
        Some(language) => language,
        None => Input::with_theme(&theme)
            .with_prompt("  Language")
            .allow_empty(true)
            .interact_text()?,
    };

    let description = match args.description {
        Some(description) => description,
        None => Input::with_theme(&theme)
            .with_prompt("  Description")
            .allow_empty(true)
            .interact_text()?,
    };

    let body = UploadBody {
        category,
        language,
        description,
        image_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        image_url: args.image_url,
        mime_type: mime_type_for(&args.image).to_string(),
    };

    println!();
    let pb = super::spinner("Verifying contribution...");
    let result = client.upload(&body).await;
    pb.finish_and_clear();

    let outcome = result?;
    match outcome.status.as_str() {
        "completed" => {
            println!("  {} {}", style("✓").green().bold(), outcome.message);
            if let Some(total) = outcome.total_points {
                println!("  Total points: {}", style(total).green());
            }
        }
        "completed_unverified" => {
            println!("  {} {}", style("⚠").yellow(), outcome.message);
        }
        "ledger_update_failed" => {
            println!("  {} {}", style("⚠").yellow(), outcome.message);
            println!("  Quote the record id below when contacting support.");
        }
        "rejected_validation" => {
            println!("  {} {}", style("✗").red(), outcome.message);
            if !outcome.missing.is_empty() {
                println!("  Missing: {}", outcome.missing.join(", "));
            }
        }
        _ => {
            println!("  {} {}", style("✗").red(), outcome.message);
        }
    }
    if let Some(record_id) = &outcome.record_id {
        println!("  {}", style(format!("Record {}", record_id)).dim());
    }
    println!();

    Ok(())
}

/// Image MIME type from the file extension, JPEG when unknown
fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_type_for() {
        assert_eq!(mime_type_for(Path::new("proof.PNG")), "image/png");
        assert_eq!(mime_type_for(Path::new("proof.jpg")), "image/jpeg");
        assert_eq!(mime_type_for(Path::new("/tmp/scan.webp")), "image/webp");
        assert_eq!(mime_type_for(Path::new("no_extension")), "image/jpeg");
    }
}
