//! Terminal styling utilities

pub fn style_cyan(s: &str) -> String {
    format!("\x1b[36m{}\x1b[0m", s)
}

pub fn style_green(s: &str) -> String {
    format!("\x1b[32m{}\x1b[0m", s)
}

pub fn style_red(s: &str) -> String {
    format!("\x1b[31m{}\x1b[0m", s)
}

pub fn style_yellow(s: &str) -> String {
    format!("\x1b[33m{}\x1b[0m", s)
}

pub fn style_dim(s: &str) -> String {
    format!("\x1b[2m{}\x1b[0m", s)
}

pub fn style_bold(s: &str) -> String {
    format!("\x1b[1m{}\x1b[0m", s)
}

pub fn print_success(msg: &str) {
    println!("{} {}", style_green("✓"), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", style_red("✗"), msg);
}

pub fn print_warning(msg: &str) {
    println!("{} {}", style_yellow("⚠"), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", style_cyan("ℹ"), msg);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", style_bold(title));
    println!("{}", "─".repeat(title.chars().count()));
}

/// Shorten text to `max` characters, ending in "..." when cut
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Colour a badge name the way the profile screen does
pub fn style_badge(badge: &str) -> String {
    match badge {
        "LEGEND" | "DIAMOND" => style_cyan(badge),
        "PLATINUM" | "GOLD" => style_yellow(badge),
        "SILVER" => style_bold(badge),
        _ => style_dim(badge),
    }
}

/// Print the shell line that keeps a session for later commands
pub fn print_session_hint(token: &str) {
    println!();
    println!("  Keep this session for later commands:");
    println!("    {}", style_yellow(&format!("export NOGRAD_TOKEN={}", token)));
    println!();
}
