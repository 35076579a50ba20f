pub mod home;
pub mod leaderboard;
pub mod login;
pub mod news;
pub mod profile;
pub mod progress;
pub mod server;
pub mod signup;
pub mod upload;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while waiting on the server
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}
