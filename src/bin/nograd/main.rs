//! nograd CLI
//!
//! Terminal client for the nograd server.

mod client;
mod commands;
mod style;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use client::NogradClient;
use style::*;

const BANNER: &str = r#"
  ███╗   ██╗ ██████╗  ██████╗ ██████╗  █████╗ ██████╗
  ████╗  ██║██╔═══██╗██╔════╝ ██╔══██╗██╔══██╗██╔══██╗
  ██╔██╗ ██║██║   ██║██║  ███╗██████╔╝███████║██║  ██║
  ██║╚██╗██║██║   ██║██║   ██║██╔══██╗██╔══██║██║  ██║
  ██║ ╚████║╚██████╔╝╚██████╔╝██║  ██║██║  ██║██████╔╝
  ╚═╝  ╚═══╝ ╚═════╝  ╚═════╝ ╚═╝  ╚═╝╚═╝  ╚═╝╚═════╝
"#;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "nograd")]
#[command(version)]
#[command(about = "nograd - Earn points for your contributions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// nograd server URL
    #[arg(
        short = 'u',
        long = "url",
        env = "NOGRAD_URL",
        default_value = "http://localhost:8080",
        global = true
    )]
    url: String,

    /// Session token from `nograd login`
    #[arg(long, env = "NOGRAD_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive sign-up wizard
    #[command(visible_alias = "register")]
    Signup,

    /// Log in and print a session token
    Login {
        /// Account email (prompted when omitted)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Your dashboard and the latest headlines (default)
    #[command(visible_alias = "h")]
    Home,

    /// Your profile, points and badge
    #[command(visible_alias = "me")]
    Profile,

    /// Latest news for CS students
    News {
        /// Number of articles to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// View the leaderboard
    #[command(visible_alias = "lb")]
    Leaderboard {
        /// Number of entries to show (all when omitted)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Your contributions in one category
    #[command(visible_alias = "p")]
    Progress {
        /// Open Source, CP, Projects or Achievements
        category: String,
    },

    /// Upload proof of a contribution for verification
    #[command(visible_alias = "up")]
    Upload {
        /// Image file
        image: PathBuf,

        /// Contribution category (prompted when omitted)
        #[arg(short, long)]
        category: Option<String>,

        /// Programming language used (prompted when omitted)
        #[arg(short, long)]
        language: Option<String>,

        /// What the image shows (prompted when omitted)
        #[arg(short, long)]
        description: Option<String>,

        /// Shareable link to the image, stored with the record
        #[arg(long)]
        image_url: Option<String>,
    },

    /// Run the API server
    #[command(visible_alias = "s")]
    Server {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// PostgreSQL database URL (in-memory storage when omitted)
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
    }

    let client = NogradClient::new(&cli.url, cli.token.clone());

    // Default to the dashboard if no command specified
    let command = cli.command.unwrap_or(Commands::Home);

    let result = match command {
        Commands::Signup => {
            print_banner();
            commands::signup::run(&cli.url).await
        }
        Commands::Login { email } => commands::login::run(&cli.url, email).await,
        Commands::Home => commands::home::run(&client).await,
        Commands::Profile => commands::profile::run(&client).await,
        Commands::News { limit } => commands::news::run(&client, limit).await,
        Commands::Leaderboard { limit } => commands::leaderboard::run(&client, limit).await,
        Commands::Progress { category } => commands::progress::run(&client, &category).await,
        Commands::Upload {
            image,
            category,
            language,
            description,
            image_url,
        } => {
            commands::upload::run(
                &client,
                commands::upload::UploadArgs {
                    image,
                    category,
                    language,
                    description,
                    image_url,
                },
            )
            .await
        }
        Commands::Server {
            host,
            port,
            database_url,
        } => {
            if !cli.verbose {
                tracing_subscriber::fmt().with_env_filter("info").init();
            }
            print_banner();
            commands::server::run(host, port, database_url).await
        }
    };

    if let Err(e) = result {
        print_error(&format!("{}", e));
        std::process::exit(1);
    }
}

pub fn print_banner() {
    println!("{}", style_cyan(BANNER));
    println!(
        "  {} {}",
        style_dim("nograd"),
        style_dim(&format!("v{}", VERSION))
    );
    println!();
}
