//! Configuration management
//!
//! Loads configuration from config.toml with support for:
//! - HTTP server binding
//! - Identity provider, classifier and news API endpoints
//! - Points awarded per contribution category
//!
//! API keys and the server binding can be overridden from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::ledger::PointTable;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub classifier: ClassifierConfig,
    pub news: NewsConfig,
    #[serde(default)]
    pub rewards: PointTable,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Identity provider (email/password accounts)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
}

/// Generative-AI image verification endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

/// News aggregator shown on the home feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    #[serde(default)]
    pub api_key: String,
    pub base_url: String,
    pub query: String,
    pub sort_by: String,
    /// Number of articles kept from the response
    pub limit: usize,
}

fn default_classifier_timeout() -> u64 {
    60
}

impl Config {
    /// Load from config.toml or use defaults
    pub fn load() -> Result<Self> {
        Self::load_from("config.toml")
    }

    /// Load from specific path, then apply environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let mut config: Config = if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")?
        } else {
            toml::from_str(DEFAULT_CONFIG).context("Failed to parse default config")?
        };

        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Some(key) = env_non_empty("NOGRAD_IDENTITY_API_KEY") {
            self.identity.api_key = key;
        }
        if let Some(key) = env_non_empty("NOGRAD_GEMINI_API_KEY") {
            self.classifier.api_key = key;
        }
        if let Some(key) = env_non_empty("NOGRAD_NEWS_API_KEY") {
            self.news.api_key = key;
        }
        if let Some(host) = env_non_empty("NOGRAD_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_non_empty("NOGRAD_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        // The embedded config ships with the crate; the fallback only
        // matters if it is edited into an unparseable state.
        toml::from_str(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            identity: IdentityConfig {
                api_key: String::new(),
                base_url: "https://identitytoolkit.googleapis.com/v1".to_string(),
            },
            classifier: ClassifierConfig {
                api_key: String::new(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-1.5-flash".to_string(),
                timeout_secs: default_classifier_timeout(),
            },
            news: NewsConfig {
                api_key: String::new(),
                base_url: "https://newsapi.org/v2/everything".to_string(),
                query: "computer science students".to_string(),
                sort_by: "popularity".to_string(),
                limit: 50,
            },
            rewards: PointTable::default(),
        })
    }
}
