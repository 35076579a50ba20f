//! Home feed news
//!
//! Articles come from a news aggregator search endpoint. Only the first
//! `limit` entries are kept; there is no pagination.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NewsConfig;
use crate::models::NewsArticle;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("news service unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected news response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait NewsFeed: Send + Sync {
    async fn latest(&self) -> Result<Vec<NewsArticle>, NewsError>;
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    title: Option<String>,
    description: Option<String>,
    url_to_image: Option<String>,
    url: Option<String>,
}

impl From<RawArticle> for NewsArticle {
    fn from(raw: RawArticle) -> Self {
        NewsArticle {
            title: raw
                .title
                .unwrap_or_else(|| "No title available".to_string()),
            description: raw
                .description
                .unwrap_or_else(|| "No description available".to_string()),
            image_url: raw.url_to_image.filter(|u| !u.is_empty()),
            url: raw.url,
        }
    }
}

fn parse_articles(body: &str, limit: usize) -> Result<Vec<NewsArticle>, NewsError> {
    let response: EverythingResponse =
        serde_json::from_str(body).map_err(|e| NewsError::Malformed(e.to_string()))?;

    Ok(response
        .articles
        .into_iter()
        .take(limit)
        .map(NewsArticle::from)
        .collect())
}

pub struct NewsApiClient {
    client: Client,
    config: NewsConfig,
}

impl NewsApiClient {
    pub fn new(config: NewsConfig) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        if config.api_key.is_empty() {
            warn!("News client initialized WITHOUT api key");
        }

        Self { client, config }
    }
}

#[async_trait]
impl NewsFeed for NewsApiClient {
    async fn latest(&self) -> Result<Vec<NewsArticle>, NewsError> {
        let resp = self
            .client
            .get(&self.config.base_url)
            .header("User-Agent", concat!("nograd/", env!("CARGO_PKG_VERSION")))
            .query(&[
                ("q", self.config.query.as_str()),
                ("sortBy", self.config.sort_by.as_str()),
                ("apiKey", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NewsError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("News API error {}: {}", status, body);
            return Err(NewsError::Unavailable(format!("HTTP {}", status)));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| NewsError::Unavailable(e.to_string()))?;
        let articles = parse_articles(&body, self.config.limit)?;

        debug!("Fetched {} news articles", articles.len());
        Ok(articles)
    }
}
