//! nograd API client
//!
//! Thin wrapper over the server's JSON endpoints. Calls that act on the
//! signed-in user send the session token as a bearer token.

use anyhow::{anyhow, Result};
use nograd::{ContributionRecord, Dashboard, NewsArticle, Profile, RankedEntry, Session};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Classification can take a while on large images
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Sign-up request sent to the server
#[derive(Debug, Serialize)]
pub struct SignUpBody {
    pub name: String,
    pub email: String,
    pub password: String,
    pub college: String,
    pub bio: String,
}

/// Upload request sent to the server
#[derive(Debug, Serialize)]
pub struct UploadBody {
    pub category: String,
    pub language: String,
    pub description: String,
    pub image_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub mime_type: String,
}

/// How an upload ended, as reported by the server
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub total_points: Option<i64>,
    #[serde(default)]
    pub missing: Vec<String>,
}

pub struct NogradClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl NogradClient {
    /// Create a new client pointing to a nograd server
    pub fn new(server_url: &str, token: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| anyhow!("Invalid server URL: {}", e))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid server URL: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(anyhow!(
                "Please login first! Run `nograd login` and export NOGRAD_TOKEN"
            )),
        }
    }

    /// Create an account
    pub async fn sign_up(&self, body: &SignUpBody) -> Result<Session> {
        let resp = self
            .client
            .post(self.url(&["auth", "signup"])?)
            .json(body)
            .send()
            .await?;
        read_json(resp, "Sign up failed").await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let resp = self
            .client
            .post(self.url(&["auth", "login"])?)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;
        read_json(resp, "Login failed").await
    }

    pub async fn home(&self) -> Result<Dashboard> {
        let resp = self
            .authorized(self.client.get(self.url(&["home"])?))?
            .send()
            .await?;
        let data: Value = read_json(resp, "Failed to load dashboard").await?;
        field(data, "dashboard")
    }

    pub async fn profile(&self) -> Result<Profile> {
        let resp = self
            .authorized(self.client.get(self.url(&["profile"])?))?
            .send()
            .await?;
        let data: Value = read_json(resp, "Failed to load profile").await?;
        field(data, "profile")
    }

    pub async fn news(&self) -> Result<Vec<NewsArticle>> {
        let resp = self.client.get(self.url(&["news"])?).send().await?;
        let data: Value = read_json(resp, "Failed to fetch news").await?;
        field(data, "articles")
    }

    /// Get the leaderboard
    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<RankedEntry>> {
        let mut url = self.url(&["leaderboard"])?;
        if let Some(limit) = limit {
            url.query_pairs_mut()
                .append_pair("limit", &limit.to_string());
        }
        let resp = self.client.get(url).send().await?;
        let data: Value = read_json(resp, "Failed to fetch leaderboard").await?;
        field(data, "leaderboard")
    }

    /// The signed-in user's contributions in one category
    pub async fn contributions(&self, category: &str) -> Result<Vec<ContributionRecord>> {
        let resp = self
            .authorized(self.client.get(self.url(&["contributions", category])?))?
            .send()
            .await?;
        let data: Value = read_json(resp, "Failed to fetch contributions").await?;
        field(data, "contributions")
    }

    /// Submit a contribution. Rejections come back as an `UploadResponse`
    /// rather than an error so the server's message can be shown.
    pub async fn upload(&self, body: &UploadBody) -> Result<UploadResponse> {
        let resp = self
            .authorized(self.client.post(self.url(&["uploads"])?))?
            .timeout(UPLOAD_TIMEOUT)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<UploadResponse>(&text) {
            Ok(outcome) => Ok(outcome),
            Err(_) => Err(anyhow!(
                "Upload failed ({}): {}",
                status,
                error_message(&text)
            )),
        }
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: Response, context: &str) -> Result<T> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp.json().await?)
    } else {
        let error_text = resp.text().await.unwrap_or_else(|_| "Unknown error".into());
        Err(anyhow!("{} ({}): {}", context, status, error_message(&error_text)))
    }
}

fn field<T: serde::de::DeserializeOwned>(mut data: Value, name: &str) -> Result<T> {
    let value = data
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| anyhow!("Unexpected server response: missing `{}`", name))?;
    Ok(serde_json::from_value(value)?)
}

/// The `error` field of a JSON error body, or the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
