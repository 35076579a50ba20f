//! AI image verification
//!
//! Asks a generative model whether an uploaded image supports the
//! contribution description. The model must answer with exactly `1`
//! (supports) or `0` (does not); anything else is a failed verification.
//! Calls are never retried.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// What the classifier is asked to judge
#[derive(Debug, Clone)]
pub struct VerificationRequest<'a> {
    pub description: &'a str,
    pub category: &'a str,
    pub language: &'a str,
    /// Base64 (standard alphabet) image bytes
    pub image_base64: &'a str,
    pub mime_type: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The model answered "1"
    Supported,
    /// The model answered "0"
    NotSupported,
}

#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Transport failure, non-success status, or a body with no answer in it
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    /// The service answered with text other than "1" or "0"
    #[error("unexpected classifier response: {0}")]
    UnexpectedResponse(String),
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &VerificationRequest<'_>) -> Result<Verdict, ClassifierError>;
}

/// Encode image bytes for the wire
pub fn encode_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Prompt sent alongside the image
pub fn build_prompt(request: &VerificationRequest<'_>) -> String {
    format!(
        r#"Carefully analyze this image and the following description.
The description is: "{description}".
The category is: {category}.
The programming language is: {language}.

Your task is to determine if the image clearly demonstrates or represents the described contribution.

Consider:
1. If the image shows code, does it match the described language and purpose?
2. If the image shows a project/achievement, does it visually represent the description?
3. If the image shows open source contribution, does it show relevant GitHub/activity proof?

If the image clearly relates to and supports the description, return exactly "1".
If the image is unrelated or doesn't support the description, return exactly "0".

Only return "1" or "0" - no other text or explanation."#,
        description = request.description,
        category = request.category,
        language = request.language,
    )
}

// ============================================================================
// GENERATE CONTENT WIRE FORMAT
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize, Deserialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

/// Interpret a generateContent response body.
///
/// A body that isn't JSON or carries no answer text counts as the service
/// being unavailable; only a real answer other than "1" or "0" is an
/// unexpected response.
fn parse_verdict(body: &str) -> Result<Verdict, ClassifierError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| ClassifierError::Unavailable(format!("malformed body: {}", e)))?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| match p {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        })
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ClassifierError::Unavailable("no valid response from model".to_string()))?;

    match text.trim() {
        "1" => Ok(Verdict::Supported),
        "0" => Ok(Verdict::NotSupported),
        other => Err(ClassifierError::UnexpectedResponse(format!(
            "answer {:?}",
            other
        ))),
    }
}

pub struct GeminiClassifier {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClassifier {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        let api_key = api_key.into();
        if api_key.is_empty() {
            warn!("Classifier initialized WITHOUT api key - verifications will fail");
        }

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(&self, request: &VerificationRequest<'_>) -> Result<Verdict, ClassifierError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: build_prompt(request),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: request.mime_type.to_string(),
                            data: request.image_base64.to_string(),
                        },
                    },
                ],
            }],
        };

        debug!(
            "Requesting verification from {} ({} bytes of image data)",
            self.model,
            request.image_base64.len()
        );

        let resp = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!("Classifier error {}: {}", status, text);
            return Err(ClassifierError::Unavailable(format!("HTTP {}", status)));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let verdict = parse_verdict(&text)?;
        info!("Classifier verdict: {:?}", verdict);
        Ok(verdict)
    }
}
