//! Identity Toolkit REST client
//!
//! Talks to the managed identity service's v1 REST API:
//! - `accounts:signUp`
//! - `accounts:signInWithPassword`
//! - `accounts:lookup` (validates an ID token)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{IdentityError, IdentityProvider, Session};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    id_token: String,
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    id_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct IdentityToolkit {
    client: Client,
    base_url: String,
    api_key: String,
}

impl IdentityToolkit {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        let api_key = api_key.into();
        if api_key.is_empty() {
            warn!("Identity client initialized WITHOUT api key - every call will be rejected");
        } else {
            info!("Identity client initialized");
        }

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/accounts:{}?key={}", self.base_url, method, self.api_key)
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, IdentityError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };

        let resp = self
            .client
            .post(self.endpoint(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            let message = error_message(&resp.text().await.unwrap_or_default());
            debug!("Identity {} rejected: {}", method, message);
            return Err(IdentityError::Auth(message));
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(format!(
                "accounts:{} returned {}",
                method, status
            )));
        }

        let auth: AuthResponse = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(Session {
            user_id: auth.local_id,
            email: auth.email.unwrap_or_else(|| email.to_string()),
            token: auth.id_token,
        })
    }
}

/// Pull the provider's error code out of an error body, falling back to
/// the raw text
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.is_empty() => "Authentication failed".to_string(),
        Err(_) => body.to_string(),
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkit {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let session = self.password_call("signUp", email, password).await?;
        info!("Created account {}", session.user_id);
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        self.password_call("signInWithPassword", email, password)
            .await
    }

    async fn current_user(&self, token: &str) -> Result<Option<String>, IdentityError> {
        let resp = self
            .client
            .post(self.endpoint("lookup"))
            .json(&LookupRequest { id_token: token })
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status.is_client_error() {
            // INVALID_ID_TOKEN, TOKEN_EXPIRED, USER_NOT_FOUND
            return Ok(None);
        }
        if !status.is_success() {
            return Err(IdentityError::Unavailable(format!(
                "accounts:lookup returned {}",
                status
            )));
        }

        let lookup: LookupResponse = resp
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        Ok(lookup.users.into_iter().next().map(|u| u.local_id))
    }
}
