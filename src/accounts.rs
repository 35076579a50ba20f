//! Sign-up and sign-in
//!
//! Accounts live in the identity provider; the profile shown in the app
//! lives in the `users` collection under the same id.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::identity::{IdentityError, IdentityProvider, Session};
use crate::models::{User, USERS};
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub college: String,
    #[serde(default)]
    pub bio: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("account created but profile could not be saved: {0}")]
    Profile(#[source] StoreError),
}

pub struct Accounts {
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn DocumentStore>,
}

impl Accounts {
    pub fn new(identity: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self { identity, store }
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<Session, AccountError> {
        for (field, value) in [
            ("name", &request.name),
            ("email", &request.email),
            ("password", &request.password),
        ] {
            if value.trim().is_empty() {
                return Err(AccountError::Missing(field));
            }
        }

        let session = self
            .identity
            .sign_up(request.email.trim(), &request.password)
            .await?;

        let user = User {
            id: session.user_id.clone(),
            name: request.name.trim().to_string(),
            email: session.email.clone(),
            bio: request.bio,
            college: request.college,
            avatar_url: None,
        };

        if let Err(e) = self
            .store
            .put(USERS, &user.id, user.to_document(), false)
            .await
        {
            warn!("Profile write for {} failed: {}", user.id, e);
            return Err(AccountError::Profile(e));
        }

        info!("Signed up {} ({})", user.name, user.id);
        Ok(session)
    }

    pub async fn sign_in(&self, request: SignInRequest) -> Result<Session, AccountError> {
        if request.email.trim().is_empty() {
            return Err(AccountError::Missing("email"));
        }
        if request.password.is_empty() {
            return Err(AccountError::Missing("password"));
        }

        let session = self
            .identity
            .sign_in(request.email.trim(), &request.password)
            .await?;
        info!("User logged in: {}", session.user_id);
        Ok(session)
    }

    /// User id behind a bearer token
    pub async fn current_user(&self, token: &str) -> Result<Option<String>, IdentityError> {
        self.identity.current_user(token).await
    }
}
