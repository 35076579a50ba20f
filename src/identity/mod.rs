//! Identity provider abstraction
//!
//! Email/password accounts and session tokens are owned by an external
//! identity service. The service only needs three calls from it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod toolkit;

pub use memory::MemoryIdentity;
pub use toolkit::IdentityToolkit;

/// Signed-in user and the bearer token proving it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    /// Rejected credentials or registration; the message is shown as-is
    #[error("{0}")]
    Auth(String),
    #[error("identity service unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Exchange credentials for a session
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Resolve a session token to its user id; `None` for unknown or
    /// expired tokens
    async fn current_user(&self, token: &str) -> Result<Option<String>, IdentityError>;
}
