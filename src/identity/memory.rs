//! In-process identity provider for tests and local runs
//!
//! Passwords are stored as salted SHA-256 digests; sessions are random
//! UUID tokens that live as long as the process. At most `MAX_SESSIONS`
//! are kept, and opening one more drops the oldest. Error messages use the
//! same codes as the hosted provider.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{IdentityError, IdentityProvider, Session};

const MIN_PASSWORD_LEN: usize = 6;
const MAX_SESSIONS: usize = 10_000;

struct Account {
    user_id: String,
    salt: String,
    digest: String,
}

/// Token to user id, plus tokens in the order they were opened
#[derive(Default)]
struct Sessions {
    users: HashMap<String, String>,
    opened: VecDeque<String>,
}

pub struct MemoryIdentity {
    accounts: RwLock<HashMap<String, Account>>,
    sessions: RwLock<Sessions>,
    max_sessions: usize,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::with_session_limit(MAX_SESSIONS)
    }
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_limit(max_sessions: usize) -> Self {
        Self {
            accounts: RwLock::default(),
            sessions: RwLock::default(),
            max_sessions: max_sessions.max(1),
        }
    }

    fn open_session(&self, user_id: &str, email: &str) -> Session {
        let token = uuid::Uuid::new_v4().to_string();
        {
            let mut sessions = self.sessions.write();
            while sessions.opened.len() >= self.max_sessions {
                match sessions.opened.pop_front() {
                    Some(oldest) => {
                        sessions.users.remove(&oldest);
                    }
                    None => break,
                }
            }
            sessions.opened.push_back(token.clone());
            sessions.users.insert(token.clone(), user_id.to_string());
        }
        Session {
            user_id: user_id.to_string(),
            email: email.to_string(),
            token,
        }
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Err(IdentityError::Auth("INVALID_EMAIL".to_string()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(IdentityError::Auth(
                "WEAK_PASSWORD : Password should be at least 6 characters".to_string(),
            ));
        }

        let user_id = {
            let mut accounts = self.accounts.write();
            if accounts.contains_key(&email) {
                return Err(IdentityError::Auth("EMAIL_EXISTS".to_string()));
            }

            let user_id = uuid::Uuid::new_v4().simple().to_string();
            let salt = uuid::Uuid::new_v4().simple().to_string();
            accounts.insert(
                email.clone(),
                Account {
                    user_id: user_id.clone(),
                    digest: password_digest(&salt, password),
                    salt,
                },
            );
            user_id
        };

        info!("Created account {}", user_id);
        Ok(self.open_session(&user_id, &email))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let email = normalize_email(email);
        let user_id = {
            let accounts = self.accounts.read();
            let account = accounts
                .get(&email)
                .ok_or_else(|| IdentityError::Auth("INVALID_LOGIN_CREDENTIALS".to_string()))?;
            if password_digest(&account.salt, password) != account.digest {
                return Err(IdentityError::Auth("INVALID_LOGIN_CREDENTIALS".to_string()));
            }
            account.user_id.clone()
        };

        Ok(self.open_session(&user_id, &email))
    }

    async fn current_user(&self, token: &str) -> Result<Option<String>, IdentityError> {
        Ok(self.sessions.read().users.get(token).cloned())
    }
}
