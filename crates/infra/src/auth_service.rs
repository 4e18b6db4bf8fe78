//! Authentication service boundary.
//!
//! The backend that actually checks credentials is an external collaborator;
//! this trait is everything the session manager needs from it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use caja_auth::{AuthError, Role, SessionToken, UserProfile};

/// Successful authentication: a profile plus a bearer token for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub user: UserProfile,
    pub token: SessionToken,
    /// Absent when the backend issues non-expiring tokens.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Profile data for account creation. Validation happens before this is built.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthServiceError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("email already registered")]
    DuplicateEmail,

    #[error("network error: {0}")]
    Network(String),
}

impl From<AuthServiceError> for AuthError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            AuthServiceError::InvalidCredentials => AuthError::InvalidCredentials,
            AuthServiceError::DuplicateEmail => AuthError::DuplicateEmail,
            AuthServiceError::Network(msg) => AuthError::Network(msg),
        }
    }
}

/// External authentication collaborator.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Validate credentials and mint a token.
    async fn authenticate(&self, email: &str, password: &str)
    -> Result<AuthGrant, AuthServiceError>;

    /// Create an account and mint a token for it.
    async fn create_account(&self, account: NewAccount) -> Result<AuthGrant, AuthServiceError>;
}
