//! Session model and the observable authentication state.
//!
//! A `Session` is a snapshot of "who is signed in" handed out by the
//! authentication service. The lifecycle operations that create and destroy
//! sessions live in `caja-infra`; everything here is deterministic data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use caja_core::EmployeeId;

use crate::Role;

/// Minimal user profile captured at session issuance.
///
/// Role edits after issuance do not retroactively change an open session;
/// the next login picks them up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: EmployeeId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Opaque bearer credential.
///
/// `Debug` redacts the token so it cannot leak through logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Expose the raw token for transport headers / persistence.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// An authenticated session for the current client context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user: UserProfile,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// `false` for sessions restored optimistically from the credential store:
    /// the token has not been attested by the backend since process start.
    pub verified: bool,
}

impl Session {
    /// Whether the session is past its expiry, if one was issued.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

/// Authentication failure taxonomy surfaced to callers.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// Caller-fixable input problem; no I/O was attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The authentication service rejected the credentials.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Registration rejected: the email is already taken.
    #[error("email already registered")]
    DuplicateEmail,

    /// Transport failure reaching the authentication service.
    #[error("network error: {0}")]
    Network(String),
}

/// Observable authentication state exposed to the UI.
///
/// Mutated only through the session manager's operations, which keep it in
/// lock-step with the persisted credentials.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub session: Option<Session>,
    pub is_loading: bool,
    pub last_error: Option<AuthError>,
}

impl SessionState {
    pub fn authenticated(session: Session) -> Self {
        Self {
            session: Some(session),
            is_loading: false,
            last_error: None,
        }
    }
}

const MIN_PASSWORD_LEN: usize = 8;

/// Input to `register`, validated before any network call.
#[derive(Debug, Clone)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
}

impl RegistrationRequest {
    /// All caller-fixable checks. Runs before the request leaves the process,
    /// so a validation failure never reaches the authentication service.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::Validation("name must not be empty".into()));
        }
        if !self.email.contains('@') {
            return Err(AuthError::Validation(format!(
                "malformed email: {}",
                self.email
            )));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.confirm_password {
            return Err(AuthError::Validation(
                "password confirmation does not match".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn profile() -> UserProfile {
        UserProfile {
            id: EmployeeId::new(),
            name: "Ana".into(),
            email: "a@x.com".into(),
            role: Role::Admin,
        }
    }

    fn request() -> RegistrationRequest {
        RegistrationRequest {
            name: "Ana".into(),
            email: "a@x.com".into(),
            password: "secret-enough".into(),
            confirm_password: "secret-enough".into(),
            role: Role::Employee,
        }
    }

    #[test]
    fn debug_never_prints_the_token() {
        let token = SessionToken::new("tok-123-secret");
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("tok-123-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn session_without_expiry_never_expires() {
        let session = Session {
            token: SessionToken::new("t"),
            user: profile(),
            issued_at: Utc::now(),
            expires_at: None,
            verified: true,
        };
        assert!(!session.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn session_expires_at_boundary() {
        let now = Utc::now();
        let session = Session {
            token: SessionToken::new("t"),
            user: profile(),
            issued_at: now,
            expires_at: Some(now + Duration::hours(1)),
            verified: true,
        };
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::hours(1)));
    }

    #[test]
    fn registration_rejects_short_password() {
        let mut req = request();
        req.password = "short".into();
        req.confirm_password = "short".into();
        assert!(matches!(req.validate(), Err(AuthError::Validation(_))));
    }

    #[test]
    fn registration_rejects_mismatched_confirmation() {
        let mut req = request();
        req.confirm_password = "something-else".into();
        let err = req.validate().unwrap_err();
        match err {
            AuthError::Validation(msg) => assert!(msg.contains("confirmation")),
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn registration_accepts_valid_input() {
        assert!(request().validate().is_ok());
    }
}
