//! Durable session credentials.
//!
//! A successful login persists the token + profile so the session survives a
//! process restart; logout removes them. The session manager keeps this store
//! and its in-memory state in lock-step.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caja_auth::{Session, SessionToken, UserProfile};

use crate::kv_store::{KeyValueStore, KvError};

const CREDENTIALS_KEY: &str = "auth:credentials";

/// What survives a restart. `verified` is deliberately not stored: a restored
/// session is always unverified until the backend attests the token again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub token: SessionToken,
    pub user: UserProfile,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    /// Rebuild an (unverified) session from persisted credentials.
    pub fn into_session(self) -> Session {
        Session {
            token: self.token,
            user: self.user,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            verified: false,
        }
    }
}

/// Credential store over the shared key-value backing.
#[derive(Debug, Clone)]
pub struct CredentialStore<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Result<Option<StoredCredentials>, KvError> {
        let Some(bytes) = self.store.get(CREDENTIALS_KEY)? else {
            return Ok(None);
        };
        let credentials = serde_json::from_slice(&bytes)
            .map_err(|e| KvError::Serialization(e.to_string()))?;
        Ok(Some(credentials))
    }

    pub fn save(&self, session: &Session) -> Result<(), KvError> {
        let credentials = StoredCredentials {
            token: session.token.clone(),
            user: session.user.clone(),
            issued_at: session.issued_at,
            expires_at: session.expires_at,
        };
        let bytes = serde_json::to_vec(&credentials)
            .map_err(|e| KvError::Serialization(e.to_string()))?;
        self.store.set(CREDENTIALS_KEY, &bytes)
    }

    pub fn clear(&self) -> Result<(), KvError> {
        self.store.remove(CREDENTIALS_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::InMemoryKvStore;
    use caja_auth::Role;
    use caja_core::EmployeeId;

    fn session() -> Session {
        Session {
            token: SessionToken::new("tok-1"),
            user: UserProfile {
                id: EmployeeId::new(),
                name: "Ana".into(),
                email: "a@x.com".into(),
                role: Role::Admin,
            },
            issued_at: Utc::now(),
            expires_at: None,
            verified: true,
        }
    }

    #[test]
    fn save_load_round_trip_drops_verified() {
        let store = CredentialStore::new(Arc::new(InMemoryKvStore::new()));
        let session = session();
        store.save(&session).unwrap();

        let restored = store.load().unwrap().unwrap().into_session();
        assert_eq!(restored.token, session.token);
        assert_eq!(restored.user, session.user);
        assert!(!restored.verified);
    }

    #[test]
    fn clear_removes_credentials() {
        let store = CredentialStore::new(Arc::new(InMemoryKvStore::new()));
        store.save(&session()).unwrap();
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn load_on_empty_store_is_none() {
        let store: CredentialStore<InMemoryKvStore> =
            CredentialStore::new(Arc::new(InMemoryKvStore::new()));
        assert!(store.load().unwrap().is_none());
    }
}
