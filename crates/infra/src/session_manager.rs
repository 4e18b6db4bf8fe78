//! Session lifecycle: login, registration, logout, rehydration.
//!
//! The manager owns the observable `SessionState` and is the only writer to
//! it. Mutating operations are serialized through one async lock, so a logout
//! racing a login resolves to a single consistent terminal state, and the
//! credential store is always updated before observers can see the session.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::Mutex;
use tracing::{info, warn};

use caja_auth::{
    AccessDecision, AuthError, RegistrationRequest, Role, Session, SessionState, decide,
};
use chrono::Utc;

use crate::auth_service::{AuthGrant, AuthService, NewAccount};
use crate::credential_store::CredentialStore;
use crate::kv_store::KeyValueStore;

/// Owns the active session for one client context.
pub struct SessionManager<A, S> {
    auth: A,
    credentials: CredentialStore<S>,
    state: RwLock<SessionState>,
    /// Serializes login/register/logout/rehydrate relative to each other.
    op_lock: Mutex<()>,
}

impl<A: AuthService, S: KeyValueStore> SessionManager<A, S> {
    pub fn new(auth: A, store: Arc<S>) -> Self {
        Self {
            auth,
            credentials: CredentialStore::new(store),
            state: RwLock::new(SessionState::default()),
            op_lock: Mutex::new(()),
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SessionState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the observable state.
    pub fn state(&self) -> SessionState {
        self.read_state().clone()
    }

    /// Gate a protected operation against the current state.
    pub fn decide_access(&self, required: &[Role]) -> AccessDecision {
        decide(&self.read_state(), required)
    }

    /// Validate credentials against the backend and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let _guard = self.op_lock.lock().await;
        self.begin_loading();

        let result = self.auth.authenticate(email, password).await;
        self.finish_authentication(result.map_err(Into::into))
    }

    /// Create an account and open a session for it.
    ///
    /// Caller-fixable validation runs first; a validation failure performs no
    /// network call and leaves any existing session untouched.
    pub async fn register(&self, request: RegistrationRequest) -> Result<Session, AuthError> {
        request.validate()?;

        let _guard = self.op_lock.lock().await;
        self.begin_loading();

        let account = NewAccount {
            name: request.name,
            email: request.email,
            password: request.password,
            role: request.role,
        };
        let result = self.auth.create_account(account).await;
        self.finish_authentication(result.map_err(Into::into))
    }

    /// Close the active session. Never fails: a credential-store error is
    /// logged and the in-memory session is cleared anyway (losing a session
    /// is safe; resurrecting one is not).
    pub async fn logout(&self) {
        let _guard = self.op_lock.lock().await;

        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "failed to clear persisted credentials on logout");
        }
        *self.write_state() = SessionState::default();
        info!("session closed");
    }

    /// Restore a persisted session at startup without re-authenticating.
    ///
    /// The restored session is unverified: the first protected call must
    /// either attest the token (`mark_verified`) or reject it
    /// (`invalidate`).
    pub async fn rehydrate(&self) -> Result<Option<Session>, AuthError> {
        let _guard = self.op_lock.lock().await;

        let stored = self
            .credentials
            .load()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let Some(stored) = stored else {
            return Ok(None);
        };

        let session = stored.into_session();
        if session.is_expired(Utc::now()) {
            info!("persisted session is expired; discarding");
            if let Err(e) = self.credentials.clear() {
                warn!(error = %e, "failed to clear expired credentials");
            }
            return Ok(None);
        }

        *self.write_state() = SessionState::authenticated(session.clone());
        info!(user = %session.user.email, "session rehydrated (unverified)");
        Ok(Some(session))
    }

    /// The backend attested the rehydrated token on a protected call.
    pub fn mark_verified(&self) {
        let mut state = self.write_state();
        if let Some(session) = &mut state.session {
            session.verified = true;
        }
    }

    /// The backend rejected the token: destroy the session and credentials.
    pub async fn invalidate(&self) {
        let _guard = self.op_lock.lock().await;

        if let Err(e) = self.credentials.clear() {
            warn!(error = %e, "failed to clear persisted credentials on invalidation");
        }
        let mut state = self.write_state();
        state.session = None;
        state.is_loading = false;
        state.last_error = Some(AuthError::InvalidCredentials);
    }

    /// Reset the last-error state. Pure state change, no side effects.
    pub fn clear_error(&self) {
        self.write_state().last_error = None;
    }

    fn begin_loading(&self) {
        let mut state = self.write_state();
        state.is_loading = true;
        state.last_error = None;
    }

    /// Common tail of login/register: persist first, then publish the session
    /// to observers in one state write. On error, record it and leave any
    /// previous session as it was.
    fn finish_authentication(
        &self,
        result: Result<AuthGrant, AuthError>,
    ) -> Result<Session, AuthError> {
        match result {
            Ok(grant) => {
                let session = Session {
                    token: grant.token,
                    user: grant.user,
                    issued_at: Utc::now(),
                    expires_at: grant.expires_at,
                    verified: true,
                };

                if let Err(e) = self.credentials.save(&session) {
                    let error = AuthError::Network(format!("failed to persist session: {e}"));
                    let mut state = self.write_state();
                    state.is_loading = false;
                    state.last_error = Some(error.clone());
                    return Err(error);
                }

                *self.write_state() = SessionState::authenticated(session.clone());
                info!(user = %session.user.email, role = %session.user.role, "session opened");
                Ok(session)
            }
            Err(error) => {
                let mut state = self.write_state();
                state.is_loading = false;
                state.last_error = Some(error.clone());
                Err(error)
            }
        }
    }
}
