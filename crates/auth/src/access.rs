//! Access controller: the single gate in front of every protected operation.

use crate::{Role, SessionState};

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Session present and its role is in the required set.
    Allow,
    /// Session present but the role is not in the required set.
    Deny,
    /// No session, or authentication is still resolving.
    LoginRequired,
}

/// Decide whether the current authentication state may perform an operation
/// that requires one of `required` roles.
///
/// - No IO
/// - No panics
/// - No clocks: same inputs always produce the same decision
///
/// An empty `required` set means "any authenticated session".
pub fn decide(state: &SessionState, required: &[Role]) -> AccessDecision {
    if state.is_loading {
        return AccessDecision::LoginRequired;
    }

    let Some(session) = &state.session else {
        return AccessDecision::LoginRequired;
    };

    if required.is_empty() || required.contains(&session.user.role) {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny
    }
}
