//! `caja-auth`: pure session, role, and PIN domain.
//!
//! This crate is intentionally decoupled from transport and storage: the
//! session *lifecycle* (login, logout, rehydration) lives in `caja-infra`,
//! which drives the state types defined here.

pub mod access;
pub mod pin;
pub mod roles;
pub mod session;

pub use access::{AccessDecision, decide};
pub use pin::{EmployeeDirectory, EmployeeIdentity, Pin};
pub use roles::Role;
pub use session::{
    AuthError, RegistrationRequest, Session, SessionState, SessionToken, UserProfile,
};
