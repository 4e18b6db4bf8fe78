//! Roles used for access gating.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use caja_core::DomainError;

/// Role assigned to a user or employee.
///
/// This is a closed enumeration on purpose: access decisions match by set
/// membership over these variants, never by comparing raw strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    /// Canonical uppercase spelling, matching the wire format.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Employee => "EMPLOYEE",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    /// Case-insensitive: external services are inconsistent about casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "EMPLOYEE" => Ok(Role::Employee),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}
