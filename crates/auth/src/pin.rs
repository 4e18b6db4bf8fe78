//! Employee PIN verification for shared point-of-sale terminals.
//!
//! The PIN path attributes a sale to a cashier without creating or touching a
//! `Session`: POS terminals keep one device-level session for back-office
//! access, and cashiers swap with a numeric PIN.

use serde::{Deserialize, Serialize};

use caja_core::EmployeeId;

use crate::Role;

/// Numeric PIN secret.
///
/// Redacted in `Debug` output; PINs must never reach logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pin(String);

impl Pin {
    pub fn new(pin: impl Into<String>) -> Self {
        Self(pin.into())
    }

    fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

impl core::fmt::Debug for Pin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Pin(***)")
    }
}

/// Employee record used by the PIN path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeIdentity {
    pub id: EmployeeId,
    pub name: String,
    pub pin: Pin,
    pub role: Role,
    pub is_active: bool,
}

/// In-memory directory of employees known to a terminal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmployeeDirectory {
    employees: Vec<EmployeeIdentity>,
}

impl EmployeeDirectory {
    pub fn new(employees: Vec<EmployeeIdentity>) -> Self {
        Self { employees }
    }

    pub fn upsert(&mut self, employee: EmployeeIdentity) {
        match self.employees.iter_mut().find(|e| e.id == employee.id) {
            Some(existing) => *existing = employee,
            None => self.employees.push(employee),
        }
    }

    /// Look up an active employee by PIN equality.
    ///
    /// Returns `None` (not an error) when nothing matches or the matching
    /// employee is inactive; the terminal simply shows "wrong PIN".
    pub fn verify(&self, pin: &str) -> Option<&EmployeeIdentity> {
        self.employees
            .iter()
            .find(|e| e.is_active && e.pin.matches(pin))
    }
}
