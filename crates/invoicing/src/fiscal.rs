//! Fiscal authority response and submission failure taxonomy.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authority-assigned fields returned on a successful submission.
///
/// Present on an invoice iff its status is `Issued`. All fields come from the
/// authority's response; nothing here is generated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalResponse {
    /// Invoice number in the authority's numbering scheme.
    pub invoice_number: String,
    /// Approval code (CAE-equivalent) proving the authority accepted the invoice.
    pub authorization_code: String,
    /// Date the approval code expires.
    pub authorization_expires: NaiveDate,
    /// Tax identifier of the issuing party.
    pub issuer_tax_id: String,
    /// Business date the invoice was issued under.
    pub issued_on: NaiveDate,
    /// Total amount in the smallest currency unit, as echoed by the authority.
    pub total: u64,
}

/// Why a submission attempt did not end in `Issued`.
///
/// Retained on the invoice so the UI can distinguish "try again" from
/// "fix the data first". The coordinator never retries automatically; it only
/// guarantees a triggered retry is safe.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionFailure {
    /// Transport-level failure or timeout; retry is recommended.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// The authority rejected the invoice data. Retrying without correcting
    /// the data will fail identically.
    #[error("rejected by authority: {0}")]
    RejectedByAuthority(String),

    /// Anything the taxonomy cannot classify.
    #[error("unknown failure: {0}")]
    Unknown(String),
}

impl SubmissionFailure {
    /// Whether an unchanged retry has a chance of succeeding.
    pub fn is_retry_sensible(&self) -> bool {
        matches!(self, SubmissionFailure::Connectivity(_) | SubmissionFailure::Unknown(_))
    }
}
