//! Fiscal submission service boundary.

use async_trait::async_trait;
use thiserror::Error;

use caja_core::{EmployeeId, InvoiceId};
use caja_invoicing::{FiscalResponse, LineItem, SubmissionFailure};

/// The invoice data sent to the authority.
///
/// Carries the stable invoice identity so a retried submission is recognizable
/// upstream as the same logical invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSubmission {
    pub invoice_id: InvoiceId,
    pub employee_id: EmployeeId,
    pub items: Vec<LineItem>,
    pub total: u64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FiscalServiceError {
    /// Transport failure; the submission may or may not have reached the
    /// authority.
    #[error("connectivity failure: {0}")]
    Connectivity(String),

    /// The authority evaluated and rejected the invoice data.
    #[error("rejected by authority: {0}")]
    Rejected(String),

    #[error("unknown failure: {0}")]
    Unknown(String),
}

impl From<FiscalServiceError> for SubmissionFailure {
    fn from(value: FiscalServiceError) -> Self {
        match value {
            FiscalServiceError::Connectivity(msg) => SubmissionFailure::Connectivity(msg),
            FiscalServiceError::Rejected(msg) => SubmissionFailure::RejectedByAuthority(msg),
            FiscalServiceError::Unknown(msg) => SubmissionFailure::Unknown(msg),
        }
    }
}

/// External fiscal authority collaborator.
#[async_trait]
pub trait FiscalService: Send + Sync {
    /// Submit an invoice for issuance.
    async fn submit(
        &self,
        submission: &InvoiceSubmission,
    ) -> Result<FiscalResponse, FiscalServiceError>;

    /// Ask whether the authority already issued this invoice.
    ///
    /// Used to reconcile an invoice left mid-submission by a crash: the
    /// coordinator must know the upstream outcome before it allows a fresh
    /// submit.
    async fn find_issued(
        &self,
        invoice_id: InvoiceId,
    ) -> Result<Option<FiscalResponse>, FiscalServiceError>;
}
