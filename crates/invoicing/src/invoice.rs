use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use caja_core::{Aggregate, AggregateRoot, DomainError, EmployeeId, Event, InvoiceId, ProductId};

use crate::fiscal::{FiscalResponse, SubmissionFailure};

/// Invoice status lifecycle.
///
/// Transitions are monotonic: `Draft → Submitting → (Issued | Failed)`,
/// `Failed → Submitting` on retry, `Draft | Failed → Cancelled`. `Issued` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Submitting,
    Issued,
    Failed,
    Cancelled,
}

/// Invoice line for a finalized POS sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

/// Aggregate root: Invoice.
///
/// The identity is stable across submission attempts: a retry resubmits the
/// same logical invoice, which is what lets the fiscal authority and the local
/// ledger deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    id: InvoiceId,
    employee_id: Option<EmployeeId>,
    status: InvoiceStatus,
    items: Vec<LineItem>,
    total: u64,
    attempt_count: u32,
    fiscal_response: Option<FiscalResponse>,
    last_failure: Option<SubmissionFailure>,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            employee_id: None,
            status: InvoiceStatus::Draft,
            items: Vec::new(),
            total: 0,
            attempt_count: 0,
            fiscal_response: None,
            last_failure: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.employee_id
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Exact sum of line totals in the smallest currency unit.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Present iff the invoice is `Issued`.
    pub fn fiscal_response(&self) -> Option<&FiscalResponse> {
        self.fiscal_response.as_ref()
    }

    pub fn last_failure(&self) -> Option<&SubmissionFailure> {
        self.last_failure.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, InvoiceStatus::Issued | InvoiceStatus::Cancelled)
    }

    /// Whether `StartSubmission` would actually begin an attempt.
    pub fn is_submittable(&self) -> bool {
        matches!(self.status, InvoiceStatus::Draft | InvoiceStatus::Failed)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Capture a finalized POS sale as a draft invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDraft {
    pub invoice_id: InvoiceId,
    pub employee_id: EmployeeId,
    pub items: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Begin (or retry) submission to the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartSubmission {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// The authority accepted the submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmIssued {
    pub invoice_id: InvoiceId,
    pub fiscal_response: FiscalResponse,
    pub occurred_at: DateTime<Utc>,
}

/// The attempt resolved without an approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    pub invoice_id: InvoiceId,
    pub failure: SubmissionFailure,
    pub occurred_at: DateTime<Utc>,
}

/// Discard the invoice before it reaches the authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    OpenDraft(OpenDraft),
    StartSubmission(StartSubmission),
    ConfirmIssued(ConfirmIssued),
    RecordFailure(RecordFailure),
    Cancel(Cancel),
}

/// Event: DraftOpened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftOpened {
    pub invoice_id: InvoiceId,
    pub employee_id: EmployeeId,
    pub items: Vec<LineItem>,
    pub total: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SubmissionStarted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStarted {
    pub invoice_id: InvoiceId,
    /// 1-based attempt number; increments on every (re)submission.
    pub attempt: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub fiscal_response: FiscalResponse,
    pub occurred_at: DateTime<Utc>,
}

/// Event: SubmissionFailed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionFailed {
    pub invoice_id: InvoiceId,
    pub failure: SubmissionFailure,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCancelled {
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    DraftOpened(DraftOpened),
    SubmissionStarted(SubmissionStarted),
    InvoiceIssued(InvoiceIssued),
    SubmissionFailed(SubmissionFailed),
    InvoiceCancelled(InvoiceCancelled),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::DraftOpened(_) => "invoicing.invoice.draft_opened",
            InvoiceEvent::SubmissionStarted(_) => "invoicing.invoice.submission_started",
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::SubmissionFailed(_) => "invoicing.invoice.submission_failed",
            InvoiceEvent::InvoiceCancelled(_) => "invoicing.invoice.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::DraftOpened(e) => e.occurred_at,
            InvoiceEvent::SubmissionStarted(e) => e.occurred_at,
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::SubmissionFailed(e) => e.occurred_at,
            InvoiceEvent::InvoiceCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::DraftOpened(e) => {
                self.id = e.invoice_id;
                self.employee_id = Some(e.employee_id);
                self.items = e.items.clone();
                self.total = e.total;
                self.status = InvoiceStatus::Draft;
                self.created = true;
            }
            InvoiceEvent::SubmissionStarted(e) => {
                self.status = InvoiceStatus::Submitting;
                self.attempt_count = e.attempt;
            }
            InvoiceEvent::InvoiceIssued(e) => {
                self.status = InvoiceStatus::Issued;
                self.fiscal_response = Some(e.fiscal_response.clone());
                self.last_failure = None;
            }
            InvoiceEvent::SubmissionFailed(e) => {
                self.status = InvoiceStatus::Failed;
                self.last_failure = Some(e.failure.clone());
            }
            InvoiceEvent::InvoiceCancelled(_) => {
                self.status = InvoiceStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::OpenDraft(cmd) => self.handle_open(cmd),
            InvoiceCommand::StartSubmission(cmd) => self.handle_start(cmd),
            InvoiceCommand::ConfirmIssued(cmd) => self.handle_issued(cmd),
            InvoiceCommand::RecordFailure(cmd) => self.handle_failure(cmd),
            InvoiceCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Invoice {
    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenDraft) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }

        if cmd.items.is_empty() {
            return Err(DomainError::validation("cannot open invoice without items"));
        }

        let mut total: u64 = 0;
        for item in &cmd.items {
            if item.quantity <= 0 {
                return Err(DomainError::validation(
                    "line item quantity must be positive",
                ));
            }
            if item.unit_price == 0 {
                return Err(DomainError::validation(
                    "line item unit_price must be positive",
                ));
            }
            let line_total = (item.quantity as u128)
                .checked_mul(item.unit_price as u128)
                .filter(|t| *t <= u64::MAX as u128)
                .ok_or_else(|| DomainError::invariant("line item amount overflow"))?;
            total = total
                .checked_add(line_total as u64)
                .ok_or_else(|| DomainError::invariant("invoice total overflow"))?;
        }

        Ok(vec![InvoiceEvent::DraftOpened(DraftOpened {
            invoice_id: cmd.invoice_id,
            employee_id: cmd.employee_id,
            items: cmd.items.clone(),
            total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start(&self, cmd: &StartSubmission) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        match self.status {
            InvoiceStatus::Draft | InvoiceStatus::Failed => {
                Ok(vec![InvoiceEvent::SubmissionStarted(SubmissionStarted {
                    invoice_id: cmd.invoice_id,
                    attempt: self.attempt_count + 1,
                    occurred_at: cmd.occurred_at,
                })])
            }
            // A prior attempt already succeeded (e.g. the response to a
            // retried request was lost). Short-circuit: no new attempt, no
            // mutation of the issued invoice.
            InvoiceStatus::Issued => Ok(vec![]),
            InvoiceStatus::Submitting => Err(DomainError::conflict(
                "a submission for this invoice is already in flight",
            )),
            InvoiceStatus::Cancelled => Err(DomainError::invariant(
                "cannot submit a cancelled invoice",
            )),
        }
    }

    fn handle_issued(&self, cmd: &ConfirmIssued) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        match self.status {
            InvoiceStatus::Submitting => {
                if cmd.fiscal_response.total != self.total {
                    return Err(DomainError::invariant(
                        "authority total does not match invoice total",
                    ));
                }
                Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
                    invoice_id: cmd.invoice_id,
                    fiscal_response: cmd.fiscal_response.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            // Already issued: nothing to do, nothing to mutate.
            InvoiceStatus::Issued => Ok(vec![]),
            _ => Err(DomainError::invariant(
                "issuance can only be confirmed while submitting",
            )),
        }
    }

    fn handle_failure(&self, cmd: &RecordFailure) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.status != InvoiceStatus::Submitting {
            return Err(DomainError::invariant(
                "failures can only be recorded while submitting",
            ));
        }

        Ok(vec![InvoiceEvent::SubmissionFailed(SubmissionFailed {
            invoice_id: cmd.invoice_id,
            failure: cmd.failure.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        match self.status {
            InvoiceStatus::Draft | InvoiceStatus::Failed => {
                Ok(vec![InvoiceEvent::InvoiceCancelled(InvoiceCancelled {
                    invoice_id: cmd.invoice_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            // Once sent, the authority may have committed it; the only way
            // out of Submitting is resolution to Issued or Failed.
            InvoiceStatus::Submitting => Err(DomainError::conflict(
                "cannot cancel while a submission is in flight",
            )),
            InvoiceStatus::Issued => Err(DomainError::invariant(
                "an issued invoice is immutable",
            )),
            InvoiceStatus::Cancelled => Err(DomainError::conflict(
                "invoice is already cancelled",
            )),
        }
    }
}
