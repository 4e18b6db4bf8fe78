//! `caja-invoicing`: electronic invoice domain.
//!
//! The invoice is the one real state machine in the system: a draft sale is
//! submitted to the fiscal authority, may fail and be retried, and once issued
//! is immutable. The async submission driver lives in `caja-infra`; this crate
//! is pure decision logic plus the QR payload encoder.

pub mod fiscal;
pub mod invoice;
pub mod qr;

pub use fiscal::{FiscalResponse, SubmissionFailure};
pub use invoice::{
    Cancel, ConfirmIssued, Invoice, InvoiceCommand, InvoiceEvent, InvoiceStatus, LineItem,
    OpenDraft, RecordFailure, StartSubmission,
};
pub use qr::{QrEncodeError, encode_qr};
