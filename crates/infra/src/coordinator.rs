//! Invoice issuance coordinator.
//!
//! Drives one invoice through `Draft → Submitting → (Issued | Failed)` against
//! the external fiscal service, persisting a snapshot after every transition
//! and appending exactly one sales-ledger event on issuance. Retry is always
//! user-triggered; the coordinator's job is to make a triggered retry safe:
//! same invoice identity, no duplicate ledger events, no mutation once issued.

use std::sync::{Arc, RwLock, RwLockReadGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use caja_core::{Aggregate, DomainError, EmployeeId, Event, InvoiceId};
use caja_invoicing::{
    Cancel, ConfirmIssued, FiscalResponse, Invoice, InvoiceCommand, InvoiceEvent, InvoiceStatus,
    LineItem, OpenDraft, QrEncodeError, RecordFailure, StartSubmission, SubmissionFailure,
    encode_qr,
};
use caja_ledger::SalesEvent;
use chrono::Utc;

use crate::fiscal_service::{FiscalService, InvoiceSubmission};
use crate::invoice_store::InvoiceStore;
use crate::kv_store::{KeyValueStore, KvError};
use crate::ledger_store::LedgerStore;

const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Another submit/retry/cancel for this invoice is currently running.
    /// The call is rejected, never queued.
    #[error("an operation on this invoice is already in flight")]
    ConflictingOperation,

    /// The state machine rejected the transition.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The submission attempt resolved to Failed; the taxonomy tells the
    /// caller whether a retry makes sense.
    #[error("submission failed: {0}")]
    Submission(SubmissionFailure),

    /// No persisted snapshot for the requested invoice.
    #[error("unknown invoice: {0}")]
    UnknownInvoice(InvoiceId),

    /// The invoice has no fiscal response yet.
    #[error("invoice is not issued")]
    NotIssued,

    #[error(transparent)]
    Storage(#[from] KvError),

    #[error(transparent)]
    Qr(#[from] QrEncodeError),
}

/// Observable snapshot exposed to the POS screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceState {
    pub status: InvoiceStatus,
    pub invoice: Invoice,
    pub last_error: Option<SubmissionFailure>,
}

/// Orchestrates submission of a single invoice.
pub struct IssuanceCoordinator<F, S> {
    fiscal: F,
    invoices: InvoiceStore<S>,
    ledger: LedgerStore<S>,
    invoice: RwLock<Invoice>,
    /// Serializes submit/retry/cancel/reconcile; `try_lock` turns a
    /// concurrent second call into `ConflictingOperation`.
    op_lock: Mutex<()>,
    submit_timeout: Duration,
}

impl<F: FiscalService, S: KeyValueStore> IssuanceCoordinator<F, S> {
    /// Open a fresh draft invoice for a finalized sale and persist it.
    pub fn open(
        fiscal: F,
        store: Arc<S>,
        employee_id: EmployeeId,
        items: Vec<LineItem>,
    ) -> Result<Self, CoordinatorError> {
        let invoice_id = InvoiceId::new();
        let mut invoice = Invoice::empty(invoice_id);
        let events = invoice.handle(&InvoiceCommand::OpenDraft(OpenDraft {
            invoice_id,
            employee_id,
            items,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            invoice.apply(event);
        }

        let coordinator = Self::with_invoice(fiscal, store, invoice);
        coordinator.invoices.save(&coordinator.read_invoice())?;
        Ok(coordinator)
    }

    /// Resume an invoice from its persisted snapshot.
    ///
    /// An invoice loaded in `Submitting` was interrupted mid-attempt; call
    /// `reconcile` before anything else.
    pub fn load(fiscal: F, store: Arc<S>, invoice_id: InvoiceId) -> Result<Self, CoordinatorError> {
        let invoices = InvoiceStore::new(Arc::clone(&store));
        let invoice = invoices
            .load(invoice_id)?
            .ok_or(CoordinatorError::UnknownInvoice(invoice_id))?;
        Ok(Self::with_invoice(fiscal, store, invoice))
    }

    fn with_invoice(fiscal: F, store: Arc<S>, invoice: Invoice) -> Self {
        Self {
            fiscal,
            invoices: InvoiceStore::new(Arc::clone(&store)),
            ledger: LedgerStore::new(store),
            invoice: RwLock::new(invoice),
            op_lock: Mutex::new(()),
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Bounded timeout for the fiscal call; elapsing surfaces as a
    /// connectivity failure.
    pub fn with_submit_timeout(mut self, submit_timeout: Duration) -> Self {
        self.submit_timeout = submit_timeout;
        self
    }

    fn read_invoice(&self) -> RwLockReadGuard<'_, Invoice> {
        self.invoice.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Observable state snapshot.
    pub fn state(&self) -> IssuanceState {
        let invoice = self.read_invoice().clone();
        IssuanceState {
            status: invoice.status(),
            last_error: invoice.last_failure().cloned(),
            invoice,
        }
    }

    /// QR payload for the issued invoice's fiscal response.
    pub fn qr_payload(&self) -> Result<String, CoordinatorError> {
        let invoice = self.read_invoice();
        let fiscal = invoice.fiscal_response().ok_or(CoordinatorError::NotIssued)?;
        Ok(encode_qr(fiscal)?)
    }

    /// Submit the invoice to the fiscal authority.
    ///
    /// Legal from Draft and Failed. Already-issued invoices short-circuit to
    /// the existing fiscal response without contacting the authority; the
    /// ledger record is re-asserted (idempotently) on that path, since a
    /// crash can separate the issued snapshot from its ledger write. A
    /// concurrent call is rejected with `ConflictingOperation`.
    pub async fn submit(&self) -> Result<FiscalResponse, CoordinatorError> {
        let _guard = self
            .op_lock
            .try_lock()
            .map_err(|_| CoordinatorError::ConflictingOperation)?;

        let mut invoice = self.read_invoice().clone();

        if let Some(fiscal) = invoice.fiscal_response() {
            let fiscal = fiscal.clone();
            self.assert_ledger_record(&invoice, &fiscal)?;
            info!(invoice_id = %invoice.id_typed(), "invoice already issued; short-circuiting");
            return Ok(fiscal);
        }

        let events = invoice.handle(&InvoiceCommand::StartSubmission(StartSubmission {
            invoice_id: invoice.id_typed(),
            occurred_at: Utc::now(),
        }))?;
        self.apply_and_persist(&mut invoice, &events)?;

        let submission = InvoiceSubmission {
            invoice_id: invoice.id_typed(),
            employee_id: invoice
                .employee_id()
                .ok_or_else(|| DomainError::invariant("invoice has no employee"))?,
            items: invoice.items().to_vec(),
            total: invoice.total(),
        };

        info!(
            invoice_id = %submission.invoice_id,
            attempt = invoice.attempt_count(),
            total = submission.total,
            "submitting invoice to fiscal authority"
        );

        let outcome = match timeout(self.submit_timeout, self.fiscal.submit(&submission)).await {
            Ok(result) => result,
            Err(_) => Err(crate::fiscal_service::FiscalServiceError::Connectivity(
                "fiscal submission timed out".to_string(),
            )),
        };

        match outcome {
            Ok(fiscal) => self.finalize_issued(&mut invoice, fiscal),
            Err(e) => self.record_failure(&mut invoice, e.into()),
        }
    }

    /// Re-enter submission after a failure, with the same invoice identity.
    pub async fn retry(&self) -> Result<FiscalResponse, CoordinatorError> {
        if self.read_invoice().status() != InvoiceStatus::Failed {
            return Err(DomainError::invariant("retry is only legal from a failed submission").into());
        }
        self.submit().await
    }

    /// Discard the invoice. Legal from Draft and Failed; never touches the
    /// ledger.
    pub async fn cancel(&self) -> Result<(), CoordinatorError> {
        let _guard = self
            .op_lock
            .try_lock()
            .map_err(|_| CoordinatorError::ConflictingOperation)?;

        let mut invoice = self.read_invoice().clone();
        let events = invoice.handle(&InvoiceCommand::Cancel(Cancel {
            invoice_id: invoice.id_typed(),
            occurred_at: Utc::now(),
        }))?;
        self.apply_and_persist(&mut invoice, &events)?;
        Ok(())
    }

    /// Resolve an invoice that a crash left in `Submitting`.
    ///
    /// Queries the authority by invoice identity: if it was issued upstream,
    /// finalize locally (including the ledger event); if the authority has no
    /// record, mark the attempt failed so a fresh user-triggered submit is
    /// safe. A query failure leaves the invoice in `Submitting`.
    pub async fn reconcile(&self) -> Result<InvoiceStatus, CoordinatorError> {
        let _guard = self
            .op_lock
            .try_lock()
            .map_err(|_| CoordinatorError::ConflictingOperation)?;

        let mut invoice = self.read_invoice().clone();
        if invoice.status() != InvoiceStatus::Submitting {
            return Ok(invoice.status());
        }

        match self.fiscal.find_issued(invoice.id_typed()).await {
            Ok(Some(fiscal)) => {
                info!(invoice_id = %invoice.id_typed(), "reconciliation: authority issued this invoice");
                self.finalize_issued(&mut invoice, fiscal)?;
                Ok(InvoiceStatus::Issued)
            }
            Ok(None) => {
                info!(invoice_id = %invoice.id_typed(), "reconciliation: authority has no record");
                let failure = SubmissionFailure::Connectivity(
                    "submission outcome was lost; authority has no record".to_string(),
                );
                match self.record_failure(&mut invoice, failure) {
                    Err(CoordinatorError::Submission(_)) => Ok(InvoiceStatus::Failed),
                    Err(other) => Err(other),
                    Ok(_) => Ok(InvoiceStatus::Failed),
                }
            }
            Err(e) => {
                warn!(invoice_id = %invoice.id_typed(), error = %e, "reconciliation query failed");
                Err(CoordinatorError::Submission(e.into()))
            }
        }
    }

    /// Success tail: mark issued, persist, and append exactly one ledger
    /// event. The ledger's invoice-id dedupe is the backstop if an earlier
    /// attempt already recorded it.
    fn finalize_issued(
        &self,
        invoice: &mut Invoice,
        fiscal: FiscalResponse,
    ) -> Result<FiscalResponse, CoordinatorError> {
        let confirm = InvoiceCommand::ConfirmIssued(ConfirmIssued {
            invoice_id: invoice.id_typed(),
            fiscal_response: fiscal.clone(),
            occurred_at: Utc::now(),
        });
        let events = match invoice.handle(&confirm) {
            Ok(events) => events,
            // The authority answered with data our own invariants reject
            // (e.g. a total mismatch). Treat it as a failed attempt rather
            // than leaving the invoice stuck in Submitting.
            Err(e) => {
                let failure = SubmissionFailure::Unknown(e.to_string());
                return self.record_failure(invoice, failure);
            }
        };
        self.apply_and_persist(invoice, &events)?;
        self.assert_ledger_record(invoice, &fiscal)?;
        info!(
            invoice_id = %invoice.id_typed(),
            invoice_number = %fiscal.invoice_number,
            "invoice issued"
        );
        Ok(fiscal)
    }

    /// Every issued invoice must have its ledger event. The write is keyed by
    /// invoice id, so calling this again for an already-recorded invoice
    /// changes nothing.
    fn assert_ledger_record(
        &self,
        invoice: &Invoice,
        fiscal: &FiscalResponse,
    ) -> Result<(), CoordinatorError> {
        let employee_id = invoice
            .employee_id()
            .ok_or_else(|| DomainError::invariant("invoice has no employee"))?;
        let recorded = self.ledger.record(&SalesEvent {
            invoice_id: invoice.id_typed(),
            employee_id,
            amount: invoice.total(),
            date: fiscal.issued_on,
        })?;
        if recorded {
            info!(invoice_id = %invoice.id_typed(), "sales event recorded");
        }
        Ok(())
    }

    /// Failure tail: record the failure, persist, surface the taxonomy.
    fn record_failure(
        &self,
        invoice: &mut Invoice,
        failure: SubmissionFailure,
    ) -> Result<FiscalResponse, CoordinatorError> {
        let events = invoice.handle(&InvoiceCommand::RecordFailure(RecordFailure {
            invoice_id: invoice.id_typed(),
            failure: failure.clone(),
            occurred_at: Utc::now(),
        }))?;
        self.apply_and_persist(invoice, &events)?;
        warn!(
            invoice_id = %invoice.id_typed(),
            attempt = invoice.attempt_count(),
            error = %failure,
            "submission attempt failed"
        );
        Err(CoordinatorError::Submission(failure))
    }

    /// Apply events, persist the snapshot, then publish to observers.
    fn apply_and_persist(
        &self,
        invoice: &mut Invoice,
        events: &[InvoiceEvent],
    ) -> Result<(), KvError> {
        for event in events {
            tracing::debug!(event = event.event_type(), invoice_id = %invoice.id_typed(), "applying event");
            invoice.apply(event);
        }
        self.invoices.save(invoice)?;
        *self.invoice.write().unwrap_or_else(|e| e.into_inner()) = invoice.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal_service::FiscalServiceError;
    use crate::kv_store::InMemoryKvStore;
    use async_trait::async_trait;
    use caja_core::ProductId;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted fake authority: a queue of responses, one per submit call.
    struct FakeFiscalService {
        script: std::sync::Mutex<Vec<Result<(), FiscalServiceError>>>,
        submissions: AtomicUsize,
        issued: std::sync::Mutex<Option<FiscalResponse>>,
    }

    impl FakeFiscalService {
        fn scripted(script: Vec<Result<(), FiscalServiceError>>) -> Self {
            Self {
                script: std::sync::Mutex::new(script),
                submissions: AtomicUsize::new(0),
                issued: std::sync::Mutex::new(None),
            }
        }

        fn response_for(submission: &InvoiceSubmission) -> FiscalResponse {
            FiscalResponse {
                invoice_number: "0001-00000042".into(),
                authorization_code: "71234567890123".into(),
                authorization_expires: NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
                issuer_tax_id: "20-12345678-9".into(),
                issued_on: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
                total: submission.total,
            }
        }
    }

    #[async_trait]
    impl FiscalService for FakeFiscalService {
        async fn submit(
            &self,
            submission: &InvoiceSubmission,
        ) -> Result<FiscalResponse, FiscalServiceError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(()));
            next.map(|_| {
                let response = Self::response_for(submission);
                *self.issued.lock().unwrap() = Some(response.clone());
                response
            })
        }

        async fn find_issued(
            &self,
            _invoice_id: InvoiceId,
        ) -> Result<Option<FiscalResponse>, FiscalServiceError> {
            Ok(self.issued.lock().unwrap().clone())
        }
    }

    fn items() -> Vec<LineItem> {
        vec![
            LineItem {
                line_no: 1,
                product_id: ProductId::new(),
                quantity: 2,
                unit_price: 100,
            },
            LineItem {
                line_no: 2,
                product_id: ProductId::new(),
                quantity: 1,
                unit_price: 50,
            },
        ]
    }

    fn coordinator(
        script: Vec<Result<(), FiscalServiceError>>,
        store: Arc<InMemoryKvStore>,
    ) -> IssuanceCoordinator<FakeFiscalService, InMemoryKvStore> {
        IssuanceCoordinator::open(
            FakeFiscalService::scripted(script),
            store,
            EmployeeId::new(),
            items(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn successful_submission_issues_and_records_one_ledger_event() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(vec![Ok(())], Arc::clone(&store));

        let fiscal = coordinator.submit().await.unwrap();
        assert_eq!(fiscal.total, 250);

        let state = coordinator.state();
        assert_eq!(state.status, InvoiceStatus::Issued);
        assert_eq!(state.invoice.attempt_count(), 1);
        assert!(state.last_error.is_none());

        let ledger = LedgerStore::new(store).load().unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(state.invoice.id_typed()));
    }

    #[tokio::test]
    async fn connectivity_failure_then_retry_succeeds_exactly_once() {
        let store = Arc::new(InMemoryKvStore::new());
        // Script is popped from the back: first connectivity failure, then ok.
        let coordinator = coordinator(
            vec![
                Ok(()),
                Err(FiscalServiceError::Connectivity("connection reset".into())),
            ],
            Arc::clone(&store),
        );
        let invoice_id = coordinator.state().invoice.id_typed();

        let err = coordinator.submit().await.unwrap_err();
        match &err {
            CoordinatorError::Submission(SubmissionFailure::Connectivity(_)) => {}
            other => panic!("expected connectivity failure, got {other:?}"),
        }
        let state = coordinator.state();
        assert_eq!(state.status, InvoiceStatus::Failed);
        assert_eq!(state.invoice.attempt_count(), 1);
        assert!(state.last_error.is_some());

        // Retry keeps the invoice identity and succeeds.
        let fiscal = coordinator.retry().await.unwrap();
        let state = coordinator.state();
        assert_eq!(state.invoice.id_typed(), invoice_id);
        assert_eq!(state.status, InvoiceStatus::Issued);
        assert_eq!(state.invoice.attempt_count(), 2);
        assert_eq!(state.invoice.fiscal_response(), Some(&fiscal));

        // Exactly one ledger event despite the retry.
        let ledger = LedgerStore::new(store).load().unwrap();
        assert_eq!(ledger.len(), 1);
    }

    #[tokio::test]
    async fn rejection_is_surfaced_as_non_retryable() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(
            vec![Err(FiscalServiceError::Rejected("invalid tax category".into()))],
            store,
        );

        let err = coordinator.submit().await.unwrap_err();
        match err {
            CoordinatorError::Submission(failure) => {
                assert!(!failure.is_retry_sensible());
            }
            other => panic!("expected submission failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn submitting_an_issued_invoice_short_circuits() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(vec![Ok(())], Arc::clone(&store));

        let first = coordinator.submit().await.unwrap();
        let submissions_after_first = coordinator.fiscal.submissions.load(Ordering::SeqCst);

        let second = coordinator.submit().await.unwrap();
        assert_eq!(first, second);
        // No new authority call, no new attempt, no new ledger event.
        assert_eq!(
            coordinator.fiscal.submissions.load(Ordering::SeqCst),
            submissions_after_first
        );
        assert_eq!(coordinator.state().invoice.attempt_count(), 1);
        assert_eq!(LedgerStore::new(store).load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn short_circuit_restores_a_lost_ledger_event() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(vec![Ok(())], Arc::clone(&store));
        coordinator.submit().await.unwrap();
        let invoice_id = coordinator.state().invoice.id_typed();

        // Crash window: the issued snapshot was persisted but the process
        // died before the ledger write.
        store.remove(&format!("ledger:event:{invoice_id}")).unwrap();
        assert!(LedgerStore::new(Arc::clone(&store)).load().unwrap().is_empty());

        let coordinator = IssuanceCoordinator::load(
            FakeFiscalService::scripted(vec![]),
            Arc::clone(&store),
            invoice_id,
        )
        .unwrap();
        let fiscal = coordinator.submit().await.unwrap();
        assert_eq!(fiscal.total, 250);
        assert_eq!(coordinator.state().status, InvoiceStatus::Issued);

        let ledger = LedgerStore::new(store).load().unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains(invoice_id));
    }

    #[tokio::test]
    async fn retry_from_non_failed_state_is_rejected() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(vec![], store);
        let err = coordinator.retry().await.unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::Domain(DomainError::InvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_submit_is_rejected_not_queued() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = Arc::new(coordinator(vec![Ok(())], store));

        // Hold the operation lock to simulate an in-flight submission.
        let guard = coordinator.op_lock.lock().await;
        let err = coordinator.submit().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::ConflictingOperation));
        drop(guard);

        coordinator.submit().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_from_failed_discards_without_ledger_effects() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(
            vec![Err(FiscalServiceError::Connectivity("down".into()))],
            Arc::clone(&store),
        );

        let _ = coordinator.submit().await;
        coordinator.cancel().await.unwrap();

        assert_eq!(coordinator.state().status, InvoiceStatus::Cancelled);
        assert!(LedgerStore::new(store).load().unwrap().is_empty());
    }

    #[tokio::test]
    async fn timeout_surfaces_as_connectivity_failure() {
        struct HangingFiscalService;

        #[async_trait]
        impl FiscalService for HangingFiscalService {
            async fn submit(
                &self,
                _submission: &InvoiceSubmission,
            ) -> Result<FiscalResponse, FiscalServiceError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!("the coordinator must time out first")
            }

            async fn find_issued(
                &self,
                _invoice_id: InvoiceId,
            ) -> Result<Option<FiscalResponse>, FiscalServiceError> {
                Ok(None)
            }
        }

        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = IssuanceCoordinator::open(
            HangingFiscalService,
            store,
            EmployeeId::new(),
            items(),
        )
        .unwrap()
        .with_submit_timeout(Duration::from_millis(20));

        let err = coordinator.submit().await.unwrap_err();
        match err {
            CoordinatorError::Submission(SubmissionFailure::Connectivity(msg)) => {
                assert!(msg.contains("timed out"));
            }
            other => panic!("expected connectivity failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn qr_payload_is_available_and_deterministic_once_issued() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(vec![Ok(())], store);

        assert!(matches!(
            coordinator.qr_payload(),
            Err(CoordinatorError::NotIssued)
        ));

        coordinator.submit().await.unwrap();
        let first = coordinator.qr_payload().unwrap();
        let second = coordinator.qr_payload().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn load_resumes_from_persisted_snapshot() {
        let store = Arc::new(InMemoryKvStore::new());
        let invoice_id;
        {
            let coordinator = coordinator(
                vec![Err(FiscalServiceError::Connectivity("down".into()))],
                Arc::clone(&store),
            );
            invoice_id = coordinator.state().invoice.id_typed();
            let _ = coordinator.submit().await;
        }

        // "Restart": a fresh coordinator over the same store.
        let coordinator = IssuanceCoordinator::load(
            FakeFiscalService::scripted(vec![Ok(())]),
            Arc::clone(&store),
            invoice_id,
        )
        .unwrap();
        let state = coordinator.state();
        assert_eq!(state.status, InvoiceStatus::Failed);
        assert_eq!(state.invoice.attempt_count(), 1);

        coordinator.retry().await.unwrap();
        assert_eq!(coordinator.state().status, InvoiceStatus::Issued);
    }

    #[tokio::test]
    async fn load_unknown_invoice_fails() {
        let store = Arc::new(InMemoryKvStore::new());
        let result = IssuanceCoordinator::load(
            FakeFiscalService::scripted(vec![]),
            store,
            InvoiceId::new(),
        );
        assert!(matches!(result, Err(CoordinatorError::UnknownInvoice(_))));
    }

    #[tokio::test]
    async fn reconcile_finalizes_when_authority_issued_upstream() {
        let store = Arc::new(InMemoryKvStore::new());
        let employee_id = EmployeeId::new();

        // Crash simulation: persist an invoice stuck in Submitting whose
        // submission actually succeeded upstream.
        let invoice_id;
        let issued_upstream;
        {
            let fiscal = FakeFiscalService::scripted(vec![Ok(())]);
            let coordinator = IssuanceCoordinator::open(
                fiscal,
                Arc::clone(&store),
                employee_id,
                items(),
            )
            .unwrap();
            invoice_id = coordinator.state().invoice.id_typed();

            // Drive to Submitting by hand and persist, bypassing resolution.
            let mut invoice = coordinator.state().invoice;
            let events = invoice
                .handle(&InvoiceCommand::StartSubmission(StartSubmission {
                    invoice_id,
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for e in &events {
                invoice.apply(e);
            }
            InvoiceStore::new(Arc::clone(&store)).save(&invoice).unwrap();

            issued_upstream = FakeFiscalService::response_for(&InvoiceSubmission {
                invoice_id,
                employee_id,
                items: invoice.items().to_vec(),
                total: invoice.total(),
            });
        }

        let fiscal = FakeFiscalService::scripted(vec![]);
        *fiscal.issued.lock().unwrap() = Some(issued_upstream);
        let coordinator =
            IssuanceCoordinator::load(fiscal, Arc::clone(&store), invoice_id).unwrap();
        assert_eq!(coordinator.state().status, InvoiceStatus::Submitting);

        let status = coordinator.reconcile().await.unwrap();
        assert_eq!(status, InvoiceStatus::Issued);
        assert_eq!(LedgerStore::new(store).load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_marks_failed_when_authority_has_no_record() {
        let store = Arc::new(InMemoryKvStore::new());

        let invoice_id;
        {
            let coordinator = coordinator(vec![], Arc::clone(&store));
            invoice_id = coordinator.state().invoice.id_typed();
            let mut invoice = coordinator.state().invoice;
            let events = invoice
                .handle(&InvoiceCommand::StartSubmission(StartSubmission {
                    invoice_id,
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for e in &events {
                invoice.apply(e);
            }
            InvoiceStore::new(Arc::clone(&store)).save(&invoice).unwrap();
        }

        let coordinator = IssuanceCoordinator::load(
            FakeFiscalService::scripted(vec![Ok(())]),
            Arc::clone(&store),
            invoice_id,
        )
        .unwrap();

        let status = coordinator.reconcile().await.unwrap();
        assert_eq!(status, InvoiceStatus::Failed);
        assert!(LedgerStore::new(Arc::clone(&store)).load().unwrap().is_empty());

        // A user-triggered retry is now safe and completes the issuance.
        coordinator.retry().await.unwrap();
        assert_eq!(coordinator.state().status, InvoiceStatus::Issued);
        assert_eq!(LedgerStore::new(store).load().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reconcile_is_a_noop_outside_submitting() {
        let store = Arc::new(InMemoryKvStore::new());
        let coordinator = coordinator(vec![Ok(())], store);

        assert_eq!(coordinator.reconcile().await.unwrap(), InvoiceStatus::Draft);
        coordinator.submit().await.unwrap();
        assert_eq!(coordinator.reconcile().await.unwrap(), InvoiceStatus::Issued);
    }
}
