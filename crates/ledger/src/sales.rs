use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use caja_core::{EmployeeId, InvoiceId};

/// Append-only fact: an invoice was issued.
///
/// Written exactly once per issued invoice; the `invoice_id` is the dedupe
/// key, so replays after a retried submission cannot double-count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesEvent {
    pub invoice_id: InvoiceId,
    pub employee_id: EmployeeId,
    /// Amount in smallest currency unit.
    pub amount: u64,
    /// Business date of issuance.
    pub date: NaiveDate,
}

/// Inclusive date range for aggregate reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn single_day(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
}

/// Per-employee totals over a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total_amount: u64,
    pub total_transactions: u64,
}

/// Append-only sales ledger.
///
/// Not thread-safe by itself; `caja-infra` owns synchronization and durable
/// backing. Events are kept in insertion order for persistence and replay.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesLedger {
    events: Vec<SalesEvent>,
    recorded: BTreeSet<InvoiceId>,
}

impl SalesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from previously persisted events.
    ///
    /// Duplicates in the input are dropped, keeping the first occurrence.
    pub fn replay(events: impl IntoIterator<Item = SalesEvent>) -> Self {
        let mut ledger = Self::new();
        for event in events {
            ledger.record(event);
        }
        ledger
    }

    /// Record an issued invoice. Idempotent: returns `false` and changes
    /// nothing when the invoice was already recorded.
    pub fn record(&mut self, event: SalesEvent) -> bool {
        if !self.recorded.insert(event.invoice_id) {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn contains(&self, invoice_id: InvoiceId) -> bool {
        self.recorded.contains(&invoice_id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in insertion order.
    pub fn events(&self) -> &[SalesEvent] {
        &self.events
    }

    /// Totals for one employee over an inclusive date range. Pure read.
    ///
    /// The sum is checked: overflowing `u64` in smallest currency units means
    /// corrupt event data, which debug builds report; release builds clamp to
    /// `u64::MAX` rather than wrap.
    pub fn aggregate(&self, employee_id: EmployeeId, range: DateRange) -> SalesSummary {
        let mut summary = SalesSummary::default();
        for event in &self.events {
            if event.employee_id == employee_id && range.contains(event.date) {
                summary.total_amount = match summary.total_amount.checked_add(event.amount) {
                    Some(total) => total,
                    None => {
                        debug_assert!(false, "sales total overflowed u64");
                        u64::MAX
                    }
                };
                summary.total_transactions += 1;
            }
        }
        summary
    }
}
