//! Durable backing for the sales ledger.
//!
//! One key per issued invoice (`ledger:event:{invoice_id}`), which makes the
//! write idempotent at the storage level too: recording the same invoice
//! twice overwrites the identical value instead of appending a duplicate.

use std::sync::Arc;

use tracing::debug;

use caja_ledger::{SalesEvent, SalesLedger};

use crate::kv_store::{KeyValueStore, KvError};

const EVENT_PREFIX: &str = "ledger:event:";

#[derive(Debug, Clone)]
pub struct LedgerStore<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> LedgerStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Persist a sales event. Returns `false` when the invoice was already
    /// recorded (nothing is written).
    pub fn record(&self, event: &SalesEvent) -> Result<bool, KvError> {
        let key = format!("{EVENT_PREFIX}{}", event.invoice_id);
        if self.store.get(&key)?.is_some() {
            debug!(invoice_id = %event.invoice_id, "sales event already recorded; skipping");
            return Ok(false);
        }
        let bytes = serde_json::to_vec(event).map_err(|e| KvError::Serialization(e.to_string()))?;
        self.store.set(&key, &bytes)?;
        Ok(true)
    }

    /// Rebuild the in-memory ledger from every persisted event.
    pub fn load(&self) -> Result<SalesLedger, KvError> {
        let mut events = Vec::new();
        for (_, bytes) in self.store.scan(EVENT_PREFIX)? {
            let event: SalesEvent = serde_json::from_slice(&bytes)
                .map_err(|e| KvError::Serialization(e.to_string()))?;
            events.push(event);
        }
        Ok(SalesLedger::replay(events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::InMemoryKvStore;
    use caja_core::{EmployeeId, InvoiceId};
    use caja_ledger::DateRange;
    use chrono::NaiveDate;

    fn event(amount: u64) -> SalesEvent {
        SalesEvent {
            invoice_id: InvoiceId::new(),
            employee_id: EmployeeId::new(),
            amount,
            date: NaiveDate::from_ymd_opt(2026, 8, 24).unwrap(),
        }
    }

    #[test]
    fn record_dedupes_by_invoice_id() {
        let store = LedgerStore::new(Arc::new(InMemoryKvStore::new()));
        let e = event(500);
        assert!(store.record(&e).unwrap());
        assert!(!store.record(&e).unwrap());
        assert_eq!(store.load().unwrap().len(), 1);
    }

    #[test]
    fn load_rebuilds_aggregates() {
        let store = LedgerStore::new(Arc::new(InMemoryKvStore::new()));
        let e = event(500);
        store.record(&e).unwrap();
        store.record(&event(300)).unwrap();

        let ledger = store.load().unwrap();
        let summary = ledger.aggregate(e.employee_id, DateRange::single_day(e.date));
        assert_eq!(summary.total_amount, 500);
        assert_eq!(summary.total_transactions, 1);
    }
}
