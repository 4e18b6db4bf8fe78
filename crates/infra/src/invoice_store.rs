//! Invoice snapshot persistence.
//!
//! The coordinator saves a snapshot after every transition, so an invoice
//! caught mid-submission by a crash is visible as `Submitting` on restart and
//! must be reconciled before it can be submitted again.

use std::sync::Arc;

use caja_core::InvoiceId;
use caja_invoicing::Invoice;

use crate::kv_store::{KeyValueStore, KvError};

fn invoice_key(id: InvoiceId) -> String {
    format!("invoice:{id}")
}

#[derive(Debug, Clone)]
pub struct InvoiceStore<S> {
    store: Arc<S>,
}

impl<S: KeyValueStore> InvoiceStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn save(&self, invoice: &Invoice) -> Result<(), KvError> {
        let bytes =
            serde_json::to_vec(invoice).map_err(|e| KvError::Serialization(e.to_string()))?;
        self.store.set(&invoice_key(invoice.id_typed()), &bytes)
    }

    pub fn load(&self, id: InvoiceId) -> Result<Option<Invoice>, KvError> {
        let Some(bytes) = self.store.get(&invoice_key(id))? else {
            return Ok(None);
        };
        let invoice =
            serde_json::from_slice(&bytes).map_err(|e| KvError::Serialization(e.to_string()))?;
        Ok(Some(invoice))
    }

    pub fn remove(&self, id: InvoiceId) -> Result<(), KvError> {
        self.store.remove(&invoice_key(id))
    }
}
