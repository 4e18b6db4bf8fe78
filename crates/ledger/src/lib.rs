//! `caja-ledger`: append-only record of issued invoices.
//!
//! The ledger is the read side of invoicing: one `SalesEvent` per issued
//! invoice, never mutated, aggregated per employee and date range for the
//! reporting views. Durable backing lives in `caja-infra`.

pub mod sales;

pub use sales::{DateRange, SalesEvent, SalesLedger, SalesSummary};
