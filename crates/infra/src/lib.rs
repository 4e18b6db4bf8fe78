//! Infrastructure layer: persistence, external services, orchestration.
//!
//! Domain crates stay pure; everything that suspends at an I/O boundary lives
//! here. The two orchestrators, `SessionManager` and `IssuanceCoordinator`,
//! compose the storage and service traits so tests can run them entirely
//! against in-memory implementations.

pub mod auth_service;
pub mod coordinator;
pub mod credential_store;
pub mod fiscal_service;
pub mod invoice_store;
pub mod kv_store;
pub mod ledger_store;
pub mod session_manager;
pub mod telemetry;


pub use auth_service::{AuthGrant, AuthService, AuthServiceError, NewAccount};
pub use coordinator::{CoordinatorError, IssuanceCoordinator, IssuanceState};
pub use credential_store::{CredentialStore, StoredCredentials};
pub use fiscal_service::{FiscalService, FiscalServiceError, InvoiceSubmission};
pub use invoice_store::InvoiceStore;
pub use kv_store::{InMemoryKvStore, KeyValueStore, KvError};
pub use ledger_store::LedgerStore;
pub use session_manager::SessionManager;
