//! # Ledger Engine
//!
//! A single-ledger account engine: records monetary movements (deposit,
//! withdraw, transfer) against user accounts and keeps every balance
//! consistent with its transaction history.
//!
//! ## Design Principles
//!
//! - **Fixed-point arithmetic**: 2 decimal places via `rust_decimal`
//! - **Append-only ledger**: balances mutate only through committed entries
//! - **Atomic scopes**: every read-then-mutate runs inside one commit
//!   scope; transfers cover both accounts with canonical lock ordering
//! - **Guarded entry points**: parameter whitelisting, markup
//!   sanitization, and a bounded-time memo scan before any mutation
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use ledger_engine::{LedgerEngine, MemoryStore, RawParams};
//!
//! let store = Arc::new(MemoryStore::new());
//! let account = store.create_user("Alice", "alice@example.com").unwrap();
//!
//! let engine = LedgerEngine::new(store);
//! let params = RawParams::from_pairs([("amount", "200.50"), ("memo", "pay day")]);
//! let receipt = engine.deposit(account, &params).unwrap();
//! assert_eq!(receipt.amount.to_string(), "200.50");
//! ```

pub mod account;
pub mod audit;
pub mod decimal;
pub mod engine;
pub mod error;
pub mod guard;
pub mod ledger;
pub mod reference;
pub mod store;
pub mod transaction;
pub mod transfer;

pub use account::{Account, User};
pub use audit::{AuditSink, LogAuditSink};
pub use decimal::Decimal2;
pub use engine::{LedgerEngine, RawParams, Receipt};
pub use error::{LedgerError, Result};
pub use guard::{InputGuard, ScanOutcome};
pub use ledger::Ledger;
pub use reference::ReferenceGenerator;
pub use store::MemoryStore;
pub use transaction::{Transaction, TransactionDraft, TxKind};
pub use transfer::{TransferCoordinator, TransferPair};
