//! Caller-facing operation surface.
//!
//! One pipeline per operation: whitelist the presented keys, parse and
//! check the amount, sanitize the memo, (for transfers) run the bounded
//! memo scan, execute against the ledger, then notify the audit sink.
//! All validation completes before any durable mutation; the audit sink
//! runs strictly after commit.

use crate::audit::{AuditSink, LogAuditSink};
use crate::decimal::Decimal2;
use crate::error::{LedgerError, Result};
use crate::guard::InputGuard;
use crate::ledger::Ledger;
use crate::reference::ReferenceGenerator;
use crate::store::MemoryStore;
use crate::transaction::Transaction;
use crate::transfer::TransferCoordinator;
use chrono::Utc;
use log::warn;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Replacement spliced over a memo-scan match before the memo enters
/// transaction details.
const SCAN_REPLACEMENT: &str = "[scrubbed]";

/// The raw key/value parameters a controller collected for one request.
///
/// Collapses the multi-layer argument forwarding of a dynamic web stack
/// into one explicit value passed to the operation.
#[derive(Debug, Default, Clone)]
pub struct RawParams {
    pairs: BTreeMap<String, String>,
}

impl RawParams {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        RawParams {
            pairs: BTreeMap::new(),
        }
    }

    /// Builds a map from key/value pairs.
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        RawParams {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Adds or replaces a parameter.
    pub fn insert(&mut self, key: &str, value: &str) {
        self.pairs.insert(key.to_string(), value.to_string());
    }

    /// Looks up a parameter value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    /// The presented keys, for whitelisting.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.pairs.keys().map(String::as_str)
    }
}

/// Success summary returned to the caller.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// The amount moved.
    pub amount: Decimal2,

    /// The reference attached to the transaction (shared by both legs of
    /// a transfer).
    pub reference: String,
}

/// The account engine: guards inputs, executes ledger operations, and
/// notifies the audit sink after commit.
pub struct LedgerEngine {
    store: Arc<MemoryStore>,
    guard: InputGuard,
    ledger: Ledger,
    transfers: TransferCoordinator,
    references: ReferenceGenerator,
    audit: Box<dyn AuditSink>,
    scan_budget: Duration,
}

impl LedgerEngine {
    /// Default wall-clock budget for the memo scan.
    pub const DEFAULT_SCAN_BUDGET: Duration = Duration::from_secs(1);

    /// Creates an engine over the given store, auditing through the log
    /// facade.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        LedgerEngine {
            guard: InputGuard::new(),
            ledger: Ledger::new(store.clone()),
            transfers: TransferCoordinator::new(store.clone()),
            references: ReferenceGenerator::new(),
            audit: Box::new(LogAuditSink),
            scan_budget: Self::DEFAULT_SCAN_BUDGET,
            store,
        }
    }

    /// Replaces the audit sink.
    pub fn with_audit_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Overrides the memo-scan budget.
    pub fn with_scan_budget(mut self, budget: Duration) -> Self {
        self.scan_budget = budget;
        self
    }

    /// Deposits into an account.
    ///
    /// Expects `amount` and optionally `memo` in the parameters. Always
    /// succeeds for a valid positive amount.
    pub fn deposit(&self, account_id: u64, params: &RawParams) -> Result<Receipt> {
        self.guard.validate_keys(params.keys())?;
        let amount = self.positive_amount(params)?;
        let memo = self.guard.sanitize_text(params.get("memo").unwrap_or(""));

        let now = Utc::now();
        let reference = self.references.next();
        let details = format!("{} - {}", reference, memo);

        let tx = self
            .ledger
            .deposit(account_id, amount, &reference, &details, now)?;
        self.notify("deposit", &tx);

        Ok(Receipt {
            amount,
            reference: tx.reference,
        })
    }

    /// Withdraws from an account.
    ///
    /// Expects `amount` in the parameters. Fails with
    /// [`LedgerError::InsufficientBalance`] and no mutation if the
    /// balance cannot cover the amount.
    pub fn withdraw(&self, account_id: u64, params: &RawParams) -> Result<Receipt> {
        self.guard.validate_keys(params.keys())?;
        let amount = self.positive_amount(params)?;

        let now = Utc::now();
        let reference = self.references.next();
        let details = format!("Withdraw - {}", reference);

        let tx = self
            .ledger
            .withdraw(account_id, amount, &reference, &details, now)?;
        self.notify("withdraw", &tx);

        Ok(Receipt {
            amount,
            reference: tx.reference,
        })
    }

    /// Transfers from an account to the account owned by the `recipient`
    /// parameter.
    ///
    /// Expects `amount`, `recipient`, and optionally `memo`. The memo is
    /// sanitized, then scanned under the configured budget; a matched
    /// span is spliced out before the memo enters the transfer details.
    pub fn transfer(&self, account_id: u64, params: &RawParams) -> Result<Receipt> {
        self.guard.validate_keys(params.keys())?;
        let amount = self.positive_amount(params)?;
        let recipient = params
            .get("recipient")
            .ok_or_else(|| LedgerError::RecipientNotFound {
                identity: String::new(),
            })?;

        let mut memo = self.guard.sanitize_text(params.get("memo").unwrap_or(""));
        if let Some((start, end)) = self.guard.scan_memo(&memo, self.scan_budget).span() {
            memo = InputGuard::splice_match(&memo, start, end, SCAN_REPLACEMENT);
        }

        let pair = self
            .transfers
            .transfer(account_id, recipient, amount, &memo, Utc::now())?;
        self.notify("transfer", &pair.source_tx);

        Ok(Receipt {
            amount,
            reference: pair.reference,
        })
    }

    /// Current balance, for display.
    pub fn balance(&self, account_id: u64) -> Result<Decimal2> {
        self.ledger.balance(account_id)
    }

    /// Committed transactions, newest first, for display.
    pub fn transactions(&self, account_id: u64) -> Result<Vec<Transaction>> {
        self.ledger.transactions(account_id)
    }

    /// Verifies the balance invariant against the full history.
    pub fn verify_balance(&self, account_id: u64) -> Result<bool> {
        self.ledger.verify_balance(account_id)
    }

    /// Access to the underlying store, for provisioning.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    fn positive_amount(&self, params: &RawParams) -> Result<Decimal2> {
        let amount = self.guard.parse_amount(params.get("amount").unwrap_or(""))?;
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                input: amount.to_string(),
            });
        }
        Ok(amount)
    }

    fn notify(&self, kind: &str, tx: &Transaction) {
        if !self.audit.notify(kind, tx.amount, &tx.reference) {
            warn!(
                "Audit sink refused {} summary for {}; transaction remains committed",
                kind, tx.reference
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal2 {
        Decimal2::from_str(s).unwrap()
    }

    fn setup() -> (LedgerEngine, u64, u64) {
        let store = Arc::new(MemoryStore::new());
        let a = store.create_user("Alice", "alice@example.com").unwrap();
        let b = store.create_user("Bob", "bob@example.com").unwrap();
        (LedgerEngine::new(store), a, b)
    }

    #[test]
    fn test_deposit_pipeline() {
        let (engine, a, _) = setup();
        let params = RawParams::from_pairs([("amount", "200.50"), ("memo", "pay day")]);

        let receipt = engine.deposit(a, &params).unwrap();
        assert_eq!(receipt.amount, dec("200.50"));
        assert!(receipt.reference.starts_with("Reference Number: "));
        assert_eq!(engine.balance(a).unwrap(), dec("200.50"));

        let rows = engine.transactions(a).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].details.contains("pay day"));
    }

    #[test]
    fn test_unknown_parameter_fails_before_any_mutation() {
        let (engine, a, _) = setup();
        let params = RawParams::from_pairs([("amount", "10"), ("foo", "1")]);

        let err = engine.deposit(a, &params).unwrap_err();
        assert_eq!(err.to_string(), "Invalid parameter: foo");
        assert!(engine.balance(a).unwrap().is_zero());
        assert!(engine.transactions(a).unwrap().is_empty());
    }

    #[test]
    fn test_transport_keys_are_tolerated() {
        let (engine, a, _) = setup();
        let params = RawParams::from_pairs([
            ("amount", "10"),
            ("authenticity_token", "tok"),
            ("commit", "Deposit"),
            ("controller", "accounts"),
            ("action", "deposit"),
        ]);

        engine.deposit(a, &params).unwrap();
        assert_eq!(engine.balance(a).unwrap(), dec("10.00"));
    }

    #[test]
    fn test_non_positive_amount_is_rejected() {
        let (engine, a, _) = setup();

        for bad in ["0", "-5", "", "ten"] {
            let params = RawParams::from_pairs([("amount", bad)]);
            let err = engine.deposit(a, &params).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidAmount { .. }), "{:?}", bad);
        }
        assert!(engine.transactions(a).unwrap().is_empty());
    }

    #[test]
    fn test_memo_is_sanitized_before_storage() {
        let (engine, a, _) = setup();
        let params = RawParams::from_pairs([
            ("amount", "5"),
            ("memo", "rent <script>alert(1)</script>money"),
        ]);

        engine.deposit(a, &params).unwrap();
        let rows = engine.transactions(a).unwrap();
        assert!(rows[0].details.contains("rent money"));
        assert!(!rows[0].details.contains("<script>"));
    }

    #[test]
    fn test_withdraw_requires_balance() {
        let (engine, a, _) = setup();
        engine
            .deposit(a, &RawParams::from_pairs([("amount", "1000")]))
            .unwrap();

        let receipt = engine
            .withdraw(a, &RawParams::from_pairs([("amount", "300")]))
            .unwrap();
        assert_eq!(receipt.amount, dec("300.00"));
        assert_eq!(engine.balance(a).unwrap(), dec("700.00"));

        let err = engine
            .withdraw(a, &RawParams::from_pairs([("amount", "700.01")]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(engine.balance(a).unwrap(), dec("700.00"));
    }

    #[test]
    fn test_transfer_pipeline_end_to_end() {
        let (engine, a, b) = setup();
        engine
            .deposit(a, &RawParams::from_pairs([("amount", "1000")]))
            .unwrap();
        engine
            .deposit(b, &RawParams::from_pairs([("amount", "500")]))
            .unwrap();

        let params = RawParams::from_pairs([
            ("amount", "250.75"),
            ("recipient", "bob@example.com"),
            ("memo", "rent"),
        ]);
        let receipt = engine.transfer(a, &params).unwrap();

        assert_eq!(engine.balance(a).unwrap(), dec("749.25"));
        assert_eq!(engine.balance(b).unwrap(), dec("750.75"));

        let a_rows = engine.transactions(a).unwrap();
        let b_rows = engine.transactions(b).unwrap();
        assert_eq!(a_rows[0].reference, receipt.reference);
        assert_eq!(b_rows[0].reference, receipt.reference);
        assert!(engine.verify_balance(a).unwrap());
        assert!(engine.verify_balance(b).unwrap());
    }

    #[test]
    fn test_transfer_without_recipient_fails_cleanly() {
        let (engine, a, _) = setup();
        engine
            .deposit(a, &RawParams::from_pairs([("amount", "100")]))
            .unwrap();

        let err = engine
            .transfer(a, &RawParams::from_pairs([("amount", "10")]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::RecipientNotFound { .. }));
        assert_eq!(engine.balance(a).unwrap(), dec("100.00"));
    }

    #[test]
    fn test_transfer_memo_scan_splices_match() {
        let (engine, a, _) = setup();
        engine
            .deposit(a, &RawParams::from_pairs([("amount", "100")]))
            .unwrap();

        let params = RawParams::from_pairs([
            ("amount", "10"),
            ("recipient", "bob@example.com"),
            ("memo", "suspicious aaaa"),
        ]);
        engine.transfer(a, &params).unwrap();

        let rows = engine.transactions(a).unwrap();
        assert!(rows[0].details.contains("suspicious [scrubbed]"));
    }

    #[test]
    fn test_unknown_account_surfaces() {
        let (engine, _, _) = setup();
        let err = engine
            .deposit(999, &RawParams::from_pairs([("amount", "10")]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::AccountNotFound(999)));
    }
}
