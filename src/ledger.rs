//! Ledger primitives: deposit and withdraw against one account.
//!
//! Each operation creates an append-only entry and applies its balance
//! effect in one store scope. An entry is either committed (durable,
//! balance applied) or never existed; there is no pending record to
//! cancel or edit.

use crate::decimal::Decimal2;
use crate::error::Result;
use crate::store::MemoryStore;
use crate::transaction::{Transaction, TransactionDraft, TxKind};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;

/// The authoritative record of balance-affecting events.
pub struct Ledger {
    store: Arc<MemoryStore>,
}

impl Ledger {
    /// Creates a ledger over the given store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Ledger { store }
    }

    /// Creates a deposit entry and increments the balance atomically.
    ///
    /// Always succeeds for a valid amount; deposits have no balance
    /// precondition.
    pub fn deposit(
        &self,
        account_id: u64,
        amount: Decimal2,
        reference: &str,
        details: &str,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let draft = TransactionDraft {
            account_id,
            amount,
            kind: TxKind::Deposit,
            reference: reference.to_string(),
            details: details.to_string(),
            created_at: now,
        };

        let tx_id = self.store.allocate_tx_id();
        let tx = self
            .store
            .with_account(account_id, |slot| slot.apply(draft, tx_id))?;

        debug!("Deposited {} to account {}", amount, account_id);
        Ok(tx)
    }

    /// Creates a withdraw entry and decrements the balance atomically.
    ///
    /// The balance check and the decrement happen in the same scope;
    /// fails with [`crate::LedgerError::InsufficientBalance`] and no
    /// mutation if the account cannot cover the amount.
    pub fn withdraw(
        &self,
        account_id: u64,
        amount: Decimal2,
        reference: &str,
        details: &str,
        now: DateTime<Utc>,
    ) -> Result<Transaction> {
        let draft = TransactionDraft {
            account_id,
            amount,
            kind: TxKind::Withdraw,
            reference: reference.to_string(),
            details: details.to_string(),
            created_at: now,
        };

        let tx_id = self.store.allocate_tx_id();
        let tx = self
            .store
            .with_account(account_id, |slot| slot.apply(draft, tx_id))?;

        debug!("Withdrew {} from account {}", amount, account_id);
        Ok(tx)
    }

    /// Attaches sanitized free text to an entry under construction.
    ///
    /// Details are opaque to balance logic. Committed entries are
    /// immutable, so details can only be recorded on a draft.
    pub fn record_details(draft: &mut TransactionDraft, text: &str) {
        draft.details = text.to_string();
    }

    /// Current balance of an account.
    pub fn balance(&self, account_id: u64) -> Result<Decimal2> {
        Ok(self.store.account(account_id)?.balance)
    }

    /// Committed entries of an account, newest first.
    pub fn transactions(&self, account_id: u64) -> Result<Vec<Transaction>> {
        self.store.transactions_of(account_id)
    }

    /// Verifies the balance invariant against the full history.
    ///
    /// Recomputes the sum of committed deposits minus the sum of
    /// committed withdrawals and compares it with the stored balance.
    pub fn verify_balance(&self, account_id: u64) -> Result<bool> {
        let balance = self.balance(account_id)?;
        let rows = self.transactions(account_id)?;

        let deposits: Decimal2 = rows
            .iter()
            .filter(|t| t.kind == TxKind::Deposit)
            .map(|t| t.amount)
            .sum();
        let withdrawals: Decimal2 = rows
            .iter()
            .filter(|t| t.kind == TxKind::Withdraw)
            .map(|t| t.amount)
            .sum();

        Ok(balance == deposits - withdrawals && balance >= Decimal2::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal2 {
        Decimal2::from_str(s).unwrap()
    }

    fn setup() -> (Ledger, u64) {
        let store = Arc::new(MemoryStore::new());
        let account_id = store.create_user("Alice", "alice@example.com").unwrap();
        (Ledger::new(store), account_id)
    }

    #[test]
    fn test_deposit_records_entry_and_balance() {
        let (ledger, id) = setup();
        let tx = ledger
            .deposit(id, dec("200.50"), "Reference Number: 123456", "rent", Utc::now())
            .unwrap();

        assert_eq!(tx.kind, TxKind::Deposit);
        assert_eq!(tx.amount, dec("200.50"));
        assert_eq!(ledger.balance(id).unwrap(), dec("200.50"));
        assert_eq!(ledger.transactions(id).unwrap().len(), 1);
        assert!(ledger.verify_balance(id).unwrap());
    }

    #[test]
    fn test_withdraw_decrements_balance() {
        let (ledger, id) = setup();
        ledger
            .deposit(id, dec("1000"), "Reference Number: 111111", "", Utc::now())
            .unwrap();
        ledger
            .withdraw(id, dec("300"), "Reference Number: 222222", "Withdraw", Utc::now())
            .unwrap();

        assert_eq!(ledger.balance(id).unwrap(), dec("700.00"));
        assert!(ledger.verify_balance(id).unwrap());
    }

    #[test]
    fn test_withdraw_insufficient_leaves_no_trace() {
        let (ledger, id) = setup();
        ledger
            .deposit(id, dec("50"), "Reference Number: 111111", "", Utc::now())
            .unwrap();

        let err = ledger
            .withdraw(id, dec("60"), "Reference Number: 222222", "", Utc::now())
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance(id).unwrap(), dec("50.00"));
        assert_eq!(ledger.transactions(id).unwrap().len(), 1);
    }

    #[test]
    fn test_withdraw_to_exactly_zero() {
        let (ledger, id) = setup();
        ledger
            .deposit(id, dec("60"), "Reference Number: 111111", "", Utc::now())
            .unwrap();
        ledger
            .withdraw(id, dec("60"), "Reference Number: 222222", "", Utc::now())
            .unwrap();

        assert!(ledger.balance(id).unwrap().is_zero());
        assert!(ledger.verify_balance(id).unwrap());
    }

    #[test]
    fn test_balance_matches_history_over_sequence() {
        let (ledger, id) = setup();
        let ops: [(&str, TxKind); 5] = [
            ("100.00", TxKind::Deposit),
            ("40.50", TxKind::Withdraw),
            ("10.25", TxKind::Deposit),
            ("0.75", TxKind::Withdraw),
            ("5.00", TxKind::Deposit),
        ];

        for (amount, kind) in ops {
            match kind {
                TxKind::Deposit => {
                    ledger
                        .deposit(id, dec(amount), "Reference Number: 111111", "", Utc::now())
                        .unwrap();
                }
                TxKind::Withdraw => {
                    ledger
                        .withdraw(id, dec(amount), "Reference Number: 111111", "", Utc::now())
                        .unwrap();
                }
            }
        }

        assert_eq!(ledger.balance(id).unwrap(), dec("74.00"));
        assert!(ledger.verify_balance(id).unwrap());
    }

    #[test]
    fn test_record_details_on_draft() {
        let mut draft = TransactionDraft {
            account_id: 1,
            amount: dec("1.00"),
            kind: TxKind::Deposit,
            reference: "Reference Number: 111111".to_string(),
            details: String::new(),
            created_at: Utc::now(),
        };

        Ledger::record_details(&mut draft, "sanitized memo");
        assert_eq!(draft.details, "sanitized memo");
    }
}
