//! In-process transactional store.
//!
//! Stands in for the relational store the engine is specified against:
//! atomic commit scopes, durable entry inserts, balance updates, and
//! owner-identity lookup. Every balance read-then-mutate sequence runs
//! inside [`MemoryStore::with_account`] or
//! [`MemoryStore::with_account_pair`]; a scope that returns an error is
//! rolled back to its checkpoint before the error surfaces.
//!
//! Pair scopes lock accounts in ascending id order, so two transfers
//! crossing the same pair of accounts in opposite directions cannot
//! deadlock.

use crate::account::{Account, User};
use crate::decimal::Decimal2;
use crate::error::{LedgerError, Result};
use crate::transaction::{Transaction, TransactionDraft, TxKind};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One account's persisted state: the balance row plus its entry rows.
///
/// Guarded by a single mutex, so everything a scope does to it is one
/// atomic unit.
#[derive(Debug)]
pub struct AccountSlot {
    /// The balance row.
    pub account: Account,

    /// Committed entries, in commit order.
    transactions: Vec<Transaction>,
}

/// Snapshot taken when a scope opens, restored if the scope fails.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    balance: Decimal2,
    committed: usize,
}

impl AccountSlot {
    fn new(account: Account) -> Self {
        AccountSlot {
            account,
            transactions: Vec::new(),
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            balance: self.account.balance,
            committed: self.transactions.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.account.balance = checkpoint.balance;
        self.transactions.truncate(checkpoint.committed);
    }

    /// Inserts the entry and applies its balance effect as one unit.
    ///
    /// A withdraw checks the balance against the same state it decrements;
    /// there is no window for a stale read. Fails with
    /// [`LedgerError::InsufficientBalance`] and no mutation if the account
    /// cannot cover the amount.
    pub fn apply(&mut self, draft: TransactionDraft, id: u64) -> Result<Transaction> {
        match draft.kind {
            TxKind::Deposit => self.account.credit(draft.amount),
            TxKind::Withdraw => {
                if !self.account.debit(draft.amount) {
                    return Err(LedgerError::InsufficientBalance {
                        requested: draft.amount,
                        available: self.account.balance,
                    });
                }
            }
        }

        let tx = draft.into_transaction(id);
        self.transactions.push(tx.clone());
        Ok(tx)
    }

    /// Committed entries in commit order.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }
}

/// The persistence collaborator: users, accounts, and the append-only
/// transaction log, with closure-scoped atomic sections.
pub struct MemoryStore {
    /// Account slots indexed by account id.
    slots: RwLock<HashMap<u64, Arc<Mutex<AccountSlot>>>>,

    /// Users indexed by user id.
    users: RwLock<HashMap<u64, User>>,

    /// Owner identity (email) to account id.
    identities: RwLock<HashMap<String, u64>>,

    next_user_id: AtomicU64,
    next_account_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        MemoryStore {
            slots: RwLock::new(HashMap::new()),
            users: RwLock::new(HashMap::new()),
            identities: RwLock::new(HashMap::new()),
            next_user_id: AtomicU64::new(1),
            next_account_id: AtomicU64::new(1),
            next_tx_id: AtomicU64::new(1),
        }
    }

    /// Provisions a user together with a zero-balance account.
    ///
    /// Fails with [`LedgerError::PersistenceConflict`] if the email is
    /// already registered. Returns the new account id.
    pub fn create_user(&self, name: &str, email: &str) -> Result<u64> {
        let email = email.trim().to_lowercase();

        let mut identities = self.identities.write();
        if identities.contains_key(&email) {
            return Err(LedgerError::PersistenceConflict(format!(
                "email already registered: {}",
                email
            )));
        }

        let user_id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
        let account_id = self.next_account_id.fetch_add(1, Ordering::Relaxed);

        let user = User {
            id: user_id,
            name: name.to_string(),
            email: email.clone(),
        };
        let slot = AccountSlot::new(Account::new(account_id, user_id));

        identities.insert(email, account_id);
        self.users.write().insert(user_id, user);
        self.slots
            .write()
            .insert(account_id, Arc::new(Mutex::new(slot)));

        Ok(account_id)
    }

    /// Resolves an owner identity (email) to an account id.
    pub fn find_account_by_owner_identity(&self, identity: &str) -> Option<u64> {
        let identity = identity.trim().to_lowercase();
        self.identities.read().get(&identity).copied()
    }

    /// Returns the owner's email for an account.
    pub fn owner_email(&self, account_id: u64) -> Result<String> {
        let account = self.account(account_id)?;
        self.users
            .read()
            .get(&account.user_id)
            .map(|u| u.email.clone())
            .ok_or(LedgerError::AccountNotFound(account_id))
    }

    /// Allocates a transaction id. Monotonic, not necessarily dense:
    /// ids of rolled-back scopes are never reused.
    pub fn allocate_tx_id(&self) -> u64 {
        self.next_tx_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Runs `f` as a single-account atomic scope.
    ///
    /// If `f` returns an error, the slot is restored to its state at scope
    /// entry before the error propagates.
    pub fn with_account<R>(
        &self,
        account_id: u64,
        f: impl FnOnce(&mut AccountSlot) -> Result<R>,
    ) -> Result<R> {
        let slot = self.slot(account_id)?;
        let mut guard = slot.lock();

        let checkpoint = guard.checkpoint();
        match f(&mut guard) {
            Ok(value) => Ok(value),
            Err(e) => {
                guard.restore(checkpoint);
                Err(e)
            }
        }
    }

    /// Runs `f` as a two-account atomic scope.
    ///
    /// Locks are acquired in ascending account-id order regardless of
    /// argument order; `f` still receives the slots in `(a, b)` argument
    /// order. On error both slots are restored, so no state exists where
    /// only one leg of a transfer is durable.
    pub fn with_account_pair<R>(
        &self,
        a: u64,
        b: u64,
        f: impl FnOnce(&mut AccountSlot, &mut AccountSlot) -> Result<R>,
    ) -> Result<R> {
        if a == b {
            return Err(LedgerError::PersistenceConflict(
                "pair scope requires two distinct accounts".to_string(),
            ));
        }

        let slot_a = self.slot(a)?;
        let slot_b = self.slot(b)?;

        // Canonical acquisition order by account id.
        let (mut guard_a, mut guard_b) = if a < b {
            let guard_a = slot_a.lock();
            let guard_b = slot_b.lock();
            (guard_a, guard_b)
        } else {
            let guard_b = slot_b.lock();
            let guard_a = slot_a.lock();
            (guard_a, guard_b)
        };

        let checkpoint_a = guard_a.checkpoint();
        let checkpoint_b = guard_b.checkpoint();
        match f(&mut guard_a, &mut guard_b) {
            Ok(value) => Ok(value),
            Err(e) => {
                guard_a.restore(checkpoint_a);
                guard_b.restore(checkpoint_b);
                Err(e)
            }
        }
    }

    /// Returns a snapshot of the balance row.
    pub fn account(&self, account_id: u64) -> Result<Account> {
        let slot = self.slot(account_id)?;
        let guard = slot.lock();
        Ok(guard.account.clone())
    }

    /// Returns an account's committed entries, newest first.
    pub fn transactions_of(&self, account_id: u64) -> Result<Vec<Transaction>> {
        let slot = self.slot(account_id)?;
        let guard = slot.lock();

        let mut rows = guard.transactions().to_vec();
        rows.sort_by(|x, y| {
            y.created_at
                .cmp(&x.created_at)
                .then_with(|| y.id.cmp(&x.id))
        });
        Ok(rows)
    }

    fn slot(&self, account_id: u64) -> Result<Arc<Mutex<AccountSlot>>> {
        self.slots
            .read()
            .get(&account_id)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(account_id))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}
