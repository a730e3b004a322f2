//! Two-account atomic transfer orchestration.

use crate::decimal::Decimal2;
use crate::error::{LedgerError, Result};
use crate::ledger::Ledger;
use crate::reference::ReferenceGenerator;
use crate::store::MemoryStore;
use crate::transaction::{Transaction, TransactionDraft, TxKind};
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;

/// Both legs of a committed transfer, sharing one reference.
#[derive(Debug, Clone)]
pub struct TransferPair {
    /// The shared correlation reference.
    pub reference: String,

    /// The withdraw entry on the source account.
    pub source_tx: Transaction,

    /// The deposit entry on the destination account.
    pub destination_tx: Transaction,
}

/// Orchestrates transfers: recipient resolution, precondition checks, and
/// the one commit scope both legs live in.
///
/// Either both entries are committed and both balances updated, or
/// neither. There is no state where only one side exists durably.
pub struct TransferCoordinator {
    store: Arc<MemoryStore>,
    references: ReferenceGenerator,
}

impl TransferCoordinator {
    /// Creates a coordinator over the given store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        TransferCoordinator {
            store,
            references: ReferenceGenerator::new(),
        }
    }

    /// Moves `amount` from the source account to the account owned by
    /// `recipient` (an owner identity, e.g. an email).
    ///
    /// Failure paths, in order, each with no mutation at all:
    /// recipient resolution ([`LedgerError::RecipientNotFound`]), balance
    /// precondition ([`LedgerError::InsufficientBalance`], rechecked
    /// inside the commit scope), and commit failure
    /// ([`LedgerError::PersistenceConflict`], full rollback).
    pub fn transfer(
        &self,
        source_account: u64,
        recipient: &str,
        amount: Decimal2,
        memo: &str,
        now: DateTime<Utc>,
    ) -> Result<TransferPair> {
        let recipient = recipient.trim();
        let destination_account = self
            .store
            .find_account_by_owner_identity(recipient)
            .ok_or_else(|| LedgerError::RecipientNotFound {
                identity: recipient.to_string(),
            })?;

        if destination_account == source_account {
            return Err(LedgerError::RecipientNotFound {
                identity: recipient.to_string(),
            });
        }

        // Checked before any mutation; the commit scope checks again.
        let source = self.store.account(source_account)?;
        if !source.can_cover(amount) {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: source.balance,
            });
        }
        let source_email = self.store.owner_email(source_account)?;

        // One shared reference, computed before either leg is built.
        let reference = self.references.next();

        let mut withdraw_draft = TransactionDraft {
            account_id: source_account,
            amount,
            kind: TxKind::Withdraw,
            reference: reference.clone(),
            details: String::new(),
            created_at: now,
        };
        Ledger::record_details(
            &mut withdraw_draft,
            &format!("Transfer to {} - {} - Memo: {}", recipient, reference, memo),
        );

        let mut deposit_draft = TransactionDraft {
            account_id: destination_account,
            amount,
            kind: TxKind::Deposit,
            reference: reference.clone(),
            details: String::new(),
            created_at: now,
        };
        Ledger::record_details(
            &mut deposit_draft,
            &format!("Transfer from {} - Ref#{}", source_email, reference),
        );

        let withdraw_id = self.store.allocate_tx_id();
        let deposit_id = self.store.allocate_tx_id();

        let (source_tx, destination_tx) =
            self.store
                .with_account_pair(source_account, destination_account, |src, dst| {
                    let source_tx = src.apply(withdraw_draft, withdraw_id)?;
                    let destination_tx = dst.apply(deposit_draft, deposit_id)?;
                    Ok((source_tx, destination_tx))
                })?;

        debug!(
            "Transferred {} from account {} to account {} under {}",
            amount, source_account, destination_account, reference
        );

        Ok(TransferPair {
            reference,
            source_tx,
            destination_tx,
        })
    }
}
