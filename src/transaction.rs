//! Transaction models: the append-only ledger entry and its draft form.

use crate::decimal::Decimal2;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Transaction kind.
///
/// Transfers are not a kind of their own: a transfer is realized as a
/// linked withdraw/deposit pair sharing one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    /// Credit funds to an account.
    Deposit,

    /// Debit funds from an account (requires sufficient balance).
    Withdraw,
}

impl TxKind {
    /// Lowercase label used in audit summaries and logs.
    pub fn label(&self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdraw => "withdraw",
        }
    }
}

/// A committed ledger entry.
///
/// Created once and immutable thereafter. Its creation is the sole trigger
/// for the owning account's balance mutation, applied in the same atomic
/// scope as the insert.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: u64,

    /// Identifier of the owning account.
    pub account_id: u64,

    /// Amount moved. Strictly positive.
    pub amount: Decimal2,

    /// Deposit or withdraw.
    pub kind: TxKind,

    /// Correlation reference, shared by both legs of a transfer.
    pub reference: String,

    /// Sanitized free-text details. Opaque to balance logic.
    pub details: String,

    /// Commit timestamp, computed once per operation and passed down.
    pub created_at: DateTime<Utc>,
}

/// Everything needed to construct a ledger entry, gathered before the
/// atomic scope begins.
///
/// A draft is not durable: a failed construction leaves no trace. The
/// store assigns the entry id at commit time.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    /// Target account.
    pub account_id: u64,

    /// Amount to move. Strictly positive.
    pub amount: Decimal2,

    /// Deposit or withdraw.
    pub kind: TxKind,

    /// Correlation reference.
    pub reference: String,

    /// Sanitized free-text details.
    pub details: String,

    /// Operation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TransactionDraft {
    /// Materializes the draft into a committed entry with the given id.
    pub fn into_transaction(self, id: u64) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            amount: self.amount,
            kind: self.kind,
            reference: self.reference,
            details: self.details,
            created_at: self.created_at,
        }
    }
}
