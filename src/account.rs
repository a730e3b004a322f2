//! Account and user models.
//!
//! Maintains the invariant: `balance >= 0` at all times. The balance is
//! mutated only by committed transactions, inside a store atomic scope.

use crate::decimal::Decimal2;
use serde::Serialize;

/// The owner of an account, identified externally by email.
///
/// Identity resolution (sessions, authentication) is out of scope; the
/// engine only needs the email as a recipient lookup key.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique user identifier.
    pub id: u64,

    /// Display name.
    pub name: String,

    /// Unique owner identity used for recipient resolution.
    pub email: String,
}

/// Represents an account's persisted state.
///
/// # Invariants
///
/// - `balance` is never negative
/// - `balance` equals the sum of committed deposit amounts minus the sum
///   of committed withdrawal amounts for this account
///
/// Created with a zero balance when its user is provisioned, and deleted
/// only together with the owner.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    /// Unique account identifier.
    pub id: u64,

    /// Identifier of the owning user.
    pub user_id: u64,

    /// Current balance. Never negative.
    pub balance: Decimal2,
}

impl Account {
    /// Creates a new account for a user with a zero balance.
    pub fn new(id: u64, user_id: u64) -> Self {
        Account {
            id,
            user_id,
            balance: Decimal2::ZERO,
        }
    }

    /// Credits the account.
    ///
    /// No precondition beyond amount validity, which the caller has
    /// already established.
    pub fn credit(&mut self, amount: Decimal2) {
        self.balance += amount;
    }

    /// Debits the account.
    ///
    /// Returns `false` without mutating if `balance < amount`. The caller
    /// must invoke this inside the same atomic scope as the balance check
    /// it reported to the user, so a concurrent debit cannot interleave.
    pub fn debit(&mut self, amount: Decimal2) -> bool {
        if self.balance < amount {
            return false;
        }

        self.balance -= amount;
        true
    }

    /// Returns `true` if the account can cover `amount`.
    pub fn can_cover(&self, amount: Decimal2) -> bool {
        self.balance >= amount
    }
}
