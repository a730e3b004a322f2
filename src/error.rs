//! Error types for the ledger engine.

use crate::decimal::Decimal2;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur during ledger operation.
///
/// Every variant is surfaced before any durable mutation, or after a full
/// rollback of the atomic scope it occurred in. Callers never observe a
/// half-applied state.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A presented request key is outside the allowed parameter set
    #[error("Invalid parameter: {name}")]
    InvalidParameter { name: String },

    /// Amount text is empty, non-numeric, or not strictly positive
    #[error("Invalid amount: {input:?}")]
    InvalidAmount { input: String },

    /// Balance precondition failed for a withdrawal or transfer
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal2,
        available: Decimal2,
    },

    /// Recipient identity did not resolve to an account
    #[error("Recipient not found: {identity}")]
    RecipientNotFound { identity: String },

    /// Account id does not exist in the store
    #[error("Account not found: {0}")]
    AccountNotFound(u64),

    /// The underlying atomic commit failed; the whole scope was rolled back
    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_invalid_parameter_names_offending_key() {
        let err = LedgerError::InvalidParameter {
            name: "foo".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid parameter: foo");
    }

    #[test]
    fn test_insufficient_balance_reports_both_sides() {
        let err = LedgerError::InsufficientBalance {
            requested: Decimal2::from_str("60").unwrap(),
            available: Decimal2::from_str("40").unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance: requested 60.00, available 40.00"
        );
    }
}
