//! Post-commit audit notification.

use crate::decimal::Decimal2;
use log::info;

/// Receives one summary per committed transaction.
///
/// Strictly best-effort: the engine notifies after commit, consumes no
/// result beyond the accepted flag, and never rolls back a committed
/// operation because a sink refused the summary.
pub trait AuditSink: Send + Sync {
    /// Accepts a post-commit summary. Returns `false` if the sink could
    /// not record it; the engine logs that and moves on.
    fn notify(&self, kind: &str, amount: Decimal2, reference: &str) -> bool;
}

/// Default sink: writes summaries through the `log` facade.
#[derive(Debug, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn notify(&self, kind: &str, amount: Decimal2, reference: &str) -> bool {
        info!(
            "[{}] Amount: {}, Ref: {}",
            kind.to_uppercase(),
            amount,
            reference
        );
        true
    }
}
