//! Input validation and sanitization guarding the engine's entry points.
//!
//! Three concerns live here: parameter whitelisting (only recognized keys
//! may reach an operation), markup sanitization of free text, and a
//! bounded-time scan of the memo field. The scan uses a linear-time
//! matcher and an explicit wall-clock budget, so a crafted memo can never
//! stall the caller.

use crate::decimal::Decimal2;
use crate::error::{LedgerError, Result};
use log::{debug, warn};
use regex::Regex;
use std::str::FromStr;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Request keys an operation may present, after transport keys are stripped.
pub const ALLOWED_PARAMS: [&str; 3] = ["amount", "recipient", "memo"];

/// Framework bookkeeping keys the transport layer adds to every request.
/// Stripped before whitelisting, never forwarded to the engine.
const TRANSPORT_PARAMS: [&str; 4] = ["authenticity_token", "commit", "controller", "action"];

/// The fixed memo pattern: a nested-quantifier match against the trailing
/// run of the text. Catastrophic on a backtracking matcher, linear here.
const MEMO_PATTERN: &str = r"(a+)+$";

/// Outcome of a bounded memo scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The pattern matched; `start..end` is the byte span of the match.
    Match { start: usize, end: usize },

    /// The pattern did not match.
    NoMatch,

    /// The budget expired before the match completed. Treated as no match
    /// by callers; never an error.
    TimedOut,
}

impl ScanOutcome {
    /// Returns the matched byte span, folding `TimedOut` into no-match.
    pub fn span(&self) -> Option<(usize, usize)> {
        match *self {
            ScanOutcome::Match { start, end } => Some((start, end)),
            ScanOutcome::NoMatch | ScanOutcome::TimedOut => None,
        }
    }
}

/// Validates request parameters and sanitizes free-text fields.
///
/// Holds its regex patterns pre-compiled; construct once and share.
pub struct InputGuard {
    /// `<script>` elements, pruned together with their content.
    script_block: Regex,

    /// `<style>` elements, pruned together with their content.
    style_block: Regex,

    /// Any residual tag, stripped while keeping inner text.
    any_tag: Regex,

    /// The fixed memo scan pattern.
    memo_pattern: Regex,
}

impl InputGuard {
    /// Creates a guard with all patterns compiled.
    pub fn new() -> Self {
        InputGuard {
            script_block: Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid pattern"),
            style_block: Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid pattern"),
            any_tag: Regex::new(r"<[^>]*>").expect("valid pattern"),
            memo_pattern: Regex::new(MEMO_PATTERN).expect("valid pattern"),
        }
    }

    /// Checks that every presented key is in the allowed set.
    ///
    /// Transport-framework keys are stripped first. Key order is
    /// irrelevant; the check is a pure set-difference. Fails with
    /// [`LedgerError::InvalidParameter`] naming the first offending key.
    pub fn validate_keys<'a, I>(&self, presented: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        for key in presented {
            if TRANSPORT_PARAMS.contains(&key) {
                continue;
            }
            if !ALLOWED_PARAMS.contains(&key) {
                return Err(LedgerError::InvalidParameter {
                    name: key.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Strips active markup from free text, returning plain text.
    ///
    /// `<script>` and `<style>` elements are removed together with their
    /// content; every remaining tag is removed while its inner text is
    /// kept. The output contains no executable markup. Pure function.
    pub fn sanitize_text(&self, raw: &str) -> String {
        let pruned = self.script_block.replace_all(raw, "");
        let pruned = self.style_block.replace_all(&pruned, "");
        let stripped = self.any_tag.replace_all(&pruned, "");
        stripped.trim().to_string()
    }

    /// Runs the fixed memo pattern against `text` under a wall-clock budget.
    ///
    /// The matcher itself is linear-time (no backtracking), and the match
    /// additionally runs on a worker thread so the caller returns no later
    /// than the budget. On expiry the scan reports [`ScanOutcome::TimedOut`]
    /// and the caller proceeds as if nothing matched; the operation never
    /// hangs and never retries.
    pub fn scan_memo(&self, text: &str, budget: Duration) -> ScanOutcome {
        let pattern = self.memo_pattern.clone();
        let haystack = text.to_string();
        let (tx, rx) = mpsc::channel();

        let started = Instant::now();
        thread::spawn(move || {
            let span = pattern.find(&haystack).map(|m| (m.start(), m.end()));
            // Receiver may be gone if the budget expired; nothing to do then.
            let _ = tx.send(span);
        });

        match rx.recv_timeout(budget) {
            Ok(Some((start, end))) => {
                debug!(
                    "Memo scan matched bytes {}..{} in {:?}",
                    start,
                    end,
                    started.elapsed()
                );
                ScanOutcome::Match { start, end }
            }
            Ok(None) => {
                debug!("Memo scan found no match in {:?}", started.elapsed());
                ScanOutcome::NoMatch
            }
            Err(_) => {
                warn!("Memo scan exceeded budget of {:?}, treating as no match", budget);
                ScanOutcome::TimedOut
            }
        }
    }

    /// Replaces the byte span reported by [`InputGuard::scan_memo`] with
    /// `replacement`.
    ///
    /// Offsets from a match always fall on character boundaries, so the
    /// splice cannot corrupt multi-byte text.
    pub fn splice_match(text: &str, start: usize, end: usize, replacement: &str) -> String {
        let mut out = String::with_capacity(text.len() - (end - start) + replacement.len());
        out.push_str(&text[..start]);
        out.push_str(replacement);
        out.push_str(&text[end..]);
        out
    }

    /// Parses a decimal string into a fixed-point amount.
    ///
    /// Fails with [`LedgerError::InvalidAmount`] on empty or non-numeric
    /// input. Positivity is enforced by the operation, not by parsing.
    pub fn parse_amount(&self, raw: &str) -> Result<Decimal2> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidAmount {
                input: raw.to_string(),
            });
        }

        Decimal2::from_str(trimmed).map_err(|_| LedgerError::InvalidAmount {
            input: raw.to_string(),
        })
    }
}

impl Default for InputGuard {
    fn default() -> Self {
        Self::new()
    }
}
