//! Transaction reference generation.

use rand::Rng;

/// Produces the correlation reference attached to every transaction.
///
/// References are a 6-digit randomized number in a fixed textual template,
/// unique enough for audit correlation. Each call draws from a fresh
/// thread-local source; there is no shared seed state that could correlate
/// references across calls or flake tests.
#[derive(Debug, Default)]
pub struct ReferenceGenerator;

impl ReferenceGenerator {
    /// Creates a generator.
    pub fn new() -> Self {
        ReferenceGenerator
    }

    /// Returns the next reference string.
    pub fn next(&self) -> String {
        let n = rand::thread_rng().gen_range(100_000..=999_999);
        format!("Reference Number: {}", n)
    }
}
