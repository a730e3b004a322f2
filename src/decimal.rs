//! Fixed-point monetary type with 2 decimal places precision.
//!
//! Uses `rust_decimal` internally with scale enforcement so balance
//! arithmetic never picks up floating-point error or drifting scale.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

/// A monetary amount that maintains exactly 2 decimal places.
///
/// This type wraps `rust_decimal::Decimal` and rescales on every
/// construction and arithmetic operation.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use ledger_engine::Decimal2;
///
/// let amount = Decimal2::from_str("200.5").unwrap();
/// assert_eq!(amount.to_string(), "200.50");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Decimal2(Decimal);

impl Decimal2 {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 2;

    /// Zero value.
    pub const ZERO: Self = Decimal2(Decimal::ZERO);

    /// Creates a new `Decimal2` from a `Decimal`, normalizing to 2 decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Decimal2(normalized)
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if this value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl FromStr for Decimal2 {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)?;
        Ok(Decimal2::new(decimal))
    }
}

impl fmt::Display for Decimal2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Decimal2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Decimal2::new(self.0 + rhs.0)
    }
}

impl AddAssign for Decimal2 {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Sub for Decimal2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Decimal2::new(self.0 - rhs.0)
    }
}

impl SubAssign for Decimal2 {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl std::iter::Sum for Decimal2 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Decimal2::ZERO, |acc, v| acc + v)
    }
}

impl Serialize for Decimal2 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.2}", self.0))
    }
}

impl<'de> Deserialize<'de> for Decimal2 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Decimal2::from_str(&s).map_err(serde::de::Error::custom)
    }
}
