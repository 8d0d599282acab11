//! Fixed-point money type with 2 decimal places precision.
//!
//! Uses `rust_decimal` internally with scale enforcement so balances and
//! ledger amounts never pick up floating-point error or stray precision.

use crate::error::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A decimal amount that always carries exactly 2 decimal places.
///
/// Parsing rejects inputs with more precision than the system scale instead
/// of rounding them, so a malformed amount can never be silently changed.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use wallet_ledger::Money;
///
/// let amount = Money::from_str("10.5").unwrap();
/// assert_eq!(amount.to_string(), "10.50");
/// assert!(Money::from_str("10.505").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(Decimal);

impl Money {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 2;

    /// Zero value.
    pub const ZERO: Self = Money(Decimal::ZERO);

    /// Creates a `Money` from a `Decimal`, normalizing to 2 decimal places.
    ///
    /// Returns `None` if the value carries more than 2 significant decimals.
    pub fn new(value: Decimal) -> Option<Self> {
        if value.normalize().scale() > Self::SCALE {
            return None;
        }
        let mut scaled = value;
        scaled.rescale(Self::SCALE);
        Some(Money(scaled))
    }

    /// Creates a `Money` from an integer number of minor units (cents).
    pub fn from_minor(minor: i64) -> Self {
        Money(Decimal::new(minor, Self::SCALE))
    }

    /// Returns `true` if this value is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Sum, or `None` on overflow.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).and_then(Money::new)
    }

    /// Difference, or `None` on overflow.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).and_then(Money::new)
    }
}

impl FromStr for Money {
    type Err = LedgerError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let decimal = Decimal::from_str(trimmed)
            .map_err(|e| LedgerError::InvalidAmount(format!("{:?}: {}", trimmed, e)))?;
        Money::new(decimal).ok_or_else(|| {
            LedgerError::InvalidAmount(format!(
                "{:?} has more than {} decimal places",
                trimmed,
                Money::SCALE
            ))
        })
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Money::from_str(&s).map_err(serde::de::Error::custom)
    }
}
