//! SR Coin Amounts
//!
//! Exact decimal money for the wallet ledger. All balance math goes through
//! [`Coins`], which wraps `rust_decimal::Decimal` so that `0.1 + 0.2` is
//! exactly `0.3` and no amount ever passes through a float.
//!
//! ## Conventions
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Credits (add_money, prize)      →  positive amounts        │
//! │  Debits  (withdraw, entry_fee)   →  negative amounts        │
//! │  Display                         →  two decimal places      │
//! │  Core math                       →  never rounds            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Decimal places used when presenting an amount.
pub const DISPLAY_SCALE: u32 = 2;

/// An exact amount of SR coins. May be negative (ledger debits).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(Decimal);

/// Failure to read an amount from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid coin amount: {0:?}")]
pub struct ParseCoinsError(pub String);

impl Coins {
    /// Zero coins.
    pub const ZERO: Coins = Coins(Decimal::ZERO);

    /// Wrap a decimal.
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Whole coins.
    pub fn whole(value: i64) -> Self {
        Self(Decimal::from(value))
    }

    /// Amount from minor units (hundredths of a coin).
    pub fn from_minor(minor: i64) -> Self {
        Self(Decimal::new(minor, DISPLAY_SCALE))
    }

    /// Underlying decimal.
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Strictly greater than zero.
    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Strictly less than zero.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Exactly zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    /// Canonical form with trailing zeros removed (`1.50` and `1.5` match).
    pub fn normalize(&self) -> Self {
        Self(self.0.normalize())
    }

    /// Checked addition; `None` on decimal overflow.
    pub fn checked_add(self, rhs: Coins) -> Option<Coins> {
        self.0.checked_add(rhs.0).map(Coins)
    }

    /// Checked subtraction; `None` on decimal overflow.
    pub fn checked_sub(self, rhs: Coins) -> Option<Coins> {
        self.0.checked_sub(rhs.0).map(Coins)
    }

    /// Parse amounts the way store documents write them.
    ///
    /// Accepts plain decimals (`"1000"`, `"99.50"`), grouped digits in
    /// either western or Indian style (`"1,000"`, `"1,00,000"`), an
    /// optional leading `₹`, and surrounding whitespace.
    pub fn parse_loose(text: &str) -> Result<Self, ParseCoinsError> {
        let cleaned: String = text
            .trim()
            .trim_start_matches('₹')
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return Err(ParseCoinsError(text.to_string()));
        }
        Decimal::from_str(&cleaned)
            .map(Coins)
            .map_err(|_| ParseCoinsError(text.to_string()))
    }
}

impl From<Decimal> for Coins {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Coins> for Decimal {
    fn from(value: Coins) -> Self {
        value.0
    }
}

impl FromStr for Coins {
    type Err = ParseCoinsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(s.trim())
            .map(Coins)
            .map_err(|_| ParseCoinsError(s.to_string()))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0.round_dp(DISPLAY_SCALE))
    }
}

impl Add for Coins {
    type Output = Coins;
    fn add(self, rhs: Coins) -> Coins {
        Coins(self.0 + rhs.0)
    }
}

impl AddAssign for Coins {
    fn add_assign(&mut self, rhs: Coins) {
        self.0 += rhs.0;
    }
}

impl Sub for Coins {
    type Output = Coins;
    fn sub(self, rhs: Coins) -> Coins {
        Coins(self.0 - rhs.0)
    }
}

impl SubAssign for Coins {
    fn sub_assign(&mut self, rhs: Coins) {
        self.0 -= rhs.0;
    }
}

impl Neg for Coins {
    type Output = Coins;
    fn neg(self) -> Coins {
        Coins(-self.0)
    }
}

impl Sum for Coins {
    fn sum<I: Iterator<Item = Coins>>(iter: I) -> Coins {
        iter.fold(Coins::ZERO, |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a Coins> for Coins {
    fn sum<I: Iterator<Item = &'a Coins>>(iter: I) -> Coins {
        iter.copied().sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================
