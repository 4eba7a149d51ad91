//! Integer-cent money and decimal price multipliers.
//!
//! All amounts travel and are stored as whole minor units (cents). Conversion
//! to a decimal display string happens only when rendering.

use core::fmt;
use core::ops::{Add, Neg, Sub};
use core::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a [`Cents`] amount from user input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// The input has more than two fractional digits.
    #[error("amount has more than two decimal places: {0}")]
    TooPrecise(String),
    /// The amount does not fit in 64-bit cents.
    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// Errors that can occur when constructing a [`PriceMultiplier`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultiplierError {
    /// Multipliers may not be negative.
    #[error("price multiplier cannot be negative: {0}")]
    Negative(Decimal),
    /// The input is not a decimal number.
    #[error("invalid price multiplier: {0}")]
    Invalid(String),
}

/// An amount in minor currency units (cents).
///
/// Balances may be negative, so the inner value is signed.
///
/// ```
/// use moogship_core::Cents;
///
/// assert_eq!(Cents::new(12_345).to_string(), "$123.45");
/// assert_eq!(Cents::new(-150).to_string(), "-$1.50");
/// assert_eq!("19.99".parse::<Cents>().unwrap(), Cents::new(1_999));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    /// Zero cents.
    pub const ZERO: Self = Self(0);

    /// Create an amount from a number of cents.
    #[must_use]
    pub const fn new(cents: i64) -> Self {
        Self(cents)
    }

    /// Get the number of cents.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// The amount in major units as an exact decimal (`12345` -> `123.45`).
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    /// Convert a major-unit decimal to cents, rounding half away from zero.
    ///
    /// Returns `None` if the amount does not fit in 64-bit cents.
    #[must_use]
    pub fn from_decimal(amount: Decimal) -> Option<Self> {
        amount
            .checked_mul(Decimal::ONE_HUNDRED)?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(Self)
    }

    /// Apply a price multiplier, rounding to the nearest cent.
    ///
    /// The product is computed in exact decimal arithmetic, so the result is
    /// never more than half a cent away from the true value. Products outside
    /// the `i64` range saturate.
    #[must_use]
    pub fn apply_multiplier(&self, multiplier: PriceMultiplier) -> Self {
        let saturated = if self.is_negative() {
            Self(i64::MIN)
        } else {
            Self(i64::MAX)
        };
        Decimal::from(self.0)
            .checked_mul(multiplier.as_decimal())
            .and_then(|product| {
                product
                    .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                    .to_i64()
            })
            .map_or(saturated, Self)
    }

    /// Whether the amount is negative.
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl FromStr for Cents {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_start_matches('$');
        let amount =
            Decimal::from_str(trimmed).map_err(|_| MoneyError::Invalid(s.to_string()))?;
        if amount.scale() > 2 && amount.normalize().scale() > 2 {
            return Err(MoneyError::TooPrecise(s.to_string()));
        }
        Self::from_decimal(amount).ok_or_else(|| MoneyError::OutOfRange(s.to_string()))
    }
}

impl Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Cents {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Cents {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0.saturating_neg())
    }
}

impl From<i64> for Cents {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

/// A non-negative decimal factor applied to a base shipping cost.
///
/// Serialized as a JSON number; the API sends multipliers like `1.25`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PriceMultiplier(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl PriceMultiplier {
    /// The neutral multiplier.
    pub const ONE: Self = Self(Decimal::ONE);

    /// Create a multiplier.
    ///
    /// # Errors
    ///
    /// Returns [`MultiplierError::Negative`] if `value` is below zero.
    pub fn new(value: Decimal) -> Result<Self, MultiplierError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(MultiplierError::Negative(value));
        }
        Ok(Self(value))
    }

    /// Get the multiplier as a decimal.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl Default for PriceMultiplier {
    fn default() -> Self {
        Self::ONE
    }
}

impl fmt::Display for PriceMultiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0.normalize())
    }
}

impl FromStr for PriceMultiplier {
    type Err = MultiplierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = Decimal::from_str(s.trim().trim_end_matches('x'))
            .map_err(|_| MultiplierError::Invalid(s.to_string()))?;
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for PriceMultiplier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = rust_decimal::serde::float::deserialize(deserializer)?;
        Self::new(value).map_err(serde::de::Error::custom)
    }
}
