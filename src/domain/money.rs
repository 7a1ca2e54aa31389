//! Money types
//!
//! Domain primitives for prices and charges. Both are validated at
//! construction time so an invalid rate or amount cannot exist in the system.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Decimal places kept for every stored amount
const SCALE: u32 = 2;

/// Largest hourly rate the educators table accepts (NUMERIC(6,2))
const MAX_HOURLY_RATE: &str = "9999.99";

/// Largest single charge the transactions table accepts (NUMERIC(10,2))
const MAX_AMOUNT: &str = "99999999.99";

/// Errors that can occur when creating a rate or an amount
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Value must not be negative (got {0})")]
    Negative(Decimal),

    #[error("Value has too many decimal places (max {SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Value exceeds maximum allowed ({0})")]
    Overflow(&'static str),

    #[error("Invalid decimal format: {0}")]
    ParseError(String),
}

fn limit(max: &'static str) -> Decimal {
    Decimal::from_str(max).unwrap_or(Decimal::MAX)
}

/// An educator's hourly rate.
///
/// # Invariants
/// - Value is zero or positive
/// - At most 2 decimal places
/// - At most 9999.99
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HourlyRate(Decimal);

impl HourlyRate {
    /// Create a new rate with validation.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO {
            return Err(MoneyError::Negative(value));
        }
        if value.scale() > SCALE {
            return Err(MoneyError::TooManyDecimals(value.scale()));
        }
        if value > limit(MAX_HOURLY_RATE) {
            return Err(MoneyError::Overflow(MAX_HOURLY_RATE));
        }
        Ok(Self(value))
    }

    /// Wrap a value read back from storage without re-checking the upper
    /// bound. Negative values are still rejected since cost computation
    /// depends on that.
    pub fn from_stored(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO {
            return Err(MoneyError::Negative(value));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Price of `minutes` of tutoring at this rate, rounded to cents.
    ///
    /// Computed as `minutes × rate / 60` so whole-hour and half-hour
    /// sessions come out exact. The result goes through [`Money::new`], so a
    /// charge above the largest storable amount is an `Overflow`.
    pub fn charge_for_minutes(&self, minutes: i64) -> Result<Money, MoneyError> {
        let raw = Decimal::from(minutes)
            .checked_mul(self.0)
            .ok_or(MoneyError::Overflow(MAX_AMOUNT))?
            / Decimal::from(60);
        Money::new(raw.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl fmt::Display for HourlyRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for HourlyRate {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        HourlyRate::new(decimal)
    }
}

impl TryFrom<String> for HourlyRate {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HourlyRate::from_str(&value)
    }
}

impl From<HourlyRate> for String {
    fn from(rate: HourlyRate) -> Self {
        rate.to_string()
    }
}

/// A non-negative monetary amount with cent precision.
///
/// Zero is allowed: an educator may tutor for free and the resulting
/// payment transaction still records the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

impl Money {
    /// Create a new amount with validation.
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value < Decimal::ZERO {
            return Err(MoneyError::Negative(value));
        }
        if value.scale() > SCALE {
            return Err(MoneyError::TooManyDecimals(value.scale()));
        }
        if value > limit(MAX_AMOUNT) {
            return Err(MoneyError::Overflow(MAX_AMOUNT));
        }
        Ok(Self(value))
    }

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(decimal)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Money::from_str(&value)
    }
}

impl From<Money> for String {
    fn from(amount: Money) -> Self {
        amount.to_string()
    }
}
