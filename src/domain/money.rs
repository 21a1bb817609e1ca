use crate::error::{MarketplaceError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

/// Digits after the decimal point of the currencies the marketplace sells in.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// A non-negative monetary value in major currency units (dollars, euros, ...).
///
/// Wraps `rust_decimal::Decimal` so prices and fees never go through floating point.
/// Deserializing goes through [`Money::new`], so stored or submitted amounts are validated too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(MarketplaceError::Validation(format!(
                "monetary amount must not be negative, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Converts to the gateway's integer minor units (cents), rounding half to even.
    pub fn to_minor_units(&self) -> Result<i64> {
        let rounded = self
            .0
            .round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointNearestEven);
        (rounded * Decimal::ONE_HUNDRED).to_i64().ok_or_else(|| {
            MarketplaceError::Validation(format!("amount {} does not fit in minor units", self.0))
        })
    }

    /// Builds a value from gateway minor units.
    pub fn from_minor_units(units: i64) -> Result<Self> {
        Self::new(Decimal::new(units, MINOR_UNIT_SCALE))
    }

    /// Multiplies by `rate` and rounds to the minor unit, half away from zero.
    pub fn share(&self, rate: Decimal) -> Self {
        Self(
            (self.0 * rate)
                .round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Subtraction that never produces a negative amount.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - rhs.0)
        }
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MarketplaceError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

// Both operands are non-negative and callers only subtract a share of `self`.
impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        self.saturating_sub(rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |total, money| total + money)
    }
}
