use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Div};
use std::str::FromStr;

/// A monetary amount held at exactly two fractional digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    /// `None` when the amount does not fit in an `i64` count of cents.
    pub fn to_cents(self) -> Option<i64> {
        self.0.checked_mul(Decimal::from(100))?.to_i64()
    }

    /// Rounds half-to-even to two places, then pins the scale so the value
    /// always renders and serializes as `x.yy`.
    pub fn from_decimal(decimal: Decimal) -> Self {
        let mut rounded = decimal.round_dp(2);
        rounded.rescale(2);
        Money(rounded)
    }

    /// Parse a plain decimal string such as `"4.50"` or `" 12 "`.
    pub fn parse(s: &str) -> Option<Self> {
        Decimal::from_str(s.trim()).ok().map(Self::from_decimal)
    }

    pub fn zero() -> Self {
        Money::from_cents(0)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money::from_decimal(self.0 + rhs.0)
    }
}

/// Even split of an amount; dividing by zero yields zero.
impl Div<usize> for Money {
    type Output = Self;
    fn div(self, rhs: usize) -> Self {
        if rhs == 0 {
            return Money::zero();
        }
        Money::from_decimal(self.0 / Decimal::from(rhs))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
