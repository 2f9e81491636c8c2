use crate::error::{LedgerError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// A monetary amount as an integer count of cents.
///
/// Amounts are never stored as floating values; user input is parsed with
/// `rust_decimal` and rounded once, at the boundary, to the nearest cent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Parses a user supplied amount ("150", "99.9", "10.005") into a positive
    /// number of cents, rounding half away from zero.
    pub fn parse_positive(input: &str) -> Result<Self> {
        let decimal = Decimal::from_str(input.trim())
            .map_err(|_| LedgerError::validation(format!("invalid amount: {:?}", input)))?;
        Self::from_decimal(decimal)
    }

    pub fn from_decimal(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::validation("amount must be positive"));
        }
        let cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            * Decimal::ONE_HUNDRED;
        match cents.to_i64() {
            Some(c) if c >= 1 => Ok(Self(c)),
            Some(_) => Err(LedgerError::validation("amount must be at least one cent")),
            None => Err(LedgerError::validation("amount is too large")),
        }
    }

    /// Splits the amount into `parts` shares that differ by at most one cent.
    ///
    /// The remainder of the floor division goes one cent at a time to the
    /// earliest shares, so the result always sums back to `self`.
    pub fn split(self, parts: u8) -> Vec<Cents> {
        if parts == 0 {
            return Vec::new();
        }
        let n = i64::from(parts);
        let base = self.0.div_euclid(n);
        let remainder = self.0 - base * n;
        (0..n)
            .map(|i| Cents(base + i64::from(i < remainder)))
            .collect()
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Decimal::new(self.0, 2))
    }
}

impl Add for Cents {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Cents {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Cents::ZERO, Add::add)
    }
}

impl<'a> Sum<&'a Cents> for Cents {
    fn sum<I: Iterator<Item = &'a Cents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
