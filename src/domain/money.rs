use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

/// A monetary value in integer cents.
///
/// All ledger arithmetic happens on `Cents`; decimals only appear at the
/// edges, when amounts are read from input or written to reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Self = Self(0);
    /// Largest magnitude accepted from input or as a service line total
    /// (100 billion in currency units). Totals built from such values stay
    /// far from the `i64` bounds.
    pub const MAX_AMOUNT: Self = Self(10_000_000_000_000);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Converts a decimal currency amount (`12.5`, `12.50`) into cents.
    ///
    /// Amounts with sub-cent precision are rejected rather than rounded.
    pub fn from_decimal(value: Decimal) -> Result<Self> {
        let normalized = value.normalize();
        if normalized.scale() > 2 {
            return Err(LedgerError::validation(format!(
                "Amount {} has more than two decimal places",
                value
            )));
        }
        normalized
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|cents| cents.to_i64())
            .map(Self)
            .filter(|cents| cents.0.unsigned_abs() <= Self::MAX_AMOUNT.0.unsigned_abs())
            .ok_or_else(|| LedgerError::validation(format!("Amount {} is out of range", value)))
    }

    /// `self * quantity`, or `None` past the `i64` bounds.
    pub fn checked_mul(self, quantity: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(quantity)).map(Self)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl TryFrom<Decimal> for Cents {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::from_decimal(value)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

// Operators saturate at the i64 bounds instead of panicking or wrapping.

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

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Cents {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<u32> for Cents {
    type Output = Self;
    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0.saturating_mul(i64::from(rhs)))
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
