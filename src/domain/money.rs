use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A positive monetary amount expressed in whole base units (e.g. wei).
///
/// Wraps `rust_decimal::Decimal` so principal and repayment arithmetic never
/// touches floating point. Fractional base units are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    /// Returns `None` unless `value` is strictly positive and integral.
    pub fn new(value: Decimal) -> Option<Self> {
        if value > Decimal::ZERO && value.fract().is_zero() {
            Some(Self(value.normalize()))
        } else {
            None
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Whole-percent interest applied once to the principal at repayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterestRate(u32);

impl InterestRate {
    pub const ZERO: Self = Self(0);

    pub fn new(percent: u32) -> Self {
        Self(percent)
    }

    pub fn percent(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for InterestRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Computes `principal + trunc(principal * rate / 100)`.
///
/// Returns `None` on overflow.
pub fn total_due(principal: Amount, rate: InterestRate) -> Option<Decimal> {
    let interest = principal
        .value()
        .checked_mul(Decimal::from(rate.percent()))?
        .checked_div(Decimal::ONE_HUNDRED)?
        .trunc();
    principal.value().checked_add(interest)
}
