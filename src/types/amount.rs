use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::{Error, Result};

/// Signed amount in minor currency units (cents for USD/EUR).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const fn from_minor(value: i64) -> Self {
        Amount(value)
    }

    pub const fn to_minor(&self) -> i64 {
        self.0
    }

    /// Convert a floating-point minor-unit value coming off the wire.
    /// Rounds to nearest, ties away from zero. Non-finite or out-of-range input is rejected.
    pub fn from_minor_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::Decode(format!("non-finite amount: {}", value)));
        }

        // f64::round rounds half away from zero
        let rounded = value.round();
        if rounded > i64::MAX as f64 || rounded < i64::MIN as f64 {
            return Err(Error::Decode(format!("amount out of range: {}", value)));
        }

        Ok(Amount(rounded as i64))
    }

    pub const fn zero() -> Self {
        Amount(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Sum of `amounts`, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts.into_iter().try_fold(Amount::zero(), Amount::checked_add)
    }

    /// `self * numerator / denominator`, rounded half away from zero.
    /// Returns `None` when the denominator is zero or the result overflows.
    pub fn mul_div(self, numerator: i64, denominator: i64) -> Option<Amount> {
        if denominator == 0 {
            return None;
        }

        let product = self.0 as i128 * numerator as i128;
        let result = div_round_half_away(product, denominator as i128);

        i64::try_from(result).ok().map(Amount)
    }

    /// Apply a rate expressed in basis points (1 bp = 0.01%).
    pub fn apply_bps(self, bps: u32) -> Option<Amount> {
        self.mul_div(bps as i64, 10_000)
    }
}

/// Integer division rounding to nearest, ties away from zero.
fn div_round_half_away(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;

    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
