//! Fixed-point monetary type with 2 decimal places (öre precision).
//!
//! Uses `rust_decimal` internally with scale enforcement so that voucher
//! amounts never touch floating point.

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::str::FromStr;

/// A signed monetary amount with exactly 2 decimal places.
///
/// Positive values are debits, negative values are credits, following the
/// sign convention of SIE transaction lines.
///
/// # Examples
///
/// ```
/// use std::str::FromStr;
/// use sie_reconcile::Amount;
///
/// let amount = Amount::from_str("-163").unwrap();
/// assert_eq!(amount.to_string(), "-163.00");
/// assert!(amount.is_credit());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// The number of decimal places to maintain.
    pub const SCALE: u32 = 2;

    /// Zero value.
    pub const ZERO: Self = Amount(Decimal::ZERO);

    /// Creates a new `Amount` from a `Decimal`, normalizing to 2 decimal places.
    pub fn new(value: Decimal) -> Self {
        let mut normalized = value;
        normalized.rescale(Self::SCALE);
        Amount(normalized)
    }

    /// Returns the absolute value.
    pub fn abs(self) -> Self {
        Amount(self.0.abs())
    }

    /// Returns `true` if this value is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` for a strictly positive amount (a debit line).
    pub fn is_debit(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` for a strictly negative amount (a credit line).
    pub fn is_credit(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Returns `true` when the two amounts differ by no more than `tolerance`.
    pub fn approx_eq(self, other: Amount, tolerance: Decimal) -> bool {
        (self.0 - other.0).abs() <= tolerance
    }

    /// Returns `true` when the amount is within `tolerance` of zero.
    pub fn approx_zero(self, tolerance: Decimal) -> bool {
        self.0.abs() <= tolerance
    }
}

impl FromStr for Amount {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s.trim())?;
        Ok(Amount::new(decimal))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount::new(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
        self.0.rescale(Self::SCALE);
    }
}

impl Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount::new(self.0 - rhs.0)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:.2}", self.0))
    }
}
