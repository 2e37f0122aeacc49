use std::{
    fmt,
    ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Maximum allowed discrepancy, in minor units, when reconciling a stated
/// amount against a computed one (receipt totals, claimed assignment
/// amounts).
pub const TOLERANCE_MINOR: i64 = 1;

/// Signed money amount represented as **integer minor units** (cents).
///
/// Use this type for **all** monetary values in the engine (bill totals,
/// unit prices, assignment amounts, payments) to avoid floating-point
/// drift.
///
/// # Examples
///
/// ```rust
/// use engine::Money;
///
/// let amount = Money::new(12_34);
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_string(), "12.34");
/// ```
///
/// Parsing from user input (accepts `.` or `,` as decimal separator; rejects
/// more than 2 decimals):
///
/// ```rust
/// use engine::Money;
///
/// assert_eq!("10".parse::<Money>().unwrap().minor(), 1000);
/// assert_eq!("10,5".parse::<Money>().unwrap().minor(), 1050);
/// assert!("12.345".parse::<Money>().is_err());
/// ```
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64) -> Self {
        Self(minor)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if the amount is positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns `true` if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns `None` on overflow).
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction (returns `None` on overflow).
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Checked scalar multiplication, used for `quantity × unit_price`.
    #[must_use]
    pub fn checked_mul(self, rhs: i64) -> Option<Money> {
        self.0.checked_mul(rhs).map(Money)
    }

    /// Returns `self - rhs` floored at zero; the remaining part of a balance
    /// can never go negative even when someone overpays.
    #[must_use]
    pub fn saturating_remainder(self, rhs: Money) -> Money {
        Money((self.0 - rhs.0).max(0))
    }

    /// Compares two amounts within [`TOLERANCE_MINOR`].
    ///
    /// Used wherever an externally stated amount must reconcile against a
    /// computed one, so a rounding difference of one minor unit on a printed
    /// receipt does not reject the whole bill.
    #[must_use]
    pub fn approximately_equal(self, other: Money) -> bool {
        (self.0 - other.0).abs() <= TOLERANCE_MINOR
    }
}

/// Checks that `subtotal + tax + tip` reconciles with the stated `total`
/// within [`TOLERANCE_MINOR`].
///
/// Pure function, no side effects. On failure the error carries the computed
/// sum (`expected`) and the stated total (`actual`) so callers can render a
/// precise diagnostic.
pub fn validate_totals(
    subtotal: Money,
    tax: Money,
    tip: Money,
    total: Money,
) -> Result<(), EngineError> {
    let overflow = || EngineError::InvalidAmount("bill totals overflow".to_string());
    let calculated = subtotal
        .checked_add(tax)
        .and_then(|sum| sum.checked_add(tip))
        .ok_or_else(overflow)?;
    if !calculated.approximately_equal(total) {
        return Err(EngineError::TotalMismatch {
            expected: calculated,
            actual: total,
        });
    }
    Ok(())
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let major = abs / 100;
        let minor = abs % 100;
        write!(f, "{sign}{major}.{minor:02}")
    }
}

impl From<i64> for Money {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Money> for i64 {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Money;

    fn mul(self, rhs: i64) -> Self::Output {
        Money(self.0 * rhs)
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string into minor units.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading
    /// `+`/`-`.
    ///
    /// Validation rules:
    /// - max 2 fractional digits (rejects `12.345`)
    /// - rejects empty/invalid strings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount("invalid amount".to_string());
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (sign, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (-1i64, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (1i64, stripped)
        } else {
            (1i64, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let major_str = parts.next().ok_or_else(invalid)?;
        let minor_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = major_str.parse().map_err(|_| invalid())?;

        let minor: i64 = match minor_str {
            None => 0,
            Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                match frac.len() {
                    0 => 0,
                    1 => frac.parse::<i64>().map_err(|_| invalid())? * 10,
                    2 => frac.parse::<i64>().map_err(|_| invalid())?,
                    _ => return Err(EngineError::InvalidAmount("too many decimals".to_string())),
                }
            }
        };

        let total = major
            .checked_mul(100)
            .and_then(|v| v.checked_add(minor))
            .ok_or_else(overflow)?;

        let signed = if sign < 0 {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Money(signed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_decimal() {
        assert_eq!(Money::new(0).to_string(), "0.00");
        assert_eq!(Money::new(1).to_string(), "0.01");
        assert_eq!(Money::new(10).to_string(), "0.10");
        assert_eq!(Money::new(1050).to_string(), "10.50");
        assert_eq!(Money::new(-1050).to_string(), "-10.50");
    }

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Money>().unwrap().minor(), 1000);
        assert_eq!("10.5".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("10,50".parse::<Money>().unwrap().minor(), 1050);
        assert_eq!("-0.01".parse::<Money>().unwrap().minor(), -1);
        assert_eq!("+1.00".parse::<Money>().unwrap().minor(), 100);
        assert_eq!("  2.30 ".parse::<Money>().unwrap().minor(), 230);
    }

    #[test]
    fn parse_rejects_more_than_two_decimals() {
        assert!("12.345".parse::<Money>().is_err());
        assert!("0.001".parse::<Money>().is_err());
    }

    #[test]
    fn approximately_equal_within_one_minor_unit() {
        assert!(Money::new(1000).approximately_equal(Money::new(1000)));
        assert!(Money::new(1000).approximately_equal(Money::new(1001)));
        assert!(Money::new(1001).approximately_equal(Money::new(1000)));
        assert!(!Money::new(1000).approximately_equal(Money::new(1002)));
    }

    #[test]
    fn scalar_multiplication_for_quantity_pricing() {
        // Pizza at 18.99, quantity 2.
        assert_eq!((Money::new(18_99) * 2).minor(), 37_98);
        assert_eq!(Money::new(18_99).checked_mul(2), Some(Money::new(37_98)));
        assert_eq!(Money::new(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn validate_totals_accepts_reconciling_bill() {
        validate_totals(
            Money::new(100_00),
            Money::new(8_00),
            Money::new(16_00),
            Money::new(124_00),
        )
        .unwrap();
        // One minor unit of rounding slack is tolerated.
        validate_totals(
            Money::new(100_00),
            Money::new(8_00),
            Money::new(16_00),
            Money::new(124_01),
        )
        .unwrap();
    }

    #[test]
    fn validate_totals_reports_mismatch_amounts() {
        let err = validate_totals(
            Money::new(100_00),
            Money::new(8_00),
            Money::new(16_00),
            Money::new(124_50),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::TotalMismatch {
                expected: Money::new(124_00),
                actual: Money::new(124_50),
            }
        );
    }

    #[test]
    fn saturating_remainder_floors_at_zero() {
        assert_eq!(
            Money::new(2050).saturating_remainder(Money::new(500)),
            Money::new(1550)
        );
        assert_eq!(
            Money::new(2050).saturating_remainder(Money::new(2050)),
            Money::ZERO
        );
        assert_eq!(
            Money::new(2050).saturating_remainder(Money::new(3000)),
            Money::ZERO
        );
    }
}
