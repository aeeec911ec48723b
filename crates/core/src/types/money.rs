//! Integer minor-unit money.
//!
//! All monetary arithmetic in Marea happens in the smallest currency unit
//! (kopecks, cents) on `i64`, never floating point, so stacked deductions
//! cannot accumulate rounding drift. `rust_decimal` is used for display
//! formatting only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount in minor currency units.
///
/// Deductions use [`Money::saturating_sub`], which floors at zero: a
/// discount chain can exhaust an amount but never drive it negative.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(0);

    /// Create from minor units (e.g., kopecks).
    #[must_use]
    pub const fn from_minor(amount: i64) -> Self {
        Self(amount)
    }

    /// Create from major units (e.g., whole rubles).
    #[must_use]
    pub const fn from_major(units: i64) -> Self {
        Self(units * 100)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn as_minor(&self) -> i64 {
        self.0
    }

    /// Whether the amount is exactly zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtract, flooring at zero.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        let diff = self.0 - other.0;
        if diff < 0 { Self::ZERO } else { Self(diff) }
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self(self.0 * quantity as i64)
    }

    /// `floor(amount × percent / 100)`, for percentage-based caps.
    #[must_use]
    pub const fn percent_floor(self, percent: u8) -> Self {
        Self(self.0 * percent as i64 / 100)
    }

    /// Format in major units with two decimal places (e.g., "129.50").
    #[must_use]
    pub fn display(&self) -> String {
        Decimal::new(self.0, 2).to_string()
    }
}

impl std::ops::Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, std::ops::Add::add)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_major() {
        assert_eq!(Money::from_major(10).as_minor(), 1000);
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let a = Money::from_minor(300);
        let b = Money::from_minor(500);
        assert_eq!(a.saturating_sub(b), Money::ZERO);
        assert_eq!(b.saturating_sub(a), Money::from_minor(200));
    }

    #[test]
    fn test_times() {
        assert_eq!(Money::from_minor(1050).times(3), Money::from_minor(3150));
    }

    #[test]
    fn test_percent_floor_truncates() {
        // 15% of 999 minor units is 149.85, floored to 149
        assert_eq!(
            Money::from_minor(999).percent_floor(15),
            Money::from_minor(149)
        );
        assert_eq!(
            Money::from_major(2000).percent_floor(10),
            Money::from_major(200)
        );
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_minor(100), Money::from_minor(250)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_minor(350));
    }

    #[test]
    fn test_display_two_decimals() {
        assert_eq!(Money::from_minor(129_50).display(), "129.50");
        assert_eq!(Money::ZERO.display(), "0.00");
    }

    #[test]
    fn test_serde_transparent() {
        let m = Money::from_minor(1999);
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "1999");
        let parsed: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, m);
    }
}
