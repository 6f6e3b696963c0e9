//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌                                  │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    XOF has no minor unit: 1 500 F CFA = Money(1500)                     │
//! │    EUR has two decimals:   15,00 €    = Money(1500)                     │
//! │                                                                         │
//! │  The currency exponent lives in StoreSettings, never in Money itself.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use storefront_core::money::Money;
//!
//! let price = Money::from_minor(1099);
//! let doubled = price * 2;
//! let total = price + Money::from_minor(500);
//! assert_eq!(doubled.minor(), 2198);
//! assert_eq!(total.minor(), 1599);
//! ```

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::settings::Currency;
use crate::tax::TaxRate;

/// Denominator for basis-point arithmetic (10000 bps = 100%).
pub const BPS_DENOMINATOR: i64 = 10_000;

/// Largest amount a price, a payment or a persisted total may hold
/// (10^15 minor units).
///
/// Any two bounded amounts add without overflowing `i64`, and a bounded
/// amount times 10 000 bps still fits once widened to i128.
pub const MAX_MONEY: i64 = 1_000_000_000_000_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest unit of the store currency.
///
/// ## Design Decisions
/// - **i64 (signed)**: negative values are legal for refunds and for an
///   overpaid order's amount due
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **No currency inside**: every persisted total carries its currency code
///   next to it (see `Order::currency_code`)
///
/// ## Where Money Flows
/// ```text
/// Product.sale_price ──► LinePrice.unit_price ──► LinePrice.line_subtotal
///                                                        │
///   CheckoutTotals.total_payable_amount ◄────────────────┘
///        │
///        ├──► + VAT (per line) ──► + shipping ──► grand_total
///        │
///        └──► grand_total - total_paid ──► total_due
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// let price = Money::from_minor(1099);
    /// assert_eq!(price.minor(), 1099);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    ///
    /// Used for discounted prices: a fixed discount larger than the price
    /// yields a free item, never a negative one.
    #[inline]
    pub const fn floor_zero(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Returns the share of this amount expressed in basis points,
    /// rounded half away from zero to the minor unit.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    ///
    /// // 10% of 1000
    /// assert_eq!(Money::from_minor(1000).basis_points(1000).minor(), 100);
    /// // 12.5% of 999 = 124.875 → 125
    /// assert_eq!(Money::from_minor(999).basis_points(1250).minor(), 125);
    /// ```
    pub fn basis_points(&self, bps: u32) -> Money {
        Money(round_bps(self.0, bps as i64))
    }

    /// Calculates VAT on this amount.
    ///
    /// ## Implementation
    /// Integer math: `(amount * rate_bps ± 5000) / 10000`, so halves round
    /// away from zero. Amounts are widened to i128 to avoid overflow.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    /// use storefront_core::tax::TaxRate;
    ///
    /// let line = Money::from_minor(1000);
    /// let vat = line.calculate_tax(TaxRate::from_bps(1800)); // 18%
    /// assert_eq!(vat.minor(), 180);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        self.basis_points(rate.bps())
    }

    #[inline]
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    #[inline]
    pub fn checked_mul(self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    /// `self + other`, refused when the sum leaves `0..=MAX_MONEY`.
    ///
    /// ```rust
    /// use storefront_core::money::{Money, MAX_MONEY};
    ///
    /// let max = Money::from_minor(MAX_MONEY);
    /// assert!(max.bounded_add(Money::zero(), "total").is_ok());
    /// assert!(max.bounded_add(Money::from_minor(1), "total").is_err());
    /// ```
    pub fn bounded_add(self, other: Money, field: &str) -> Result<Money, ValidationError> {
        self.checked_add(other)
            .filter(Money::is_within_max)
            .ok_or_else(|| out_of_range(field))
    }

    /// `self * qty`, refused when the product leaves `0..=MAX_MONEY`.
    pub fn bounded_mul(self, qty: i64, field: &str) -> Result<Money, ValidationError> {
        self.checked_mul(qty)
            .filter(Money::is_within_max)
            .ok_or_else(|| out_of_range(field))
    }

    #[inline]
    pub fn is_within_max(&self) -> bool {
        (0..=MAX_MONEY).contains(&self.0)
    }

    /// Formats the amount for display in the given currency.
    ///
    /// ```rust
    /// use storefront_core::money::Money;
    /// use storefront_core::settings::Currency;
    ///
    /// let xof = Currency::xof();
    /// assert_eq!(Money::from_minor(15000).format(&xof), "15000 F CFA");
    ///
    /// let eur = Currency::new("EUR", "€", 2);
    /// assert_eq!(Money::from_minor(-1550).format(&eur), "-15.50 €");
    /// ```
    pub fn format(&self, currency: &Currency) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let decimals = currency.decimals as u32;
        let value = self.0.unsigned_abs();

        let number = if decimals == 0 {
            value.to_string()
        } else {
            let divisor = 10_u64.pow(decimals);
            format!(
                "{}.{:0width$}",
                value / divisor,
                value % divisor,
                width = decimals as usize
            )
        };

        format!("{}{} {}", sign, number, currency.symbol)
    }
}

fn out_of_range(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: MAX_MONEY,
    }
}

/// `amount * bps / 10000`, rounded half away from zero.
pub(crate) fn round_bps(amount: i64, bps: i64) -> i64 {
    let product = amount as i128 * bps as i128;
    let half = (BPS_DENOMINATOR / 2) as i128;
    let rounded = if product >= 0 {
        (product + half) / BPS_DENOMINATOR as i128
    } else {
        (product - half) / BPS_DENOMINATOR as i128
    };
    rounded as i64
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);
    }

    #[test]
    fn test_checked_arithmetic() {
        let max = Money::from_minor(i64::MAX);

        assert_eq!(max.checked_add(Money::from_minor(1)), None);
        assert_eq!(max.checked_mul(2), None);
        assert_eq!(Money::from_minor(25).checked_mul(4), Some(Money::from_minor(100)));
    }

    #[test]
    fn test_bounded_arithmetic() {
        let max = Money::from_minor(MAX_MONEY);

        assert_eq!(max.bounded_add(Money::zero(), "total").unwrap(), max);
        assert!(matches!(
            max.bounded_add(Money::from_minor(1), "total"),
            Err(ValidationError::OutOfRange { max: MAX_MONEY, .. })
        ));
        // Overflowing i64 is reported, not wrapped.
        assert!(Money::from_minor(i64::MAX)
            .bounded_add(Money::from_minor(i64::MAX), "total")
            .is_err());

        assert_eq!(
            Money::from_minor(1_000).bounded_mul(999, "line").unwrap().minor(),
            999_000
        );
        assert!(Money::from_minor(i64::MAX / 10)
            .bounded_mul(20, "line")
            .is_err());
        assert!(Money::from_minor(MAX_MONEY).bounded_mul(2, "line").is_err());
    }

    #[test]
    fn test_vat_on_max_amount_fits() {
        let vat = Money::from_minor(MAX_MONEY).calculate_tax(TaxRate::from_bps(10_000));
        assert_eq!(vat.minor(), MAX_MONEY);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 650].iter().map(|m| Money::from_minor(*m)).sum();
        assert_eq!(total.minor(), 1000);
    }

    #[test]
    fn test_tax_calculation_basic() {
        let amount = Money::from_minor(1000);
        let tax = amount.calculate_tax(TaxRate::from_bps(1000));
        assert_eq!(tax.minor(), 100);
    }

    #[test]
    fn test_tax_calculation_rounds_half_up() {
        // 1000 at 8.25% = 82.5 → 83
        let tax = Money::from_minor(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.minor(), 83);

        // 1001 at 18% = 180.18 → 180
        let tax = Money::from_minor(1001).calculate_tax(TaxRate::from_bps(1800));
        assert_eq!(tax.minor(), 180);
    }

    #[test]
    fn test_basis_points_negative_amount_is_symmetric() {
        assert_eq!(Money::from_minor(-1000).basis_points(825).minor(), -83);
    }

    #[test]
    fn test_floor_zero() {
        assert_eq!(Money::from_minor(-5).floor_zero(), Money::zero());
        assert_eq!(Money::from_minor(5).floor_zero().minor(), 5);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_positive());
        assert!(!zero.is_negative());

        let negative = Money::from_minor(-100);
        assert!(negative.is_negative());
        assert_eq!(negative.abs().minor(), 100);
    }

    #[test]
    fn test_format() {
        let xof = Currency::xof();
        assert_eq!(Money::from_minor(0).format(&xof), "0 F CFA");
        assert_eq!(Money::from_minor(50000).format(&xof), "50000 F CFA");

        let eur = Currency::new("EUR", "€", 2);
        assert_eq!(Money::from_minor(1099).format(&eur), "10.99 €");
        assert_eq!(Money::from_minor(5).format(&eur), "0.05 €");

        let kwd = Currency::new("KWD", "KD", 3);
        assert_eq!(Money::from_minor(12345).format(&kwd), "12.345 KD");
    }
}
