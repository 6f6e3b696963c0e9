//! # Catalog Types
//!
//! Products, variants and product-level discounts.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ┌─────────────────────┐ 1      n ┌──────────────────────┐              │
//! │  │      Product        │──────────│    ProductVariant    │              │
//! │  │  ─────────────────  │          │  ──────────────────  │              │
//! │  │  sku                │          │  sku (unique)        │              │
//! │  │  sale_price         │          │  color / size        │              │
//! │  │  wholesale_price?   │          │  sale_price          │ overrides    │
//! │  │  wholesale_min_qty? │          │  wholesale_price?    │ overrides    │
//! │  │  discount_type      │          │  available_quantity  │ overrides    │
//! │  │  discount_value     │          └──────────────────────┘              │
//! │  │  available_quantity │                                                │
//! │  └─────────────────────┘                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The discount lives on the product only. It applies to whichever base
//! price line pricing resolves, including a variant's own sale price.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{Money, BPS_DENOMINATOR};

// =============================================================================
// Discount
// =============================================================================

/// How `discount_value` is interpreted. Stored as 0 / 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i32)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_value` is an amount in minor units subtracted per unit.
    #[default]
    Fixed = 0,
    /// `discount_value` is a rate in basis points (1000 = 10%).
    Percentage = 1,
}

/// A validated product discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discount {
    Fixed(Money),
    Percentage(u32),
}

/// A unit price before and after discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountedPrice {
    pub base: Money,
    /// Amount actually taken off; never more than `base`.
    pub discount: Money,
    pub discounted: Money,
}

impl Discount {
    /// Builds a discount from its stored representation.
    pub fn from_parts(sku: &str, discount_type: DiscountType, value: i64) -> CoreResult<Self> {
        if value < 0 {
            return Err(CoreError::InvalidDiscountConfiguration {
                sku: sku.to_string(),
                reason: format!("discount cannot be negative ({})", value),
            });
        }

        match discount_type {
            DiscountType::Fixed => Ok(Discount::Fixed(Money::from_minor(value))),
            DiscountType::Percentage => {
                if value > BPS_DENOMINATOR {
                    return Err(CoreError::InvalidDiscountConfiguration {
                        sku: sku.to_string(),
                        reason: format!(
                            "percentage discount {}% exceeds 100%",
                            value as f64 / 100.0
                        ),
                    });
                }
                Ok(Discount::Percentage(value as u32))
            }
        }
    }

    /// Applies the discount to a unit price, flooring the result at zero.
    ///
    /// ```rust
    /// use storefront_core::catalog::Discount;
    /// use storefront_core::money::Money;
    ///
    /// let ten_percent = Discount::Percentage(1000);
    /// assert_eq!(ten_percent.apply(Money::from_minor(1000)).discounted.minor(), 900);
    ///
    /// let big_fixed = Discount::Fixed(Money::from_minor(5000));
    /// let price = big_fixed.apply(Money::from_minor(1000));
    /// assert_eq!(price.discounted.minor(), 0);
    /// assert_eq!(price.discount.minor(), 1000);
    /// ```
    pub fn apply(&self, base: Money) -> DiscountedPrice {
        let requested = match self {
            Discount::Fixed(amount) => *amount,
            Discount::Percentage(bps) => base.basis_points(*bps),
        };

        let discounted = (base - requested).floor_zero();

        DiscountedPrice {
            base,
            discount: base - discounted,
            discounted,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product listed in the storefront.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    pub name: String,

    /// What the shop paid per unit (minor units). Reporting only.
    pub purchase_cost: i64,

    /// Current sale price per unit (minor units).
    pub sale_price: i64,

    /// Per-unit price once `wholesale_minimum_qty` is reached.
    pub wholesale_price: Option<i64>,

    pub wholesale_minimum_qty: Option<i64>,

    pub discount_type: DiscountType,

    /// Minor units for `Fixed`, basis points for `Percentage`.
    pub discount_value: i64,

    /// Units on hand for products sold without variants.
    pub available_quantity: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_minor(self.sale_price)
    }

    /// Returns the validated product discount.
    pub fn discount(&self) -> CoreResult<Discount> {
        Discount::from_parts(&self.sku, self.discount_type, self.discount_value)
    }

    /// Sale price after the product discount, never negative.
    ///
    /// ```rust,ignore
    /// // sale_price 1000, Percentage 1000 bps (10%)
    /// assert_eq!(product.calculated_final_price()?.minor(), 900);
    /// ```
    pub fn calculated_final_price(&self) -> CoreResult<Money> {
        Ok(self.discount()?.apply(self.sale_price()).discounted)
    }

    /// Whether `quantity` reaches the wholesale tier.
    pub fn wholesale_applies(&self, quantity: i64) -> bool {
        matches!(self.wholesale_minimum_qty, Some(min) if min > 0 && quantity >= min)
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// A color/size combination of a product with its own SKU, price and stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductVariant {
    pub id: String,
    pub product_id: String,
    pub sku: String,
    pub color: Option<String>,
    pub size: Option<String>,
    /// Overrides the product's sale price.
    pub sale_price: i64,
    /// Overrides the product's wholesale price.
    pub wholesale_price: Option<i64>,
    /// Overrides the product's stock.
    pub available_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl ProductVariant {
    #[inline]
    pub fn sale_price(&self) -> Money {
        Money::from_minor(self.sale_price)
    }

    /// Display label, e.g. "Red / M".
    pub fn label(&self) -> String {
        match (&self.color, &self.size) {
            (Some(c), Some(s)) => format!("{} / {}", c, s),
            (Some(c), None) => c.clone(),
            (None, Some(s)) => s.clone(),
            (None, None) => self.sku.clone(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
