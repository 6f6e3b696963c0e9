//! # Line Pricing
//!
//! Effective unit price and subtotal of one cart line.
//!
//! ## Resolution Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. 0 < quantity ≤ max_line_quantity         else QuantityTooLarge     │
//! │  2. product active                           else ProductUnavailable   │
//! │  3. variant belongs to product               else VariantNotFound      │
//! │  4. quantity ≤ available (variant's stock    else InsufficientStock    │
//! │     when a variant is chosen)                                          │
//! │  5. base price                                                         │
//! │       variant.sale_price  or  product.sale_price                       │
//! │       wholesale tier reached → variant.wholesale_price                 │
//! │                                (product.wholesale_price if no variant) │
//! │  6. product discount applied to the base, floored at zero              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pure computation. Stock is only checked here; decrementing happens in the
//! persistence layer inside the checkout transaction.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::catalog::{Product, ProductVariant};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::tax::TaxRate;

/// A priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LinePrice {
    pub product_id: String,
    pub variant_id: Option<String>,
    /// SKU of the variant when one is chosen, else the product's.
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    /// Price before discount.
    pub base_unit_price: Money,
    pub unit_discount: Money,
    /// Price after discount.
    pub unit_price: Money,
    pub line_subtotal: Money,
    pub line_discount: Money,
    /// Whether the wholesale tier supplied the base price.
    pub wholesale: bool,
}

impl LinePrice {
    /// VAT of one unit, for the order detail snapshot.
    pub fn unit_vat(&self, rate: TaxRate) -> Money {
        self.unit_price.calculate_tax(rate)
    }

    /// VAT of the whole line, rounded once per line.
    pub fn line_vat(&self, rate: TaxRate) -> Money {
        self.line_subtotal.calculate_tax(rate)
    }
}

/// Resolves the undiscounted unit price and whether it is a wholesale price.
pub fn resolve_base_price(
    product: &Product,
    variant: Option<&ProductVariant>,
    quantity: i64,
) -> (Money, bool) {
    let wholesale = if product.wholesale_applies(quantity) {
        match variant {
            Some(v) => v.wholesale_price,
            None => product.wholesale_price,
        }
    } else {
        None
    };

    match (wholesale, variant) {
        (Some(price), _) => (Money::from_minor(price), true),
        (None, Some(v)) => (v.sale_price(), false),
        (None, None) => (product.sale_price(), false),
    }
}

/// Prices one line.
///
/// ## Example
/// ```rust,ignore
/// // product 1000 with 10% off, variant priced 1200
/// let simple = price_line(&product, None, 1, 999)?;
/// assert_eq!(simple.unit_price.minor(), 900);
///
/// let red_m = price_line(&product, Some(&variant), 1, 999)?;
/// assert_eq!(red_m.unit_price.minor(), 1080);
/// ```
pub fn price_line(
    product: &Product,
    variant: Option<&ProductVariant>,
    quantity: i64,
    max_line_quantity: i64,
) -> CoreResult<LinePrice> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }

    if quantity > max_line_quantity {
        return Err(CoreError::QuantityTooLarge {
            requested: quantity,
            max: max_line_quantity,
        });
    }

    if !product.is_active {
        return Err(CoreError::ProductUnavailable(product.id.clone()));
    }

    if let Some(v) = variant {
        if v.product_id != product.id {
            return Err(CoreError::VariantNotFound {
                product_id: product.id.clone(),
                variant_id: v.id.clone(),
            });
        }
    }

    let (sku, available) = match variant {
        Some(v) => (v.sku.clone(), v.available_quantity),
        None => (product.sku.clone(), product.available_quantity),
    };

    if quantity > available {
        return Err(CoreError::InsufficientStock {
            sku,
            available: available.max(0),
            requested: quantity,
        });
    }

    let (base, wholesale) = resolve_base_price(product, variant, quantity);
    let price = product.discount()?.apply(base);

    let name = match variant {
        Some(v) => format!("{} ({})", product.name, v.label()),
        None => product.name.clone(),
    };

    let line_subtotal = price.discounted.bounded_mul(quantity, "line_subtotal")?;
    let line_discount = price.discount.bounded_mul(quantity, "line_discount")?;

    Ok(LinePrice {
        product_id: product.id.clone(),
        variant_id: variant.map(|v| v.id.clone()),
        sku,
        name,
        quantity,
        base_unit_price: price.base,
        unit_discount: price.discount,
        unit_price: price.discounted,
        line_subtotal,
        line_discount,
        wholesale,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
