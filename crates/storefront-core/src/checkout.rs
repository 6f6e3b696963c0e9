//! # Checkout Quote
//!
//! Turns a checkout request into fully priced, validated totals. Nothing in
//! here touches storage: the caller loads a [`CatalogSnapshot`] and the
//! configuration, and persists the resulting [`CheckoutQuote`].
//!
//! ## Pipeline
//! ```text
//! CheckoutRequest
//!      │
//!      ▼
//! Cart::from_lines ───────────── EmptyCart, CartTooLarge, QuantityTooLarge
//!      │
//!      ▼
//! check_destination ──────────── InvalidCountryForDelivery
//!      │
//!      ▼
//! shipping / payment method ──── *MethodUnavailable
//!      │
//!      ▼
//! price_line × n ─────────────── ProductNotFound, VariantNotFound,
//!      │                         ProductUnavailable, InsufficientStock,
//!      │                         InvalidDiscountConfiguration
//!      ▼
//! resolve_tax + per-line VAT
//!      │
//!      ▼
//! check_minimum_order ────────── BelowMinimumOrder
//!      │
//!      ▼
//! shipping_cost ──► CheckoutTotals ──► grand_total
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::{Cart, CartLimits, CartLine};
use crate::catalog::{Product, ProductVariant};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::payment::PaymentMethod;
use crate::pricing::{price_line, LinePrice};
use crate::settings::StoreSettings;
use crate::shipping::{shipping_cost, ShippingMethod};
use crate::tax::{check_destination, check_minimum_order, resolve_tax, ResolvedTax, TaxRule};
use crate::validation::{validate_optional_text, validate_required_text};

const MAX_NOTE_LENGTH: usize = 1000;

// =============================================================================
// Request
// =============================================================================

/// Delivery address as submitted by the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingAddressInput {
    pub recipient_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    /// Defaults to the order's destination.
    #[serde(default)]
    pub country_code: Option<String>,
}

impl ShippingAddressInput {
    /// Validates fields and returns the address country, which must match
    /// the destination.
    fn validate(&self, destination: &str) -> CoreResult<String> {
        validate_required_text("recipient_name", &self.recipient_name, 120)?;
        validate_required_text("phone", &self.phone, 32)?;
        validate_required_text("address_line", &self.address_line, 255)?;
        validate_required_text("city", &self.city, 120)?;
        validate_optional_text("postal_code", self.postal_code.as_deref(), 16)?;

        match &self.country_code {
            Some(code) if !code.trim().eq_ignore_ascii_case(destination) => {
                Err(ValidationError::InvalidFormat {
                    field: "shipping_address.country_code".to_string(),
                    reason: format!("must match destination {}", destination),
                }
                .into())
            }
            _ => Ok(destination.to_string()),
        }
    }
}

/// A checkout submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutRequest {
    pub lines: Vec<CartLine>,
    pub country_code: String,
    pub shipping_method_id: String,
    pub payment_method_id: String,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddressInput>,
    #[serde(default)]
    pub customer_note: Option<String>,
}

// =============================================================================
// Catalog Snapshot
// =============================================================================

/// The products and variants a checkout refers to, loaded by the caller.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    products: HashMap<String, Product>,
    variants: HashMap<String, ProductVariant>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_product(&mut self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    pub fn insert_variant(&mut self, variant: ProductVariant) {
        self.variants.insert(variant.id.clone(), variant);
    }

    pub fn product(&self, id: &str) -> CoreResult<&Product> {
        self.products
            .get(id)
            .ok_or_else(|| CoreError::ProductNotFound(id.to_string()))
    }

    /// Looks a variant up and checks it belongs to `product_id`.
    pub fn variant(&self, product_id: &str, variant_id: &str) -> CoreResult<&ProductVariant> {
        self.variants
            .get(variant_id)
            .filter(|v| v.product_id == product_id)
            .ok_or_else(|| CoreError::VariantNotFound {
                product_id: product_id.to_string(),
                variant_id: variant_id.to_string(),
            })
    }
}

/// Configuration a quote is computed against.
#[derive(Debug, Clone, Copy)]
pub struct QuoteContext<'a> {
    pub settings: &'a StoreSettings,
    pub tax_rules: &'a [TaxRule],
    pub shipping_method: &'a ShippingMethod,
    pub payment_method: &'a PaymentMethod,
}

// =============================================================================
// Quote
// =============================================================================

/// A priced line with its VAT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteLine {
    pub price: LinePrice,
    pub unit_vat: Money,
    pub line_vat: Money,
}

/// Aggregated order totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutTotals {
    /// Σ discounted line subtotals.
    pub total_payable_amount: Money,
    /// Σ line discounts (reporting only; already inside the payable amount).
    pub total_discount: Money,
    pub total_vat_amount: Money,
    pub shipping_cost: Money,
}

impl CheckoutTotals {
    pub fn grand_total(&self) -> Money {
        self.total_payable_amount + self.total_vat_amount + self.shipping_cost
    }
}

/// Everything checkout persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutQuote {
    pub lines: Vec<QuoteLine>,
    pub country_code: String,
    pub currency_code: String,
    pub tax: ResolvedTax,
    pub totals: CheckoutTotals,
    pub shipping_address: Option<ShippingAddressInput>,
    pub customer_note: Option<String>,
}

impl CheckoutQuote {
    pub fn grand_total(&self) -> Money {
        self.totals.grand_total()
    }
}

/// Sums line subtotals, discounts and per-line VAT.
///
/// Every sum stays within `0..=MAX_MONEY`.
pub fn aggregate(lines: &[QuoteLine]) -> CoreResult<CheckoutTotals> {
    lines
        .iter()
        .try_fold(CheckoutTotals::default(), |acc, line| -> CoreResult<_> {
            Ok(CheckoutTotals {
                total_payable_amount: acc
                    .total_payable_amount
                    .bounded_add(line.price.line_subtotal, "total_payable_amount")?,
                total_discount: acc
                    .total_discount
                    .bounded_add(line.price.line_discount, "total_discount")?,
                total_vat_amount: acc
                    .total_vat_amount
                    .bounded_add(line.line_vat, "total_vat_amount")?,
                ..acc
            })
        })
}

/// Prices and validates a checkout request.
pub fn build_quote(
    request: &CheckoutRequest,
    catalog: &CatalogSnapshot,
    ctx: &QuoteContext<'_>,
) -> CoreResult<CheckoutQuote> {
    let limits = CartLimits::from(ctx.settings);
    let cart = Cart::from_lines(&request.lines, limits)?;

    let country_code = check_destination(ctx.tax_rules, &request.country_code)?;

    ctx.shipping_method.ensure_available()?;
    ctx.payment_method.ensure_available()?;

    let shipping_address = match &request.shipping_address {
        Some(address) => {
            let country = address.validate(&country_code)?;
            Some(ShippingAddressInput {
                country_code: Some(country),
                ..address.clone()
            })
        }
        None => None,
    };

    validate_optional_text("customer_note", request.customer_note.as_deref(), MAX_NOTE_LENGTH)?;

    let tax = resolve_tax(ctx.tax_rules, &country_code);

    let lines = cart
        .lines()
        .iter()
        .map(|line| -> CoreResult<QuoteLine> {
            let product = catalog.product(&line.product_id)?;
            let variant = line
                .variant_id
                .as_deref()
                .map(|vid| catalog.variant(&line.product_id, vid))
                .transpose()?;

            let price = price_line(product, variant, line.quantity, limits.max_line_quantity)?;
            Ok(QuoteLine {
                unit_vat: price.unit_vat(tax.rate),
                line_vat: price.line_vat(tax.rate),
                price,
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    let mut totals = aggregate(&lines)?;

    check_minimum_order(&tax, &country_code, totals.total_payable_amount)?;

    totals.shipping_cost = shipping_cost(
        ctx.shipping_method,
        totals.total_payable_amount,
        ctx.settings.free_shipping_enabled,
    );

    totals
        .total_payable_amount
        .bounded_add(totals.total_vat_amount, "grand_total")?
        .bounded_add(totals.shipping_cost, "grand_total")?;

    Ok(CheckoutQuote {
        lines,
        country_code,
        currency_code: ctx.settings.currency.code.clone(),
        tax,
        totals,
        shipping_address,
        customer_note: request
            .customer_note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
