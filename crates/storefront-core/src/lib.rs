//! # storefront-core: Pricing & Checkout Logic
//!
//! This crate holds every pricing and checkout rule of the storefront as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Callers (web handlers, gateway webhooks, jobs)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ storefront-core (THIS CRATE) ★                  │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌──────────┐          │   │
//! │  │   │ catalog │  │ pricing │  │   tax   │  │ shipping │          │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └──────────┘          │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌──────────┐          │   │
//! │  │   │  cart   │  │checkout │  │  order  │  │ payment  │          │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └──────────┘          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                storefront-db (Database Layer)                   │   │
//! │  │     SQLite queries, migrations, repositories, atomic checkout   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Money type with integer arithmetic in minor units
//! - [`catalog`] - Products, variants, discounts
//! - [`pricing`] - Per-line price resolution
//! - [`tax`] - Per-country VAT rules and resolution
//! - [`shipping`] - Shipping methods and free-shipping thresholds
//! - [`cart`] - Cart lines, merging and limits
//! - [`checkout`] - Request → priced, validated quote
//! - [`order`] - Order aggregate and status machines
//! - [`payment`] - Payment methods, transactions, gateway contract
//! - [`settings`] - Typed store settings
//! - [`error`] / [`validation`] - Error types and field rules
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::money::Money;
//! use storefront_core::tax::TaxRate;
//!
//! let line = Money::from_minor(15_000); // 15 000 F CFA
//! let vat = line.calculate_tax(TaxRate::from_bps(1800)); // 18%
//! assert_eq!(vat.minor(), 2_700);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod error;
pub mod money;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod settings;
pub mod shipping;
pub mod tax;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLimits, CartLine};
pub use catalog::{Discount, DiscountType, Product, ProductVariant};
pub use checkout::{
    build_quote, CatalogSnapshot, CheckoutQuote, CheckoutRequest, CheckoutTotals, QuoteContext,
    QuoteLine, ShippingAddressInput,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use order::{
    Order, OrderDetail, OrderStatus, OrderWithDetails, PaymentStatus, ShippingAddress,
    ShippingStatus,
};
pub use payment::{
    GatewayCallback, GatewayOutcome, PaymentMethod, PaymentSummary, Transaction, TransactionKind,
    TransactionStatus, Transactionable, TransactionableKind,
};
pub use pricing::LinePrice;
pub use settings::{Currency, Setting, SettingType, SettingValue, StoreSettings};
pub use shipping::ShippingMethod;
pub use tax::{ResolvedTax, TaxRate, TaxRule, TaxSource};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default maximum of distinct lines in one cart.
///
/// Overridable through the `max_cart_lines` setting.
pub const MAX_CART_ITEMS: usize = 100;

/// Default maximum quantity of a single line.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
