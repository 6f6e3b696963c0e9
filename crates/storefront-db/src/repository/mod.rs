//! # Repository Module
//!
//! Database repository implementations for the storefront.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │       │  db.catalog().get_product(id)                                   │
//! │       ▼                                                                 │
//! │  CatalogRepository { pool }                                             │
//! │       │                                                                 │
//! │       │  pub(crate) fetch_product(executor, id)                         │
//! │       ▼                                                                 │
//! │  &SqlitePool  or  &mut SqliteConnection (inside a checkout transaction) │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hold a pool clone for standalone calls. The lookups and
//! writes checkout needs are also exposed as executor-generic functions so
//! they can run on the checkout transaction's connection.
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Products, variants, stock
//! - [`TaxRuleRepository`](tax_rule::TaxRuleRepository) - Per-country VAT rules
//! - [`ShippingMethodRepository`](shipping::ShippingMethodRepository) - Shipping methods
//! - [`PaymentMethodRepository`](payment_method::PaymentMethodRepository) - Gateways
//! - [`OrderRepository`](order::OrderRepository) - Placed orders (read side)
//! - [`TransactionRepository`](transaction::TransactionRepository) - Money movements
//! - [`SettingsRepository`](settings::SettingsRepository) - Typed key/value settings

pub mod catalog;
pub mod order;
pub mod payment_method;
pub mod settings;
pub mod shipping;
pub mod tax_rule;
pub mod transaction;
