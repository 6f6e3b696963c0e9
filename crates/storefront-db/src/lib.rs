//! # storefront-db: Database Layer for the Storefront
//!
//! SQLite persistence for catalog, configuration and orders, plus the
//! transactional checkout built on top of `storefront-core`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Data Flow                             │
//! │                                                                         │
//! │  Web handler / gateway webhook                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  storefront-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌──────────────┐    │   │
//! │  │   │   Database    │   │ CheckoutService│   │  Migrations  │    │   │
//! │  │   │   (pool.rs)   │   │  (checkout.rs) │   │  (embedded)  │    │   │
//! │  │   │               │   │                │   │              │    │   │
//! │  │   │ SqlitePool    │◄──│ place_order    │   │ 001_initial  │    │   │
//! │  │   │ DbConfig      │   │ callbacks      │   │ _schema.sql  │    │   │
//! │  │   └───────┬───────┘   └────────────────┘   └──────────────┘    │   │
//! │  │           │                                                     │   │
//! │  │   ┌───────▼─────────────────────────────────────────────────┐  │   │
//! │  │   │ Repositories: catalog, tax_rule, shipping,              │  │   │
//! │  │   │ payment_method, order, transaction, settings            │  │   │
//! │  │   └─────────────────────────────────────────────────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`checkout`] - Atomic checkout and payment recording
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use storefront_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::from_env()?).await?;
//! let settings = Arc::new(db.load_store_settings().await?);
//!
//! let placed = db.checkout(settings).place_order(&request).await?;
//! println!("{} due", placed.order.total_due);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use checkout::CheckoutService;
pub use error::{ConfigError, DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::order::OrderRepository;
pub use repository::payment_method::PaymentMethodRepository;
pub use repository::settings::SettingsRepository;
pub use repository::shipping::ShippingMethodRepository;
pub use repository::tax_rule::TaxRuleRepository;
pub use repository::transaction::TransactionRepository;
