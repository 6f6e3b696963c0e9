//! # Error Types
//!
//! Domain-specific error types for storefront-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Checkout rejections, state machine violations  │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db errors (separate crate)                                 │
//! │  └── DbError          - Database failures, wraps CoreError rejections  │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Rejection Classes
//! Stock, minimum order, destination and discount errors are raised while
//! quoting, before anything is written. A checkout that fails with one of
//! them leaves no trace in the database.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id is unknown to the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Variant id is unknown, or belongs to another product.
    #[error("Variant {variant_id} not found for product {product_id}")]
    VariantNotFound {
        product_id: String,
        variant_id: String,
    },

    /// Product exists but is deactivated.
    #[error("Product {0} is not available for sale")]
    ProductUnavailable(String),

    /// Requested quantity exceeds what is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "TSHIRT-RED-M", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Product discount cannot be applied (percentage above 100, negative amount).
    #[error("Invalid discount configuration for {sku}: {reason}")]
    InvalidDiscountConfiguration { sku: String, reason: String },

    /// Cart subtotal is below the destination's minimum order amount.
    #[error("Order subtotal {subtotal} is below the minimum of {minimum} for {country_code}")]
    BelowMinimumOrder {
        country_code: String,
        minimum: i64,
        subtotal: i64,
    },

    /// Destination country cannot be delivered to.
    #[error("Delivery to country '{country_code}' is not possible")]
    InvalidCountryForDelivery { country_code: String },

    /// Shipping method is unknown or inactive.
    #[error("Shipping method {0} is not available")]
    ShippingMethodUnavailable(String),

    /// Payment method is unknown or inactive.
    #[error("Payment method {0} is not available")]
    PaymentMethodUnavailable(String),

    /// Gateway reported a failed payment.
    ///
    /// The failed attempt is recorded; the order stays unpaid and the
    /// customer may submit payment again.
    #[error("Payment via {gateway} failed: {reason}")]
    PaymentGatewayFailure { gateway: String, reason: String },

    /// Amount was expressed in a different currency than the order.
    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// Checkout was submitted without lines.
    #[error("Cart is empty")]
    EmptyCart,

    /// Cart has exceeded maximum allowed lines.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Line quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// A status machine refused a transition.
    #[error("{machine} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        machine: &'static str,
        from: String,
        to: String,
    },

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Machine-readable code for callers that surface rejections.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::ProductNotFound(_) | CoreError::VariantNotFound { .. } => "NOT_FOUND",
            CoreError::OrderNotFound(_) => "NOT_FOUND",
            CoreError::ProductUnavailable(_) => "PRODUCT_UNAVAILABLE",
            CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            CoreError::InvalidDiscountConfiguration { .. } => "INVALID_DISCOUNT_CONFIGURATION",
            CoreError::BelowMinimumOrder { .. } => "BELOW_MINIMUM_ORDER",
            CoreError::InvalidCountryForDelivery { .. } => "INVALID_COUNTRY_FOR_DELIVERY",
            CoreError::ShippingMethodUnavailable(_) => "SHIPPING_METHOD_UNAVAILABLE",
            CoreError::PaymentMethodUnavailable(_) => "PAYMENT_METHOD_UNAVAILABLE",
            CoreError::PaymentGatewayFailure { .. } => "PAYMENT_GATEWAY_FAILURE",
            CoreError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            CoreError::EmptyCart | CoreError::CartTooLarge { .. } => "CART_ERROR",
            CoreError::QuantityTooLarge { .. } | CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            CoreError::InvalidPaymentAmount { .. } => "PAYMENT_ERROR",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid country code).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., a second default tax rule).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
