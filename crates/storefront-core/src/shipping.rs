//! # Shipping
//!
//! Shipping methods and the free-shipping threshold.
//!
//! ```text
//! ShippingMethod.price ──┬── supports_free_shipping && payable ≥ threshold ──► 0
//!                        └── otherwise ─────────────────────────────────────► price
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_price, validate_required_text};

/// A delivery option offered at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShippingMethod {
    pub id: String,
    pub name: String,
    /// Base cost in minor units.
    pub price: i64,
    pub supports_free_shipping: bool,
    /// Payable amount from which shipping is waived.
    pub free_shipping_threshold: Option<i64>,
    pub is_active: bool,
    pub sort_order: i64,
}

impl ShippingMethod {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price)
    }

    /// Whether `payable` earns free shipping with this method.
    pub fn qualifies_for_free_shipping(&self, payable: Money) -> bool {
        match self.free_shipping_threshold {
            Some(threshold) if self.supports_free_shipping => {
                payable >= Money::from_minor(threshold)
            }
            _ => false,
        }
    }

    /// Rejects inactive methods.
    pub fn ensure_available(&self) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::ShippingMethodUnavailable(self.id.clone()));
        }
        Ok(())
    }
}

/// Shipping cost for an order.
///
/// `free_shipping_enabled` is the store-wide switch from settings; when off,
/// every method charges its base price.
///
/// ```rust,ignore
/// // threshold 50000, price 2500
/// assert_eq!(shipping_cost(&method, Money::from_minor(50000), true), Money::zero());
/// assert_eq!(shipping_cost(&method, Money::from_minor(49999), true).minor(), 2500);
/// ```
pub fn shipping_cost(method: &ShippingMethod, payable: Money, free_shipping_enabled: bool) -> Money {
    if free_shipping_enabled && method.qualifies_for_free_shipping(payable) {
        Money::zero()
    } else {
        method.price()
    }
}

/// Validates a method before it is stored.
pub fn validate_shipping_method(method: &ShippingMethod) -> Result<(), ValidationError> {
    validate_required_text("name", &method.name, 100)?;
    validate_price("price", method.price)?;

    if let Some(threshold) = method.free_shipping_threshold {
        validate_price("free_shipping_threshold", threshold)?;
    } else if method.supports_free_shipping {
        return Err(ValidationError::Required {
            field: "free_shipping_threshold".to_string(),
        });
    }

    Ok(())
}
