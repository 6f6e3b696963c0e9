//! # Cart
//!
//! The set of lines a customer submits at checkout.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation                 Cart State Change                            │
//! │  ─────────                 ─────────────────                            │
//! │  add(p, v, 2)  ──────────► new line, or quantity += 2 on same (p, v)   │
//! │  update(p, v, 5) ────────► quantity = 5 (0 removes the line)           │
//! │  remove(p, v) ───────────► line dropped                                │
//! │  Cart::from_lines(..) ───► duplicates merged, limits enforced          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Lines are unique by `(product_id, variant_id)`
//! - Every quantity is in `1..=max_line_quantity`
//! - At most `max_cart_lines` lines
//!
//! Merging before pricing matters: two lines of 2 against a stock of 3 must
//! be seen as one request for 4.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::settings::StoreSettings;

/// One requested line: a product, optionally a variant, and a quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, variant_id: Option<&str>, quantity: i64) -> Self {
        CartLine {
            product_id: product_id.into(),
            variant_id: variant_id.map(str::to_string),
            quantity,
        }
    }

    fn same_item(&self, product_id: &str, variant_id: Option<&str>) -> bool {
        self.product_id == product_id && self.variant_id.as_deref() == variant_id
    }
}

/// Cart limits, taken from [`StoreSettings`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLimits {
    pub max_lines: usize,
    pub max_line_quantity: i64,
}

impl From<&StoreSettings> for CartLimits {
    fn from(settings: &StoreSettings) -> Self {
        CartLimits {
            max_lines: settings.max_cart_lines,
            max_line_quantity: settings.max_line_quantity,
        }
    }
}

/// A cart with unique lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    lines: Vec<CartLine>,
    limits: CartLimits,
}

impl Cart {
    pub fn new(limits: CartLimits) -> Self {
        Cart {
            lines: Vec::new(),
            limits,
        }
    }

    /// Builds a cart from raw request lines, merging duplicates in order of
    /// first appearance.
    ///
    /// ## Errors
    /// - `EmptyCart` when `lines` is empty
    /// - `Validation` when a quantity is not positive or an id is blank
    /// - `QuantityTooLarge` when a merged quantity exceeds the per-line max
    /// - `CartTooLarge` when more distinct lines than allowed remain
    pub fn from_lines(lines: &[CartLine], limits: CartLimits) -> CoreResult<Self> {
        if lines.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        let mut cart = Cart::new(limits);
        for line in lines {
            cart.add(&line.product_id, line.variant_id.as_deref(), line.quantity)?;
        }

        Ok(cart)
    }

    /// Adds a line or increases the quantity of the matching one.
    pub fn add(&mut self, product_id: &str, variant_id: Option<&str>, quantity: i64) -> CoreResult<()> {
        if product_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "product_id".to_string(),
            }
            .into());
        }
        if quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let limits = self.limits;

        if let Some(line) = self
            .lines
            .iter_mut()
            .find(|l| l.same_item(product_id, variant_id))
        {
            let merged = line.quantity.saturating_add(quantity);
            if merged > limits.max_line_quantity {
                return Err(CoreError::QuantityTooLarge {
                    requested: merged,
                    max: limits.max_line_quantity,
                });
            }
            line.quantity = merged;
            return Ok(());
        }

        if quantity > limits.max_line_quantity {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: limits.max_line_quantity,
            });
        }

        if self.lines.len() >= limits.max_lines {
            return Err(CoreError::CartTooLarge {
                max: limits.max_lines,
            });
        }

        self.lines.push(CartLine::new(product_id, variant_id, quantity));
        Ok(())
    }

    /// Sets the quantity of an existing line; zero removes it.
    pub fn update_quantity(
        &mut self,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove(product_id, variant_id);
        }
        if quantity < 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }

        let max = self.limits.max_line_quantity;
        if quantity > max {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max,
            });
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.same_item(product_id, variant_id))
        {
            Some(line) => {
                line.quantity = quantity;
                Ok(())
            }
            None => Err(CoreError::ProductNotFound(product_id.to_string())),
        }
    }

    /// Removes a line.
    pub fn remove(&mut self, product_id: &str, variant_id: Option<&str>) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| !l.same_item(product_id, variant_id));

        if self.lines.len() == before {
            Err(CoreError::ProductNotFound(product_id.to_string()))
        } else {
            Ok(())
        }
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<CartLine> {
        self.lines
    }
}
