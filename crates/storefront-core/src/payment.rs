//! # Payments
//!
//! Payment methods, money movements and the gateway callback contract.
//!
//! ## Transaction Ownership
//! ```text
//! Transactionable (closed sum type)
//! ├── Purchase(id)   stock bought from a supplier
//! ├── Sell(id)       customer order
//! └── Expense(id)    shop expense
//! ```
//! Stored as `(transactionable_type, transactionable_id)` where the type
//! column only accepts the three variants.
//!
//! ## Reconciliation
//! ```text
//! succeeded payments ─┐
//!                     ├─► net_paid ─► Order::apply_payments ─► total_due, payment_status
//! succeeded refunds ──┘
//! pending / failed rows are ignored
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation::validate_payment_amount;

// =============================================================================
// Payment Method
// =============================================================================

/// A configured gateway (PayPal, Orange Money, Wave, cash on delivery, ...).
///
/// Only the data contract lives here; gateway integrations report back
/// through [`GatewayCallback`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethod {
    pub id: String,
    /// Stable identifier, e.g. "orange_money".
    pub code: String,
    pub name: String,
    pub is_active: bool,
    pub sort_order: i64,
}

impl PaymentMethod {
    pub fn ensure_available(&self) -> CoreResult<()> {
        if !self.is_active {
            return Err(CoreError::PaymentMethodUnavailable(self.id.clone()));
        }
        Ok(())
    }
}

// =============================================================================
// Transactionable
// =============================================================================

/// Discriminant of [`Transactionable`] as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionableKind {
    Purchase,
    Sell,
    Expense,
}

/// Owner of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Transactionable {
    Purchase(String),
    Sell(String),
    Expense(String),
}

impl Transactionable {
    pub fn from_parts(kind: TransactionableKind, id: String) -> Self {
        match kind {
            TransactionableKind::Purchase => Transactionable::Purchase(id),
            TransactionableKind::Sell => Transactionable::Sell(id),
            TransactionableKind::Expense => Transactionable::Expense(id),
        }
    }

    pub fn kind(&self) -> TransactionableKind {
        match self {
            Transactionable::Purchase(_) => TransactionableKind::Purchase,
            Transactionable::Sell(_) => TransactionableKind::Sell,
            Transactionable::Expense(_) => TransactionableKind::Expense,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Transactionable::Purchase(id)
            | Transactionable::Sell(id)
            | Transactionable::Expense(id) => id,
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Payment,
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Succeeded,
    Failed,
}

/// A money movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Transaction {
    pub id: String,
    pub transactionable_type: TransactionableKind,
    pub transactionable_id: String,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    /// Always positive; `kind` carries the direction.
    pub amount: i64,
    pub currency_code: String,
    pub payment_method_id: Option<String>,
    /// Id assigned by the gateway; unique when present.
    pub gateway_transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn owner(&self) -> Transactionable {
        Transactionable::from_parts(self.transactionable_type, self.transactionable_id.clone())
    }

    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount)
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == TransactionStatus::Succeeded
    }
}

// =============================================================================
// Gateway Contract
// =============================================================================

/// Result reported by a gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GatewayOutcome {
    Succeeded,
    Failed { reason: String },
}

/// What a gateway integration hands back after a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GatewayCallback {
    pub gateway_transaction_id: String,
    pub amount: i64,
    pub currency_code: String,
    pub outcome: GatewayOutcome,
}

impl GatewayCallback {
    /// Checks the callback against the order it pays for.
    pub fn validate_for(&self, order_currency: &str) -> CoreResult<()> {
        if self.gateway_transaction_id.trim().is_empty() {
            return Err(crate::error::ValidationError::Required {
                field: "gateway_transaction_id".to_string(),
            }
            .into());
        }

        validate_payment_amount(self.amount).map_err(|e| CoreError::InvalidPaymentAmount {
            reason: e.to_string(),
        })?;

        if !self.currency_code.eq_ignore_ascii_case(order_currency) {
            return Err(CoreError::CurrencyMismatch {
                expected: order_currency.to_string(),
                actual: self.currency_code.clone(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Totals of the succeeded transactions of one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSummary {
    pub paid: Money,
    pub refunded: Money,
    /// `paid - refunded`.
    pub net_paid: Money,
    /// At least one succeeded refund exists.
    pub has_refund: bool,
}

/// Folds succeeded transactions into a summary.
///
/// Fails when either running total leaves `0..=MAX_MONEY`.
///
/// ```rust
/// use storefront_core::payment::summarize_payments;
///
/// let summary = summarize_payments(&[]).unwrap();
/// assert!(summary.net_paid.is_zero());
/// assert!(!summary.has_refund);
/// ```
pub fn summarize_payments(transactions: &[Transaction]) -> CoreResult<PaymentSummary> {
    let mut summary = PaymentSummary::default();

    for tx in transactions.iter().filter(|t| t.is_succeeded()) {
        match tx.kind {
            TransactionKind::Payment => {
                summary.paid = summary.paid.bounded_add(tx.amount(), "total_paid")?;
            }
            TransactionKind::Refund => {
                summary.refunded = summary.refunded.bounded_add(tx.amount(), "total_refunded")?;
                summary.has_refund = true;
            }
        }
    }

    summary.net_paid = summary.paid - summary.refunded;
    Ok(summary)
}

/// Validates a refund against what has been collected so far.
pub fn validate_refund(summary: &PaymentSummary, amount: Money) -> CoreResult<()> {
    validate_payment_amount(amount.minor()).map_err(|e| CoreError::InvalidPaymentAmount {
        reason: e.to_string(),
    })?;

    if amount > summary.net_paid {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!(
                "refund of {} exceeds net paid {}",
                amount.minor(),
                summary.net_paid.minor()
            ),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
