//! # Orders
//!
//! The order aggregate, its snapshotted lines and its three status machines.
//!
//! ## Aggregate
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order (aggregate root)                                                 │
//! │  ├── total_payable_amount   Σ discounted line subtotals (authoritative) │
//! │  ├── total_discount         Σ line discounts (reporting)                │
//! │  ├── total_vat_amount       Σ per-line VAT                              │
//! │  ├── shipping_cost                                                      │
//! │  ├── total_paid / total_due                                             │
//! │  ├── OrderDetail × 1..n     frozen sku, name, unit price, VAT, qty      │
//! │  └── ShippingAddress × 0..1                                             │
//! │                                                                         │
//! │  grand_total() = payable + vat + shipping     (derived, never stored)   │
//! │  total_due     = grand_total() - total_paid   (negative = overpaid)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Machines
//! ```text
//! order_status:    pending ─► processing ─► on_the_way ─► order_completed
//!                     │            │             │
//!                     └────────────┴─────────────┴─► cancel_request
//!                                                        │
//!                                                        ▼
//!                                  cancel_accepted ─► cancel_order_process_completed
//!
//! shipping_status: pending ─► in_progress ─► delivered
//!                     └────────────┴─► cancelled
//!
//! payment_status:  derived from succeeded transactions
//!                  unpaid │ partial │ paid │ refunded
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::payment::PaymentSummary;
use crate::tax::TaxRate;

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    OnTheWay,
    OrderCompleted,
    CancelRequest,
    CancelAccepted,
    CancelOrderProcessCompleted,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::OrderCompleted => "order_completed",
            OrderStatus::CancelRequest => "cancel_request",
            OrderStatus::CancelAccepted => "cancel_accepted",
            OrderStatus::CancelOrderProcessCompleted => "cancel_order_process_completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::OrderCompleted | OrderStatus::CancelOrderProcessCompleted
        )
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            OrderStatus::CancelRequest
                | OrderStatus::CancelAccepted
                | OrderStatus::CancelOrderProcessCompleted
        )
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (Pending, Processing) | (Processing, OnTheWay) | (OnTheWay, OrderCompleted) => true,
            (CancelRequest, CancelAccepted) | (CancelAccepted, CancelOrderProcessCompleted) => true,
            (from, CancelRequest) => !from.is_terminal() && !from.is_cancellation(),
            _ => false,
        }
    }

    /// Returns `next` if the machine allows it.
    pub fn transition(self, next: OrderStatus) -> CoreResult<OrderStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                machine: "order_status",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Shipping Status
// =============================================================================

/// Delivery state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    #[default]
    Pending,
    InProgress,
    Delivered,
    Cancelled,
}

impl ShippingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShippingStatus::Pending => "pending",
            ShippingStatus::InProgress => "in_progress",
            ShippingStatus::Delivered => "delivered",
            ShippingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ShippingStatus::Delivered | ShippingStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: ShippingStatus) -> bool {
        use ShippingStatus::*;
        match (self, next) {
            (Pending, InProgress) | (InProgress, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn transition(self, next: ShippingStatus) -> CoreResult<ShippingStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStatusTransition {
                machine: "shipping_status",
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Status
// =============================================================================

/// Payment state, always derived from the order's transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Partial,
    Paid,
    Refunded,
}

impl PaymentStatus {
    /// ```text
    /// refund recorded      → refunded
    /// paid ≤ 0             → unpaid
    /// 0 < paid < grand     → partial
    /// paid ≥ grand         → paid
    /// ```
    pub fn derive(summary: &PaymentSummary, grand_total: Money) -> PaymentStatus {
        if summary.has_refund {
            PaymentStatus::Refunded
        } else if !summary.net_paid.is_positive() {
            PaymentStatus::Unpaid
        } else if summary.net_paid < grand_total {
            PaymentStatus::Partial
        } else {
            PaymentStatus::Paid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Partial => "partial",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order. Totals are snapshots taken at checkout.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Order {
    pub id: String,

    /// Human-readable number, e.g. "S-20260131-0001".
    pub order_number: String,

    /// Destination country, upper case.
    pub country_code: String,

    pub currency_code: String,

    /// VAT rate applied, in basis points.
    pub vat_rate_bps: u32,

    pub total_payable_amount: i64,
    pub total_discount: i64,
    pub total_vat_amount: i64,
    pub shipping_cost: i64,
    pub total_paid: i64,
    pub total_due: i64,

    pub shipping_method_id: String,
    pub payment_method_id: String,

    pub order_status: OrderStatus,
    pub shipping_status: ShippingStatus,
    pub payment_status: PaymentStatus,

    pub customer_note: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn vat_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.vat_rate_bps)
    }

    #[inline]
    pub fn total_payable(&self) -> Money {
        Money::from_minor(self.total_payable_amount)
    }

    #[inline]
    pub fn total_paid(&self) -> Money {
        Money::from_minor(self.total_paid)
    }

    #[inline]
    pub fn total_due(&self) -> Money {
        Money::from_minor(self.total_due)
    }

    /// `total_payable_amount + total_vat_amount + shipping_cost`.
    pub fn grand_total(&self) -> Money {
        Money::from_minor(self.total_payable_amount)
            + Money::from_minor(self.total_vat_amount)
            + Money::from_minor(self.shipping_cost)
    }

    /// True when more was paid than owed.
    pub fn is_overpaid(&self) -> bool {
        self.total_due < 0
    }

    /// Reconciles paid/due/payment status against a payment summary.
    ///
    /// Idempotent: applying the same summary twice leaves the order
    /// unchanged.
    pub fn apply_payments(&mut self, summary: &PaymentSummary) {
        let grand_total = self.grand_total();
        self.total_paid = summary.net_paid.minor();
        self.total_due = (grand_total - summary.net_paid).minor();
        self.payment_status = PaymentStatus::derive(summary, grand_total);
    }

    pub fn transition_order_status(&mut self, next: OrderStatus) -> CoreResult<()> {
        self.order_status = self.order_status.transition(next)?;
        Ok(())
    }

    pub fn transition_shipping_status(&mut self, next: ShippingStatus) -> CoreResult<()> {
        self.shipping_status = self.shipping_status.transition(next)?;
        Ok(())
    }
}

// =============================================================================
// Order Detail
// =============================================================================

/// One line of an order, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OrderDetail {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub sku: String,
    pub name: String,
    /// Price after discount.
    pub unit_price: i64,
    pub unit_discount: i64,
    pub unit_vat: i64,
    pub quantity: i64,
    pub line_subtotal: i64,
    pub line_discount: i64,
    pub line_vat: i64,
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Delivery address captured at checkout; at most one per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShippingAddress {
    pub id: String,
    pub order_id: String,
    pub recipient_name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub country_code: String,
}

/// An order with its lines and address.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderWithDetails {
    pub order: Order,
    pub details: Vec<OrderDetail>,
    pub shipping_address: Option<ShippingAddress>,
}

impl OrderWithDetails {
    /// Σ line subtotals; equals `order.total_payable_amount` for any order
    /// built by checkout.
    pub fn details_subtotal(&self) -> Money {
        self.details
            .iter()
            .map(|d| Money::from_minor(d.line_subtotal))
            .sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn order(payable: i64, vat: i64, shipping: i64) -> Order {
        Order {
            id: "o-1".to_string(),
            order_number: "S-20260131-0001".to_string(),
            country_code: "SN".to_string(),
            currency_code: "XOF".to_string(),
            vat_rate_bps: 1800,
            total_payable_amount: payable,
            total_discount: 0,
            total_vat_amount: vat,
            shipping_cost: shipping,
            total_paid: 0,
            total_due: payable + vat + shipping,
            shipping_method_id: "ship-1".to_string(),
            payment_method_id: "pm-1".to_string(),
            order_status: OrderStatus::Pending,
            shipping_status: ShippingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            customer_note: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn paid(net: i64, has_refund: bool) -> PaymentSummary {
        PaymentSummary {
            paid: Money::from_minor(net.max(0)),
            refunded: Money::zero(),
            net_paid: Money::from_minor(net),
            has_refund,
        }
    }

    #[test]
    fn test_grand_total_and_due() {
        let mut o = order(10_000, 1_800, 2_500);
        assert_eq!(o.grand_total().minor(), 14_300);

        o.apply_payments(&paid(4_300, false));
        assert_eq!(o.total_due, 10_000);
        assert_eq!(o.payment_status, PaymentStatus::Partial);
    }

    #[test]
    fn test_apply_payments_is_idempotent() {
        let mut o = order(10_000, 1_800, 0);
        let summary = paid(11_800, false);

        o.apply_payments(&summary);
        let first = (o.total_paid, o.total_due, o.payment_status);
        o.apply_payments(&summary);
        assert_eq!(first, (o.total_paid, o.total_due, o.payment_status));
        assert_eq!(o.payment_status, PaymentStatus::Paid);
        assert_eq!(o.total_due, 0);
    }

    #[test]
    fn test_overpayment_is_kept() {
        let mut o = order(1_000, 0, 0);
        o.apply_payments(&paid(1_500, false));
        assert_eq!(o.total_due, -500);
        assert!(o.is_overpaid());
        assert_eq!(o.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_payment_status_derivation() {
        let grand = Money::from_minor(1_000);
        assert_eq!(PaymentStatus::derive(&paid(0, false), grand), PaymentStatus::Unpaid);
        assert_eq!(PaymentStatus::derive(&paid(999, false), grand), PaymentStatus::Partial);
        assert_eq!(PaymentStatus::derive(&paid(1_000, false), grand), PaymentStatus::Paid);
        assert_eq!(PaymentStatus::derive(&paid(0, true), grand), PaymentStatus::Refunded);
    }

    #[test]
    fn test_order_status_happy_path() {
        let mut o = order(1_000, 0, 0);
        o.transition_order_status(OrderStatus::Processing).unwrap();
        o.transition_order_status(OrderStatus::OnTheWay).unwrap();
        o.transition_order_status(OrderStatus::OrderCompleted).unwrap();
        assert!(o.order_status.is_terminal());
        assert!(o.transition_order_status(OrderStatus::CancelRequest).is_err());
    }

    #[test]
    fn test_order_status_cancellation_path() {
        let s = OrderStatus::Processing;
        let s = s.transition(OrderStatus::CancelRequest).unwrap();
        let s = s.transition(OrderStatus::CancelAccepted).unwrap();
        let s = s.transition(OrderStatus::CancelOrderProcessCompleted).unwrap();
        assert!(s.is_terminal());
    }

    #[test]
    fn test_order_status_rejects_skips() {
        let err = OrderStatus::Pending
            .transition(OrderStatus::OrderCompleted)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidStatusTransition { .. }));
        assert_eq!(
            err.to_string(),
            "order_status cannot move from pending to order_completed"
        );
        assert!(OrderStatus::CancelRequest
            .transition(OrderStatus::CancelRequest)
            .is_err());
        assert!(OrderStatus::Pending
            .transition(OrderStatus::CancelAccepted)
            .is_err());
    }

    #[test]
    fn test_shipping_status_machine() {
        assert!(ShippingStatus::Pending.can_transition_to(ShippingStatus::InProgress));
        assert!(ShippingStatus::InProgress.can_transition_to(ShippingStatus::Delivered));
        assert!(ShippingStatus::Pending.can_transition_to(ShippingStatus::Cancelled));
        assert!(ShippingStatus::InProgress.can_transition_to(ShippingStatus::Cancelled));

        assert!(!ShippingStatus::Pending.can_transition_to(ShippingStatus::Delivered));
        assert!(!ShippingStatus::Delivered.can_transition_to(ShippingStatus::Cancelled));
        assert!(!ShippingStatus::Cancelled.can_transition_to(ShippingStatus::Cancelled));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::OnTheWay).unwrap(),
            "\"on_the_way\""
        );
        assert_eq!(
            serde_json::to_string(&ShippingStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Partial).unwrap(),
            "\"partial\""
        );
    }
}
