//! # Checkout Service
//!
//! Places orders and records their payments. Every public operation runs
//! in exactly one database transaction.
//!
//! ## Place Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    ├── allocate order number        (takes the write lock)              │
//! │    ├── load tax rules, methods, catalog snapshot                        │
//! │    ├── build_quote                  (all validation, no writes)         │
//! │    ├── guarded stock decrement × n  (0 rows → InsufficientStock)        │
//! │    ├── INSERT order, details, address                                   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: no order, no stock     │
//! │  change, no consumed order number.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Payments
//! Gateway callbacks and refunds append a Transaction row, then re-derive
//! `total_paid`, `total_due` and `payment_status` from all of the order's
//! transactions. Replaying a callback with a known gateway transaction id
//! changes nothing.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use storefront_core::checkout::QuoteContext;
use storefront_core::payment::{summarize_payments, validate_refund};
use storefront_core::{
    build_quote, CheckoutQuote, CheckoutRequest, CoreError, GatewayCallback, GatewayOutcome,
    Money, Order, OrderDetail, OrderStatus, OrderWithDetails, PaymentSummary, ShippingAddress,
    ShippingStatus, StoreSettings, TransactionKind, TransactionStatus, Transactionable,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::catalog::{decrement_stock, load_snapshot};
use crate::repository::order::{
    fetch_order, fetch_order_with_details, insert_details, insert_order, insert_shipping_address,
    lock_order, next_order_number, update_payment_fields, update_statuses,
};
use crate::repository::payment_method::fetch_payment_method;
use crate::repository::shipping::fetch_shipping_method;
use crate::repository::tax_rule;
use crate::repository::transaction::{
    fetch_by_gateway_id, insert_transaction, list_for, new_transaction,
};

/// Checkout and payment recording against one set of store settings.
///
/// ## Usage
/// ```rust,ignore
/// let checkout = db.checkout(settings.clone());
///
/// let placed = checkout.place_order(&request).await?;
/// let order = checkout
///     .record_gateway_callback(&placed.order.id, &callback)
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct CheckoutService {
    pool: SqlitePool,
    settings: Arc<StoreSettings>,
}

impl CheckoutService {
    pub fn new(pool: SqlitePool, settings: Arc<StoreSettings>) -> Self {
        CheckoutService { pool, settings }
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Prices a request against current data without writing anything.
    pub async fn quote(&self, request: &CheckoutRequest) -> DbResult<CheckoutQuote> {
        let mut conn = self.pool.acquire().await?;
        quote_in(&mut conn, &self.settings, request).await
    }

    /// Validates, prices and persists an order atomically.
    ///
    /// ## Returns
    /// * `Ok(OrderWithDetails)` - The committed order, lines and address
    /// * `Err(DbError::Rejected(_))` - A business rule refused the checkout;
    ///   nothing was written
    pub async fn place_order(&self, request: &CheckoutRequest) -> DbResult<OrderWithDetails> {
        let mut tx = self.pool.begin().await?;

        let placed = match self.write_order(&mut tx, request).await {
            Ok(placed) => placed,
            Err(err) => {
                if let Some(rejection) = err.rejection() {
                    warn!(
                        code = rejection.code(),
                        reason = %rejection,
                        country_code = %request.country_code,
                        lines = request.lines.len(),
                        "Checkout rejected"
                    );
                }
                // Dropping `tx` rolls back.
                return Err(err);
            }
        };

        tx.commit().await?;

        info!(
            order_id = %placed.order.id,
            order_number = %placed.order.order_number,
            country_code = %placed.order.country_code,
            grand_total = placed.order.grand_total().minor(),
            lines = placed.details.len(),
            "Order placed"
        );
        Ok(placed)
    }

    async fn write_order(
        &self,
        conn: &mut SqliteConnection,
        request: &CheckoutRequest,
    ) -> DbResult<OrderWithDetails> {
        let now = Utc::now();

        // First statement is a write so concurrent checkouts queue on the
        // database lock instead of failing a read-to-write upgrade.
        let order_number =
            next_order_number(&mut *conn, &self.settings.order_number_prefix, now).await?;

        let quote = quote_in(&mut *conn, &self.settings, request).await?;

        for line in &quote.lines {
            decrement_stock(
                &mut *conn,
                &line.price.product_id,
                line.price.variant_id.as_deref(),
                &line.price.sku,
                line.price.quantity,
            )
            .await?;
        }

        let placed = order_from_quote(&quote, request, order_number, now);

        insert_order(&mut *conn, &placed.order).await?;
        insert_details(&mut *conn, &placed.details).await?;
        if let Some(address) = &placed.shipping_address {
            insert_shipping_address(&mut *conn, address).await?;
        }

        Ok(placed)
    }

    /// Records the outcome of a gateway payment attempt.
    ///
    /// ## Behavior
    /// - `Succeeded`: a succeeded payment row is added and the order's
    ///   paid / due / status are re-derived
    /// - `Failed`: a failed row is added, the order's payment state does not
    ///   change, and `PaymentGatewayFailure` is returned so the caller can
    ///   offer a retry
    /// - Known `gateway_transaction_id`: nothing is written
    pub async fn record_gateway_callback(
        &self,
        order_id: &str,
        callback: &GatewayCallback,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = load_order(&mut tx, order_id).await?;
        callback.validate_for(&order.currency_code)?;

        let gateway = fetch_payment_method(&mut *tx, &order.payment_method_id)
            .await?
            .map(|m| m.code)
            .unwrap_or_else(|| order.payment_method_id.clone());

        if let Some(existing) = fetch_by_gateway_id(&mut *tx, &callback.gateway_transaction_id).await? {
            if existing.owner() != Transactionable::Sell(order.id.clone()) {
                return Err(DbError::duplicate(
                    "gateway_transaction_id",
                    &callback.gateway_transaction_id,
                ));
            }

            info!(
                order_id = %order.id,
                gateway_transaction_id = %callback.gateway_transaction_id,
                "Gateway callback already recorded"
            );
            return match existing.failure_reason {
                Some(reason) if existing.status == TransactionStatus::Failed => {
                    Err(CoreError::PaymentGatewayFailure { gateway, reason }.into())
                }
                _ => Ok(order),
            };
        }

        let owner = Transactionable::Sell(order.id.clone());
        let (status, failure_reason) = match &callback.outcome {
            GatewayOutcome::Succeeded => (TransactionStatus::Succeeded, None),
            GatewayOutcome::Failed { reason } => (TransactionStatus::Failed, Some(reason.clone())),
        };

        let mut transaction = new_transaction(
            &owner,
            TransactionKind::Payment,
            status,
            callback.amount,
            &order.currency_code,
        );
        transaction.payment_method_id = Some(order.payment_method_id.clone());
        transaction.gateway_transaction_id = Some(callback.gateway_transaction_id.clone());
        transaction.failure_reason = failure_reason.clone();

        insert_transaction(&mut *tx, &transaction).await?;
        let summary = reconcile(&mut tx, &mut order).await?;

        tx.commit().await?;

        match failure_reason {
            Some(reason) => {
                warn!(
                    order_id = %order.id,
                    gateway = %gateway,
                    gateway_transaction_id = %callback.gateway_transaction_id,
                    reason = %reason,
                    "Gateway reported a failed payment"
                );
                Err(CoreError::PaymentGatewayFailure { gateway, reason }.into())
            }
            None => {
                info!(
                    order_id = %order.id,
                    gateway = %gateway,
                    amount = callback.amount,
                    net_paid = summary.net_paid.minor(),
                    payment_status = %order.payment_status,
                    "Payment recorded"
                );
                Ok(order)
            }
        }
    }

    /// Refunds part or all of what the order has collected.
    pub async fn record_refund(
        &self,
        order_id: &str,
        amount: i64,
        gateway_transaction_id: Option<&str>,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = load_order(&mut tx, order_id).await?;
        let owner = Transactionable::Sell(order.id.clone());

        let summary = summarize_payments(&list_for(&mut *tx, &owner).await?)?;
        validate_refund(&summary, Money::from_minor(amount))?;

        let mut refund = new_transaction(
            &owner,
            TransactionKind::Refund,
            TransactionStatus::Succeeded,
            amount,
            &order.currency_code,
        );
        refund.payment_method_id = Some(order.payment_method_id.clone());
        refund.gateway_transaction_id = gateway_transaction_id.map(str::to_string);

        insert_transaction(&mut *tx, &refund).await?;
        let summary = reconcile(&mut tx, &mut order).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            amount,
            refunded = summary.refunded.minor(),
            net_paid = summary.net_paid.minor(),
            "Refund recorded"
        );
        Ok(order)
    }

    /// Re-derives paid / due / payment status from the transaction log.
    ///
    /// Idempotent: running it again on an unchanged log changes nothing.
    pub async fn reconcile_payments(&self, order_id: &str) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = load_order(&mut tx, order_id).await?;
        reconcile(&mut tx, &mut order).await?;

        tx.commit().await?;
        Ok(order)
    }

    /// Moves the order along the order-status machine.
    pub async fn update_order_status(&self, order_id: &str, next: OrderStatus) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = load_order(&mut tx, order_id).await?;
        let from = order.order_status;
        order.transition_order_status(next)?;
        order.updated_at = Utc::now();
        update_statuses(&mut *tx, &order).await?;

        tx.commit().await?;

        info!(order_id = %order.id, from = %from, to = %next, "Order status changed");
        Ok(order)
    }

    /// Moves the order along the shipping-status machine.
    pub async fn update_shipping_status(
        &self,
        order_id: &str,
        next: ShippingStatus,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let mut order = load_order(&mut tx, order_id).await?;
        let from = order.shipping_status;
        order.transition_shipping_status(next)?;
        order.updated_at = Utc::now();
        update_statuses(&mut *tx, &order).await?;

        tx.commit().await?;

        info!(order_id = %order.id, from = %from, to = %next, "Shipping status changed");
        Ok(order)
    }

    /// Reads an order back with its frozen lines and address.
    pub async fn get_order(&self, order_id: &str) -> DbResult<OrderWithDetails> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_with_details(&mut conn, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn quote_in(
    conn: &mut SqliteConnection,
    settings: &StoreSettings,
    request: &CheckoutRequest,
) -> DbResult<CheckoutQuote> {
    let tax_rules = tax_rule::list_all(&mut *conn).await?;

    let shipping_method = fetch_shipping_method(&mut *conn, &request.shipping_method_id)
        .await?
        .ok_or_else(|| CoreError::ShippingMethodUnavailable(request.shipping_method_id.clone()))?;

    let payment_method = fetch_payment_method(&mut *conn, &request.payment_method_id)
        .await?
        .ok_or_else(|| CoreError::PaymentMethodUnavailable(request.payment_method_id.clone()))?;

    let catalog = load_snapshot(&mut *conn, &request.lines).await?;

    let ctx = QuoteContext {
        settings,
        tax_rules: &tax_rules,
        shipping_method: &shipping_method,
        payment_method: &payment_method,
    };

    let quote = build_quote(request, &catalog, &ctx)?;

    debug!(
        country_code = %quote.country_code,
        vat_rate_bps = quote.tax.rate.bps(),
        tax_source = ?quote.tax.source,
        grand_total = quote.grand_total().minor(),
        "Checkout quoted"
    );
    Ok(quote)
}

/// Locks then loads an order. Must be the first call in its transaction.
async fn load_order(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Order> {
    if !lock_order(&mut *conn, order_id).await? {
        return Err(CoreError::OrderNotFound(order_id.to_string()).into());
    }

    fetch_order(&mut *conn, order_id)
        .await?
        .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
}

async fn reconcile(conn: &mut SqliteConnection, order: &mut Order) -> DbResult<PaymentSummary> {
    let owner = Transactionable::Sell(order.id.clone());
    let summary = summarize_payments(&list_for(&mut *conn, &owner).await?)?;

    order.apply_payments(&summary);
    order.updated_at = Utc::now();
    update_payment_fields(&mut *conn, order).await?;

    Ok(summary)
}

/// Freezes a quote into the rows checkout inserts.
fn order_from_quote(
    quote: &CheckoutQuote,
    request: &CheckoutRequest,
    order_number: String,
    now: DateTime<Utc>,
) -> OrderWithDetails {
    let order_id = Uuid::new_v4().to_string();

    let mut order = Order {
        id: order_id.clone(),
        order_number,
        country_code: quote.country_code.clone(),
        currency_code: quote.currency_code.clone(),
        vat_rate_bps: quote.tax.rate.bps(),
        total_payable_amount: quote.totals.total_payable_amount.minor(),
        total_discount: quote.totals.total_discount.minor(),
        total_vat_amount: quote.totals.total_vat_amount.minor(),
        shipping_cost: quote.totals.shipping_cost.minor(),
        total_paid: 0,
        total_due: 0,
        shipping_method_id: request.shipping_method_id.clone(),
        payment_method_id: request.payment_method_id.clone(),
        order_status: OrderStatus::Pending,
        shipping_status: ShippingStatus::Pending,
        payment_status: Default::default(),
        customer_note: quote.customer_note.clone(),
        created_at: now,
        updated_at: now,
    };
    order.apply_payments(&PaymentSummary::default());

    let details = quote
        .lines
        .iter()
        .map(|line| OrderDetail {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.clone(),
            product_id: line.price.product_id.clone(),
            variant_id: line.price.variant_id.clone(),
            sku: line.price.sku.clone(),
            name: line.price.name.clone(),
            unit_price: line.price.unit_price.minor(),
            unit_discount: line.price.unit_discount.minor(),
            unit_vat: line.unit_vat.minor(),
            quantity: line.price.quantity,
            line_subtotal: line.price.line_subtotal.minor(),
            line_discount: line.price.line_discount.minor(),
            line_vat: line.line_vat.minor(),
        })
        .collect();

    let shipping_address = quote.shipping_address.as_ref().map(|input| ShippingAddress {
        id: Uuid::new_v4().to_string(),
        order_id: order_id.clone(),
        recipient_name: input.recipient_name.trim().to_string(),
        phone: input.phone.trim().to_string(),
        address_line: input.address_line.trim().to_string(),
        city: input.city.trim().to_string(),
        postal_code: input.postal_code.clone(),
        country_code: input
            .country_code
            .clone()
            .unwrap_or_else(|| quote.country_code.clone()),
    });

    OrderWithDetails {
        order,
        details,
        shipping_address,
    }
}
