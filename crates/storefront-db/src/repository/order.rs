//! # Order Repository
//!
//! Orders, their snapshotted lines and shipping addresses.
//!
//! Orders are written only by the checkout service, inside its transaction.
//! This repository exposes the read side plus the executor-generic helpers
//! that transaction uses.
//!
//! ## Order Numbers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  order_number_counters                                                 │
//! │  ┌────────────┬──────────┐                                             │
//! │  │ day        │ last_seq │    UPSERT … RETURNING last_seq              │
//! │  ├────────────┼──────────┤         │                                   │
//! │  │ 20260131   │ 41       │ ──────► S-20260131-0042                     │
//! │  └────────────┴──────────┘                                             │
//! │                                                                         │
//! │  The counter row is bumped inside the checkout transaction, so a       │
//! │  rolled-back checkout gives its number back.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use storefront_core::validation::validate_uuid;
use storefront_core::{Order, OrderDetail, OrderWithDetails, ShippingAddress};
use tracing::debug;

use crate::error::DbResult;

const ORDER_SELECT: &str = r#"
    SELECT id, order_number, country_code, currency_code, vat_rate_bps,
           total_payable_amount, total_discount, total_vat_amount, shipping_cost,
           total_paid, total_due, shipping_method_id, payment_method_id,
           order_status, shipping_status, payment_status, customer_note,
           created_at, updated_at
    FROM orders
"#;

const DETAIL_SELECT: &str = r#"
    SELECT id, order_id, product_id, variant_id, sku, name, unit_price,
           unit_discount, unit_vat, quantity, line_subtotal, line_discount, line_vat
    FROM order_details
"#;

const ADDRESS_SELECT: &str = r#"
    SELECT id, order_id, recipient_name, phone, address_line, city,
           postal_code, country_code
    FROM shipping_addresses
"#;

/// Read access to placed orders.
///
/// ## Usage
/// ```rust,ignore
/// let order = db.orders().get_with_details(&order_id).await?;
/// assert_eq!(order.details_subtotal(), order.order.total_payable());
/// ```
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order header by id.
    ///
    /// Malformed ids are rejected before touching the database.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        validate_uuid(id)?;
        fetch_order(&self.pool, id).await
    }

    pub async fn get_by_number(&self, order_number: &str) -> DbResult<Option<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE order_number = ?1");
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Gets an order with its lines (in checkout order) and address.
    pub async fn get_with_details(&self, id: &str) -> DbResult<Option<OrderWithDetails>> {
        validate_uuid(id)?;

        let mut conn = self.pool.acquire().await?;
        fetch_order_with_details(&mut conn, id).await
    }

    pub async fn get_details(&self, order_id: &str) -> DbResult<Vec<OrderDetail>> {
        fetch_details(&self.pool, order_id).await
    }

    /// Most recent orders first.
    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<Order>> {
        let sql = format!("{ORDER_SELECT} ORDER BY created_at DESC, order_number DESC LIMIT ?1");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        debug!(count = orders.len(), "Listed recent orders");
        Ok(orders)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Executor-generic helpers
// =============================================================================

pub(crate) async fn fetch_order<'e, E>(executor: E, id: &str) -> DbResult<Option<Order>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{ORDER_SELECT} WHERE id = ?1");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(order)
}

/// No-op write on the order row. As the first statement of a transaction
/// it takes SQLite's write lock before any payment state is read.
///
/// Returns `false` when the order does not exist.
pub(crate) async fn lock_order<'e, E>(executor: E, id: &str) -> DbResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("UPDATE orders SET updated_at = updated_at WHERE id = ?1")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn fetch_details<'e, E>(executor: E, order_id: &str) -> DbResult<Vec<OrderDetail>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{DETAIL_SELECT} WHERE order_id = ?1 ORDER BY position");
    let details = sqlx::query_as::<_, OrderDetail>(&sql)
        .bind(order_id)
        .fetch_all(executor)
        .await?;

    Ok(details)
}

pub(crate) async fn fetch_order_with_details(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<OrderWithDetails>> {
    let Some(order) = fetch_order(&mut *conn, id).await? else {
        return Ok(None);
    };

    let details = fetch_details(&mut *conn, id).await?;

    let sql = format!("{ADDRESS_SELECT} WHERE order_id = ?1");
    let shipping_address = sqlx::query_as::<_, ShippingAddress>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(Some(OrderWithDetails {
        order,
        details,
        shipping_address,
    }))
}

/// Allocates the next order number for `now`'s day.
pub(crate) async fn next_order_number(
    conn: &mut SqliteConnection,
    prefix: &str,
    now: DateTime<Utc>,
) -> DbResult<String> {
    let day = now.format("%Y%m%d").to_string();

    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO order_number_counters (day, last_seq) VALUES (?1, 1)
        ON CONFLICT(day) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(&day)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format_order_number(prefix, &day, seq))
}

fn format_order_number(prefix: &str, day: &str, seq: i64) -> String {
    format!("{}-{}-{:04}", prefix, day, seq)
}

pub(crate) async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(order_number = %order.order_number, "Inserting order");

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, order_number, country_code, currency_code, vat_rate_bps,
            total_payable_amount, total_discount, total_vat_amount, shipping_cost,
            total_paid, total_due, shipping_method_id, payment_method_id,
            order_status, shipping_status, payment_status, customer_note,
            created_at, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
            ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19
        )
        "#,
    )
    .bind(&order.id)
    .bind(&order.order_number)
    .bind(&order.country_code)
    .bind(&order.currency_code)
    .bind(order.vat_rate_bps)
    .bind(order.total_payable_amount)
    .bind(order.total_discount)
    .bind(order.total_vat_amount)
    .bind(order.shipping_cost)
    .bind(order.total_paid)
    .bind(order.total_due)
    .bind(&order.shipping_method_id)
    .bind(&order.payment_method_id)
    .bind(order.order_status)
    .bind(order.shipping_status)
    .bind(order.payment_status)
    .bind(&order.customer_note)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn insert_details(
    conn: &mut SqliteConnection,
    details: &[OrderDetail],
) -> DbResult<()> {
    for (position, detail) in details.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO order_details (
                id, order_id, product_id, variant_id, sku, name, unit_price,
                unit_discount, unit_vat, quantity, line_subtotal, line_discount,
                line_vat, position
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&detail.id)
        .bind(&detail.order_id)
        .bind(&detail.product_id)
        .bind(&detail.variant_id)
        .bind(&detail.sku)
        .bind(&detail.name)
        .bind(detail.unit_price)
        .bind(detail.unit_discount)
        .bind(detail.unit_vat)
        .bind(detail.quantity)
        .bind(detail.line_subtotal)
        .bind(detail.line_discount)
        .bind(detail.line_vat)
        .bind(position as i64)
        .execute(&mut *conn)
        .await?;
    }

    debug!(count = details.len(), "Inserted order details");
    Ok(())
}

pub(crate) async fn insert_shipping_address(
    conn: &mut SqliteConnection,
    address: &ShippingAddress,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO shipping_addresses (
            id, order_id, recipient_name, phone, address_line, city,
            postal_code, country_code
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&address.id)
    .bind(&address.order_id)
    .bind(&address.recipient_name)
    .bind(&address.phone)
    .bind(&address.address_line)
    .bind(&address.city)
    .bind(&address.postal_code)
    .bind(&address.country_code)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Persists paid / due / payment status.
pub(crate) async fn update_payment_fields<'e, E>(executor: E, order: &Order) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE orders
        SET total_paid = ?2, total_due = ?3, payment_status = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(order.total_paid)
    .bind(order.total_due)
    .bind(order.payment_status)
    .bind(order.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}

/// Persists order and shipping status.
pub(crate) async fn update_statuses<'e, E>(executor: E, order: &Order) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        UPDATE orders
        SET order_status = ?2, shipping_status = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(&order.id)
    .bind(order.order_status)
    .bind(order.shipping_status)
    .bind(order.updated_at)
    .execute(executor)
    .await?;

    Ok(())
}
