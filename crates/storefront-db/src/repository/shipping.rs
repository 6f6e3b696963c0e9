//! # Shipping Method Repository

use sqlx::{Executor, Sqlite, SqlitePool};
use storefront_core::shipping::validate_shipping_method;
use storefront_core::ShippingMethod;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const SHIPPING_SELECT: &str = r#"
    SELECT id, name, price, supports_free_shipping, free_shipping_threshold,
           is_active, sort_order
    FROM shipping_methods
"#;

#[derive(Debug, Clone)]
pub struct ShippingMethodRepository {
    pool: SqlitePool,
}

impl ShippingMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ShippingMethodRepository { pool }
    }

    /// Active methods in display order.
    pub async fn list_active(&self) -> DbResult<Vec<ShippingMethod>> {
        let sql = format!("{SHIPPING_SELECT} WHERE is_active = 1 ORDER BY sort_order, name");
        let methods = sqlx::query_as::<_, ShippingMethod>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(methods)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ShippingMethod>> {
        fetch_shipping_method(&self.pool, id).await
    }

    pub async fn insert(&self, method: &ShippingMethod) -> DbResult<ShippingMethod> {
        validate_shipping_method(method)?;

        debug!(name = %method.name, price = method.price, "Inserting shipping method");

        sqlx::query(
            r#"
            INSERT INTO shipping_methods (
                id, name, price, supports_free_shipping, free_shipping_threshold,
                is_active, sort_order
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&method.id)
        .bind(&method.name)
        .bind(method.price)
        .bind(method.supports_free_shipping)
        .bind(method.free_shipping_threshold)
        .bind(method.is_active)
        .bind(method.sort_order)
        .execute(&self.pool)
        .await?;

        Ok(method.clone())
    }

    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Toggling shipping method");

        let result = sqlx::query("UPDATE shipping_methods SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ShippingMethod", id));
        }

        Ok(())
    }
}

pub(crate) async fn fetch_shipping_method<'e, E>(
    executor: E,
    id: &str,
) -> DbResult<Option<ShippingMethod>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{SHIPPING_SELECT} WHERE id = ?1");
    let method = sqlx::query_as::<_, ShippingMethod>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(method)
}

/// Builds a new active method with a fresh id.
pub fn new_shipping_method(name: &str, price: i64, free_shipping_threshold: Option<i64>) -> ShippingMethod {
    ShippingMethod {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        price,
        supports_free_shipping: free_shipping_threshold.is_some(),
        free_shipping_threshold,
        is_active: true,
        sort_order: 0,
    }
}
