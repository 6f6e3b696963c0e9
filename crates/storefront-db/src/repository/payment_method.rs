//! # Payment Method Repository
//!
//! Gateway rows (PayPal, Orange Money, Wave, cash on delivery). The `code`
//! identifies the integration that talks to the gateway.

use sqlx::{Executor, Sqlite, SqlitePool};
use storefront_core::validation::validate_required_text;
use storefront_core::PaymentMethod;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const PAYMENT_METHOD_SELECT: &str =
    "SELECT id, code, name, is_active, sort_order FROM payment_methods";

#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentMethodRepository { pool }
    }

    pub async fn list_active(&self) -> DbResult<Vec<PaymentMethod>> {
        let sql = format!("{PAYMENT_METHOD_SELECT} WHERE is_active = 1 ORDER BY sort_order, name");
        let methods = sqlx::query_as::<_, PaymentMethod>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(methods)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PaymentMethod>> {
        fetch_payment_method(&self.pool, id).await
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<PaymentMethod>> {
        let sql = format!("{PAYMENT_METHOD_SELECT} WHERE code = ?1");
        let method = sqlx::query_as::<_, PaymentMethod>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(method)
    }

    pub async fn insert(&self, method: &PaymentMethod) -> DbResult<PaymentMethod> {
        validate_required_text("code", &method.code, 50)?;
        validate_required_text("name", &method.name, 100)?;

        debug!(code = %method.code, "Inserting payment method");

        sqlx::query(
            "INSERT INTO payment_methods (id, code, name, is_active, sort_order) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&method.id)
        .bind(&method.code)
        .bind(&method.name)
        .bind(method.is_active)
        .bind(method.sort_order)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("code", &method.code),
            other => other,
        })?;

        Ok(method.clone())
    }

    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        debug!(id = %id, active, "Toggling payment method");

        let result = sqlx::query("UPDATE payment_methods SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentMethod", id));
        }

        Ok(())
    }
}

pub(crate) async fn fetch_payment_method<'e, E>(
    executor: E,
    id: &str,
) -> DbResult<Option<PaymentMethod>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{PAYMENT_METHOD_SELECT} WHERE id = ?1");
    let method = sqlx::query_as::<_, PaymentMethod>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;

    Ok(method)
}

/// Builds a new active method with a fresh id.
pub fn new_payment_method(code: &str, name: &str, sort_order: i64) -> PaymentMethod {
    PaymentMethod {
        id: Uuid::new_v4().to_string(),
        code: code.to_string(),
        name: name.to_string(),
        is_active: true,
        sort_order,
    }
}
