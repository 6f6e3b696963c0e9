//! # Tax Rule Repository
//!
//! Per-country VAT rules. The table enforces one rule per country and at
//! most one default rule; [`TaxRuleRepository::set_default`] moves the
//! default flag atomically.

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use storefront_core::tax::validate_tax_rule;
use storefront_core::validation::validate_country_code;
use storefront_core::TaxRule;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};

const TAX_RULE_SELECT: &str = r#"
    SELECT id, country_code, country_name, vat_rate_bps, is_default, is_active,
           delivery_allowed, min_order_amount, created_at, updated_at
    FROM tax_rules
"#;

#[derive(Debug, Clone)]
pub struct TaxRuleRepository {
    pool: SqlitePool,
}

impl TaxRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TaxRuleRepository { pool }
    }

    /// Lists every rule, active or not, ordered by country code.
    pub async fn list_all(&self) -> DbResult<Vec<TaxRule>> {
        list_all(&self.pool).await
    }

    pub async fn get_by_country(&self, country_code: &str) -> DbResult<Option<TaxRule>> {
        let code = validate_country_code(country_code)?;

        let sql = format!("{TAX_RULE_SELECT} WHERE country_code = ?1");
        let rule = sqlx::query_as::<_, TaxRule>(&sql)
            .bind(&code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(rule)
    }

    /// Returns the default rule, if one is configured.
    pub async fn get_default(&self) -> DbResult<Option<TaxRule>> {
        let sql = format!("{TAX_RULE_SELECT} WHERE is_default = 1");
        let rule = sqlx::query_as::<_, TaxRule>(&sql)
            .fetch_optional(&self.pool)
            .await?;

        Ok(rule)
    }

    /// Inserts a rule. The country code is stored upper-cased.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - Country already has a rule, or a
    ///   second default was requested
    pub async fn insert(&self, rule: &TaxRule) -> DbResult<TaxRule> {
        validate_tax_rule(rule)?;
        let code = validate_country_code(&rule.country_code)?;

        debug!(country_code = %code, vat_rate_bps = rule.vat_rate_bps, "Inserting tax rule");

        sqlx::query(
            r#"
            INSERT INTO tax_rules (
                id, country_code, country_name, vat_rate_bps, is_default, is_active,
                delivery_allowed, min_order_amount, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&rule.id)
        .bind(&code)
        .bind(&rule.country_name)
        .bind(rule.vat_rate_bps)
        .bind(rule.is_default)
        .bind(rule.is_active)
        .bind(rule.delivery_allowed)
        .bind(rule.min_order_amount)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_rule_conflict(e, &code))?;

        Ok(TaxRule {
            country_code: code,
            ..rule.clone()
        })
    }

    /// Updates rate, flags and minimum order of an existing rule.
    ///
    /// The default flag is not touched here; use [`Self::set_default`].
    pub async fn update(&self, rule: &TaxRule) -> DbResult<()> {
        validate_tax_rule(rule)?;

        debug!(id = %rule.id, vat_rate_bps = rule.vat_rate_bps, "Updating tax rule");

        let result = sqlx::query(
            r#"
            UPDATE tax_rules SET
                country_name = ?2,
                vat_rate_bps = ?3,
                is_active = ?4,
                delivery_allowed = ?5,
                min_order_amount = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.country_name)
        .bind(rule.vat_rate_bps)
        .bind(rule.is_active)
        .bind(rule.delivery_allowed)
        .bind(rule.min_order_amount)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TaxRule", &rule.id));
        }

        Ok(())
    }

    /// Makes `country_code`'s rule the default, clearing the previous one.
    pub async fn set_default(&self, country_code: &str) -> DbResult<()> {
        let code = validate_country_code(country_code)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE tax_rules SET is_default = 0, updated_at = ?1 WHERE is_default = 1")
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let result =
            sqlx::query("UPDATE tax_rules SET is_default = 1, updated_at = ?2 WHERE country_code = ?1")
                .bind(&code)
                .bind(now)
                .execute(&mut *tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TaxRule", code));
        }

        tx.commit().await?;

        info!(country_code = %code, "Default tax rule changed");
        Ok(())
    }

    /// Removes a rule. Orders keep the rate they were placed with.
    pub async fn delete(&self, country_code: &str) -> DbResult<()> {
        let code = validate_country_code(country_code)?;

        let result = sqlx::query("DELETE FROM tax_rules WHERE country_code = ?1")
            .bind(&code)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TaxRule", code));
        }

        Ok(())
    }
}

pub(crate) async fn list_all<'e, E>(executor: E) -> DbResult<Vec<TaxRule>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("{TAX_RULE_SELECT} ORDER BY country_code");
    let rules = sqlx::query_as::<_, TaxRule>(&sql)
        .fetch_all(executor)
        .await?;

    Ok(rules)
}

fn map_rule_conflict(err: sqlx::Error, code: &str) -> DbError {
    match DbError::from(err) {
        DbError::UniqueViolation { field, .. }
            if field.ends_with(".is_default") || field.contains("single_default") =>
        {
            DbError::duplicate("is_default", code)
        }
        DbError::UniqueViolation { .. } => DbError::duplicate("country_code", code),
        other => other,
    }
}

/// Builds a new rule with fresh id and timestamps.
pub fn new_tax_rule(
    country_code: &str,
    country_name: &str,
    vat_rate_bps: u32,
    is_default: bool,
) -> TaxRule {
    let now = Utc::now();
    TaxRule {
        id: Uuid::new_v4().to_string(),
        country_code: country_code.to_string(),
        country_name: country_name.to_string(),
        vat_rate_bps,
        is_default,
        is_active: true,
        delivery_allowed: true,
        min_order_amount: 0,
        created_at: now,
        updated_at: now,
    }
}
