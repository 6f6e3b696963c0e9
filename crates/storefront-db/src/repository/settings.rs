//! # Settings Repository
//!
//! Typed key/value store behind [`StoreSettings`].

use chrono::Utc;
use sqlx::SqlitePool;
use storefront_core::settings::is_legacy_tax_key;
use storefront_core::validation::validate_required_text;
use storefront_core::{Setting, SettingValue, StoreSettings};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn list_all(&self) -> DbResult<Vec<Setting>> {
        let rows = sqlx::query_as::<_, Setting>(
            "SELECT key, value, value_type, updated_at FROM settings ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<SettingValue>> {
        let row = sqlx::query_as::<_, Setting>(
            "SELECT key, value, value_type, updated_at FROM settings WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| SettingValue::parse(&r).map_err(|e| corrupt(&e)))
            .transpose()
    }

    /// Inserts or replaces a setting.
    pub async fn set(&self, key: &str, value: &SettingValue) -> DbResult<()> {
        validate_required_text("key", key, 100)?;

        if is_legacy_tax_key(key) {
            warn!(key = %key, "Storing legacy tax setting; tax is read from tax rules only");
        }

        let (raw, value_type) = value.to_raw();
        debug!(key = %key, value_type = ?value_type, "Saving setting");

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, value_type, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                value_type = excluded.value_type,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(raw)
        .bind(value_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, key: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM settings WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Setting", key));
        }

        Ok(())
    }

    /// Reads every row and builds the typed store settings.
    ///
    /// Absent keys keep their defaults. Legacy tax keys are logged and
    /// ignored. A known key with a value of the wrong type is an error.
    pub async fn load_store_settings(&self) -> DbResult<StoreSettings> {
        let rows = self.list_all().await?;

        for row in rows.iter().filter(|r| is_legacy_tax_key(&r.key)) {
            warn!(
                key = %row.key,
                value = %row.value,
                "Ignoring legacy tax setting; configure a tax rule instead"
            );
        }

        let settings = StoreSettings::from_settings(&rows).map_err(|e| corrupt(&e))?;

        info!(
            store_name = %settings.store_name,
            currency = %settings.currency.code,
            free_shipping_enabled = settings.free_shipping_enabled,
            "Store settings loaded"
        );
        Ok(settings)
    }
}

fn corrupt(err: &dyn std::fmt::Display) -> DbError {
    DbError::CorruptData {
        entity: "settings".to_string(),
        reason: err.to_string(),
    }
}
