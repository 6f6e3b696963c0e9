//! # Store Settings
//!
//! Typed global configuration built once from the key/value `settings`
//! table and passed by reference to whoever needs it.
//!
//! ## Loading
//! ```text
//! settings table (key, value, value_type)
//!      │
//!      ▼
//! SettingValue::parse ── string | boolean | float | json
//!      │
//!      ▼
//! StoreSettings::from_settings ── unknown keys skipped,
//!      │                          legacy tax keys skipped (tax is TaxRule only)
//!      ▼
//! &StoreSettings handed to checkout
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Keys that used to hold a flat tax rate. Tax now comes from per-country
/// rules, so these are never read.
pub const LEGACY_TAX_KEYS: &[&str] = &["tax_rate", "vat_rate", "tax_percentage", "default_tax_rate"];

/// Returns true for keys that must not influence tax.
pub fn is_legacy_tax_key(key: &str) -> bool {
    LEGACY_TAX_KEYS.contains(&key)
}

// =============================================================================
// Currency
// =============================================================================

/// Store currency: ISO 4217 code, display symbol and number of minor digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Currency {
    pub code: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Currency {
    pub fn new(code: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Currency {
            code: code.into(),
            symbol: symbol.into(),
            decimals,
        }
    }

    /// West African CFA franc, the storefront's home currency.
    pub fn xof() -> Self {
        Currency::new("XOF", "F CFA", 0)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.code.len() != 3 || !self.code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::InvalidFormat {
                field: "currency.code".to_string(),
                reason: "must be a three-letter ISO 4217 code".to_string(),
            });
        }
        if self.decimals > 3 {
            return Err(ValidationError::OutOfRange {
                field: "currency.decimals".to_string(),
                min: 0,
                max: 3,
            });
        }
        Ok(())
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::xof()
    }
}

// =============================================================================
// Raw Settings
// =============================================================================

/// Declared type of a setting's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Boolean,
    Float,
    Json,
}

/// One row of the settings table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub value_type: SettingType,
    pub updated_at: DateTime<Utc>,
}

/// A setting value decoded according to its declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Boolean(bool),
    Float(f64),
    Json(serde_json::Value),
}

impl SettingValue {
    /// Decodes a raw row.
    pub fn parse(setting: &Setting) -> Result<Self, ValidationError> {
        let raw = setting.value.trim();
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: setting.key.clone(),
            reason: reason.to_string(),
        };

        match setting.value_type {
            SettingType::String => Ok(SettingValue::String(setting.value.clone())),
            SettingType::Boolean => match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(SettingValue::Boolean(true)),
                "0" | "false" | "no" | "off" | "" => Ok(SettingValue::Boolean(false)),
                _ => Err(invalid("expected a boolean")),
            },
            SettingType::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(SettingValue::Float)
                .ok_or_else(|| invalid("expected a number")),
            SettingType::Json => serde_json::from_str(raw)
                .map(SettingValue::Json)
                .map_err(|e| invalid(&e.to_string())),
        }
    }

    /// Serializes back to the stored representation.
    pub fn to_raw(&self) -> (String, SettingType) {
        match self {
            SettingValue::String(s) => (s.clone(), SettingType::String),
            SettingValue::Boolean(b) => (if *b { "1" } else { "0" }.to_string(), SettingType::Boolean),
            SettingValue::Float(f) => (f.to_string(), SettingType::Float),
            SettingValue::Json(v) => (v.to_string(), SettingType::Json),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Process-wide storefront configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoreSettings {
    /// Shown on invoices.
    pub store_name: String,

    /// Currency attached to every persisted total.
    pub currency: Currency,

    /// Prefix of generated order numbers ("S" → "S-20260131-0001").
    pub order_number_prefix: String,

    /// Global switch for free-shipping thresholds.
    pub free_shipping_enabled: bool,

    pub max_cart_lines: usize,

    pub max_line_quantity: i64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            store_name: "Storefront".to_string(),
            currency: Currency::xof(),
            order_number_prefix: "S".to_string(),
            free_shipping_enabled: true,
            max_cart_lines: MAX_CART_ITEMS,
            max_line_quantity: MAX_ITEM_QUANTITY,
        }
    }
}

impl StoreSettings {
    /// Builds settings from raw rows, starting from defaults.
    ///
    /// ## Recognised Keys
    /// | key                     | type    |
    /// |-------------------------|---------|
    /// | `store_name`            | string  |
    /// | `currency`              | json    | `{"code","symbol","decimals"}`
    /// | `currency_code`         | string  |
    /// | `currency_symbol`       | string  |
    /// | `order_number_prefix`   | string  |
    /// | `free_shipping_enabled` | boolean |
    /// | `max_cart_lines`        | float   |
    /// | `max_line_quantity`     | float   |
    ///
    /// Anything else (including legacy tax keys) is ignored.
    pub fn from_settings(rows: &[Setting]) -> Result<Self, ValidationError> {
        let mut settings = StoreSettings::default();

        for row in rows {
            if is_legacy_tax_key(&row.key) {
                continue;
            }

            let value = SettingValue::parse(row)?;
            let mismatch = || ValidationError::InvalidFormat {
                field: row.key.clone(),
                reason: format!("unexpected {:?} value", row.value_type),
            };

            match (row.key.as_str(), value) {
                ("store_name", SettingValue::String(s)) => settings.store_name = s,
                ("currency", SettingValue::Json(v)) => {
                    settings.currency = serde_json::from_value(v).map_err(|e| {
                        ValidationError::InvalidFormat {
                            field: row.key.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                }
                ("currency_code", SettingValue::String(s)) => {
                    settings.currency.code = s.trim().to_ascii_uppercase()
                }
                ("currency_symbol", SettingValue::String(s)) => settings.currency.symbol = s,
                ("order_number_prefix", SettingValue::String(s)) => {
                    settings.order_number_prefix = s.trim().to_string()
                }
                ("free_shipping_enabled", SettingValue::Boolean(b)) => {
                    settings.free_shipping_enabled = b
                }
                ("max_cart_lines", SettingValue::Float(f)) => {
                    settings.max_cart_lines = positive_whole(&row.key, f)? as usize
                }
                ("max_line_quantity", SettingValue::Float(f)) => {
                    settings.max_line_quantity = positive_whole(&row.key, f)?
                }
                (
                    "store_name" | "currency" | "currency_code" | "currency_symbol"
                    | "order_number_prefix" | "free_shipping_enabled" | "max_cart_lines"
                    | "max_line_quantity",
                    _,
                ) => return Err(mismatch()),
                _ => {}
            }
        }

        settings.currency.validate()?;

        if settings.order_number_prefix.is_empty() {
            return Err(ValidationError::Required {
                field: "order_number_prefix".to_string(),
            });
        }

        Ok(settings)
    }
}

fn positive_whole(key: &str, value: f64) -> Result<i64, ValidationError> {
    if value < 1.0 || value.fract() != 0.0 || value > i32::MAX as f64 {
        return Err(ValidationError::OutOfRange {
            field: key.to_string(),
            min: 1,
            max: i32::MAX as i64,
        });
    }
    Ok(value as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================
