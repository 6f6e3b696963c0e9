//! # Tax Resolution
//!
//! Resolves the VAT rate that applies to an order from its destination
//! country.
//!
//! ## Fallback Chain
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  resolve_tax(rules, "SN")                                               │
//! │       │                                                                 │
//! │       ├── active rule for SN with delivery allowed? ──► CountryRule     │
//! │       │                                                                 │
//! │       ├── active rule flagged is_default?  ───────────► DefaultRule     │
//! │       │                                                                 │
//! │       └── nothing ────────────────────────────────────► NoRule (0%)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tax never comes from the generic settings table. Legacy flat `tax_rate`
//! settings are ignored by [`crate::settings::StoreSettings`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_price, validate_tax_rate_bps};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// 1 basis point = 0.01%, so 1800 bps = 18% (Senegalese VAT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Tax Rule
// =============================================================================

/// Per-country VAT configuration.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TaxRule {
    pub id: String,
    /// ISO 3166-1 alpha-2, stored upper case.
    pub country_code: String,
    pub country_name: String,
    /// VAT rate in basis points.
    pub vat_rate_bps: u32,
    /// At most one rule carries this flag.
    pub is_default: bool,
    pub is_active: bool,
    /// When false, orders to this country are refused at checkout.
    pub delivery_allowed: bool,
    /// Minimum payable amount (minor units) for orders shipped here.
    pub min_order_amount: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl TaxRule {
    #[inline]
    pub fn vat_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.vat_rate_bps)
    }

    #[inline]
    pub fn min_order(&self) -> Money {
        Money::from_minor(self.min_order_amount)
    }

    fn matches(&self, country_code: &str) -> bool {
        self.is_active && self.country_code.eq_ignore_ascii_case(country_code)
    }
}

/// Where a resolved rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxSource {
    /// Active rule for the destination country.
    CountryRule,
    /// Destination unmatched or not deliverable; default rule used.
    DefaultRule,
    /// No rule at all; zero rate.
    NoRule,
}

/// Outcome of tax resolution for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedTax {
    pub rate: TaxRate,
    pub source: TaxSource,
    /// Country code of the rule that supplied the rate.
    pub rule_country_code: Option<String>,
    pub min_order_amount: Money,
}

impl ResolvedTax {
    fn from_rule(rule: &TaxRule, source: TaxSource) -> Self {
        ResolvedTax {
            rate: rule.vat_rate(),
            source,
            rule_country_code: Some(rule.country_code.clone()),
            min_order_amount: rule.min_order(),
        }
    }

    fn none() -> Self {
        ResolvedTax {
            rate: TaxRate::zero(),
            source: TaxSource::NoRule,
            rule_country_code: None,
            min_order_amount: Money::zero(),
        }
    }
}

/// Resolves exactly one VAT rate for a destination country.
///
/// Deterministic: the same rules and country always give the same answer.
/// When several active rules claim `is_default` (which
/// [`validate_tax_rules`] rejects), the first one in slice order wins.
///
/// ```rust
/// use storefront_core::tax::{resolve_tax, TaxSource};
///
/// let resolved = resolve_tax(&[], "SN");
/// assert_eq!(resolved.source, TaxSource::NoRule);
/// assert!(resolved.rate.is_zero());
/// ```
pub fn resolve_tax(rules: &[TaxRule], country_code: &str) -> ResolvedTax {
    let country_code = country_code.trim();

    if let Some(rule) = rules
        .iter()
        .find(|r| r.matches(country_code) && r.delivery_allowed)
    {
        return ResolvedTax::from_rule(rule, TaxSource::CountryRule);
    }

    match rules.iter().find(|r| r.is_default && r.is_active) {
        Some(rule) => ResolvedTax::from_rule(rule, TaxSource::DefaultRule),
        None => ResolvedTax::none(),
    }
}

/// Normalizes a destination country code and checks it can be delivered to.
///
/// ## Rules
/// - Must be two ASCII letters (returned upper-cased)
/// - An active rule for the country with `delivery_allowed = false` refuses
///   the destination outright
///
/// Countries without any rule are accepted; they are taxed via the default
/// rule.
pub fn check_destination(rules: &[TaxRule], country_code: &str) -> CoreResult<String> {
    let code = country_code.trim();

    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CoreError::InvalidCountryForDelivery {
            country_code: code.to_string(),
        });
    }

    let code = code.to_ascii_uppercase();

    if rules.iter().any(|r| r.matches(&code) && !r.delivery_allowed) {
        return Err(CoreError::InvalidCountryForDelivery { country_code: code });
    }

    Ok(code)
}

/// Enforces the resolved rule's minimum order amount.
pub fn check_minimum_order(
    resolved: &ResolvedTax,
    country_code: &str,
    payable: Money,
) -> CoreResult<()> {
    if payable < resolved.min_order_amount {
        return Err(CoreError::BelowMinimumOrder {
            country_code: country_code.to_string(),
            minimum: resolved.min_order_amount.minor(),
            subtotal: payable.minor(),
        });
    }

    Ok(())
}

/// Validates a single rule before it is stored.
pub fn validate_tax_rule(rule: &TaxRule) -> Result<(), ValidationError> {
    let code = rule.country_code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ValidationError::InvalidFormat {
            field: "country_code".to_string(),
            reason: "must be a two-letter ISO 3166-1 code".to_string(),
        });
    }

    validate_tax_rate_bps(rule.vat_rate_bps)?;

    validate_price("min_order_amount", rule.min_order_amount)?;

    Ok(())
}

/// Validates a rule set: each rule individually, unique countries, and at
/// most one default.
pub fn validate_tax_rules(rules: &[TaxRule]) -> Result<(), ValidationError> {
    let mut seen: Vec<String> = Vec::with_capacity(rules.len());
    let mut default_country: Option<&str> = None;

    for rule in rules {
        validate_tax_rule(rule)?;

        let code = rule.country_code.to_ascii_uppercase();
        if seen.contains(&code) {
            return Err(ValidationError::Duplicate {
                field: "country_code".to_string(),
                value: code,
            });
        }
        seen.push(code);

        if rule.is_default {
            if let Some(existing) = default_country {
                return Err(ValidationError::Duplicate {
                    field: "is_default".to_string(),
                    value: format!("{} and {}", existing, rule.country_code),
                });
            }
            default_country = Some(&rule.country_code);
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(code: &str, bps: u32) -> TaxRule {
        TaxRule {
            id: format!("rule-{}", code),
            country_code: code.to_string(),
            country_name: code.to_string(),
            vat_rate_bps: bps,
            is_default: false,
            is_active: true,
            delivery_allowed: true,
            min_order_amount: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn default_rule(code: &str, bps: u32) -> TaxRule {
        TaxRule {
            is_default: true,
            ..rule(code, bps)
        }
    }

    #[test]
    fn test_tax_rate_percentage() {
        assert!((TaxRate::from_bps(1800).percentage() - 18.0).abs() < 0.001);
    }

    #[test]
    fn test_matching_active_rule_wins() {
        let rules = vec![default_rule("SN", 1800), rule("CI", 1800), rule("FR", 2000)];
        let resolved = resolve_tax(&rules, "fr");
        assert_eq!(resolved.source, TaxSource::CountryRule);
        assert_eq!(resolved.rate.bps(), 2000);
        assert_eq!(resolved.rule_country_code.as_deref(), Some("FR"));
    }

    #[test]
    fn test_unmatched_country_falls_back_to_default() {
        let rules = vec![default_rule("SN", 1800), rule("FR", 2000)];
        let resolved = resolve_tax(&rules, "ML");
        assert_eq!(resolved.source, TaxSource::DefaultRule);
        assert_eq!(resolved.rate.bps(), 1800);
    }

    #[test]
    fn test_inactive_rule_is_ignored() {
        let mut fr = rule("FR", 2000);
        fr.is_active = false;
        let rules = vec![default_rule("SN", 1800), fr];
        assert_eq!(resolve_tax(&rules, "FR").source, TaxSource::DefaultRule);
    }

    #[test]
    fn test_delivery_disallowed_falls_back_to_default() {
        let mut fr = rule("FR", 2000);
        fr.delivery_allowed = false;
        let rules = vec![default_rule("SN", 1800), fr];
        let resolved = resolve_tax(&rules, "FR");
        assert_eq!(resolved.source, TaxSource::DefaultRule);
        assert_eq!(resolved.rate.bps(), 1800);
    }

    #[test]
    fn test_no_default_yields_zero() {
        let rules = vec![rule("FR", 2000)];
        let resolved = resolve_tax(&rules, "DE");
        assert_eq!(resolved.source, TaxSource::NoRule);
        assert!(resolved.rate.is_zero());
        assert!(resolved.min_order_amount.is_zero());
    }

    #[test]
    fn test_inactive_default_is_not_used() {
        let mut sn = default_rule("SN", 1800);
        sn.is_active = false;
        assert_eq!(resolve_tax(&[sn], "DE").source, TaxSource::NoRule);
    }

    #[test]
    fn test_check_destination() {
        let mut fr = rule("FR", 2000);
        fr.delivery_allowed = false;
        let rules = vec![default_rule("SN", 1800), fr];

        assert_eq!(check_destination(&rules, " sn ").unwrap(), "SN");
        assert_eq!(check_destination(&rules, "ML").unwrap(), "ML");
        assert!(matches!(
            check_destination(&rules, "FR"),
            Err(CoreError::InvalidCountryForDelivery { .. })
        ));
        assert!(check_destination(&rules, "SEN").is_err());
        assert!(check_destination(&rules, "1A").is_err());
        assert!(check_destination(&rules, "").is_err());
    }

    #[test]
    fn test_minimum_order() {
        let mut sn = default_rule("SN", 1800);
        sn.min_order_amount = 5000;
        let resolved = resolve_tax(&[sn], "SN");

        assert!(check_minimum_order(&resolved, "SN", Money::from_minor(5000)).is_ok());
        let err = check_minimum_order(&resolved, "SN", Money::from_minor(4999)).unwrap_err();
        assert!(matches!(err, CoreError::BelowMinimumOrder { minimum: 5000, subtotal: 4999, .. }));
    }

    #[test]
    fn test_validate_tax_rules_single_default() {
        let rules = vec![default_rule("SN", 1800), default_rule("CI", 1800)];
        assert!(matches!(
            validate_tax_rules(&rules),
            Err(ValidationError::Duplicate { .. })
        ));

        let rules = vec![default_rule("SN", 1800), rule("CI", 1800)];
        assert!(validate_tax_rules(&rules).is_ok());
    }

    #[test]
    fn test_validate_tax_rule_bounds() {
        assert!(validate_tax_rule(&rule("SN", 10001)).is_err());
        assert!(validate_tax_rule(&rule("SEN", 1800)).is_err());

        let mut negative = rule("SN", 1800);
        negative.min_order_amount = -1;
        assert!(validate_tax_rule(&negative).is_err());

        let mut huge = rule("SN", 1800);
        huge.min_order_amount = i64::MAX;
        assert!(validate_tax_rule(&huge).is_err());
    }
}
