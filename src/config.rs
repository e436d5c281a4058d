//! Environment configuration

use std::env;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::pricing::{PricingRules, DEFAULT_FALLBACK_DELIVERY_FEE, DEFAULT_SMALL_ORDER_FEE, DEFAULT_TAX_RATE_BPS};
use crate::domain::value_objects::Money;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub currency: String,
    pub pricing: PricingRules,
    pub nats_url: Option<String>,
    pub event_subject_prefix: String,
    /// Whether the built-in payment gateway marks intents paid as soon as they are created.
    pub payment_auto_settle: bool,
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|var| env::var(var).ok())?;
        tracing::info!(port = config.port, currency = %config.currency, nats = config.nats_url.is_some(), "configuration loaded");
        Ok(config)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&get, "PORT", 8083u16)?;
        let currency = get("CURRENCY").unwrap_or_else(|| "ron".to_string()).to_lowercase();
        let tax_rate_bps = parse_or(&get, "TAX_RATE_BPS", DEFAULT_TAX_RATE_BPS)?;
        let small_order_fee = parse_or(&get, "SMALL_ORDER_FEE", DEFAULT_SMALL_ORDER_FEE.minor())?;
        let fallback_fee = parse_or(&get, "FALLBACK_DELIVERY_FEE", DEFAULT_FALLBACK_DELIVERY_FEE.minor())?;

        let pricing = PricingRules::new(tax_rate_bps, Money::from_minor(small_order_fee), Money::from_minor(fallback_fee))
            .map_err(|e| ConfigError::Invalid { var: "FALLBACK_DELIVERY_FEE", reason: e.to_string() })?;

        Ok(Self {
            port,
            currency,
            pricing,
            nats_url: get("NATS_URL"),
            event_subject_prefix: get("EVENT_SUBJECT_PREFIX").unwrap_or_else(|| "food.orders".to_string()),
            payment_auto_settle: parse_or(&get, "PAYMENT_AUTO_SETTLE", true)?,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid { var, reason: format!("{raw:?}: {e}") }),
        None => Ok(default),
    }
}
