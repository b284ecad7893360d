//! Service configuration read from the environment.

use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::aggregates::TransitionPolicy;
use crate::domain::pricing::FeeSchedule;
use crate::services::OrderSettings;

const MAX_DELIVERY_ESTIMATE_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: Option<String>,
    pub nats_url: Option<String>,
    pub catalog_path: Option<String>,
    pub currency: String,
    pub fee_rate: Decimal,
    pub fixed_fee: Decimal,
    pub origin_location: String,
    pub delivery_estimate_days: i64,
    pub transition_policy: TransitionPolicy,
}

impl AppConfig {
    /// Reads configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let port = parse_or(&var, "PORT", 8083u16)?;
        let fee_rate = parse_or(&var, "PROCESSING_FEE_RATE", Decimal::new(29, 3))?;
        let fixed_fee = parse_or(&var, "PROCESSING_FIXED_FEE", Decimal::new(30, 2))?;
        let delivery_estimate_days = parse_or(&var, "DELIVERY_ESTIMATE_DAYS", 7i64)?;
        let transition_policy = match var("STATUS_TRANSITIONS") {
            Some(raw) => TransitionPolicy::from_str(&raw).map_err(anyhow::Error::msg).context("STATUS_TRANSITIONS")?,
            None => TransitionPolicy::default(),
        };
        if fee_rate.is_sign_negative() || fixed_fee.is_sign_negative() {
            anyhow::bail!("processing fees must not be negative");
        }
        if !(0..=MAX_DELIVERY_ESTIMATE_DAYS).contains(&delivery_estimate_days) {
            anyhow::bail!("DELIVERY_ESTIMATE_DAYS must be between 0 and {MAX_DELIVERY_ESTIMATE_DAYS}");
        }

        Ok(Self {
            port,
            database_url: non_empty(var("DATABASE_URL")),
            nats_url: non_empty(var("NATS_URL")),
            catalog_path: non_empty(var("CATALOG_PATH")),
            currency: non_empty(var("CURRENCY")).unwrap_or_else(|| "USD".to_string()),
            fee_rate,
            fixed_fee,
            origin_location: non_empty(var("ORIGIN_LOCATION")).unwrap_or_else(|| "Distribution Center".to_string()),
            delivery_estimate_days,
            transition_policy,
        })
    }

    pub fn order_settings(&self) -> OrderSettings {
        OrderSettings {
            fees: FeeSchedule::new(self.fee_rate, self.fixed_fee),
            origin: self.origin_location.clone(),
            delivery_estimate: Duration::days(self.delivery_estimate_days),
            policy: self.transition_policy,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(var(key)) {
        Some(raw) => raw.trim().parse().with_context(|| format!("invalid {key}: {raw}")),
        None => Ok(default),
    }
}
