use anyhow::Context;
use rust_decimal::Decimal;
use serde::Deserialize;
use shop_types::domain::pricing::PricingConfig;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: String,
    pub database_url: Option<String>,
    pub pricing: PricingConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let server_port = env::var("SERVER_PORT").unwrap_or_else(|_| "3000".into());
        let database_url = env::var("DATABASE_URL").ok();

        let defaults = PricingConfig::default();
        let pricing = PricingConfig {
            shipping_cost: decimal_var("SHIPPING_COST")?.unwrap_or(defaults.shipping_cost),
            tax_rate: decimal_var("TAX_RATE")?.unwrap_or(defaults.tax_rate),
            currency: env::var("CURRENCY").unwrap_or(defaults.currency),
        };
        if pricing.shipping_cost < Decimal::ZERO || pricing.tax_rate < Decimal::ZERO {
            anyhow::bail!("SHIPPING_COST and TAX_RATE must not be negative");
        }

        Ok(Self {
            server_port,
            database_url,
            pricing,
        })
    }
}

fn decimal_var(key: &str) -> anyhow::Result<Option<Decimal>> {
    match env::var(key) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .map(Some)
            .with_context(|| format!("{key} is not a decimal: {raw:?}")),
        Err(_) => Ok(None),
    }
}
