use chrono::FixedOffset;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::{Error, window::utc_offset};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    /// Local offset month windows are computed in.
    #[serde(
        serialize_with = "serialize_offset",
        deserialize_with = "deserialize_offset"
    )]
    pub utc_offset: FixedOffset,
    pub cash_account_keyword: String,
    pub wallet_account_keyword: String,
    pub recent_orders_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 5,
            utc_offset: utc_offset(),
            cash_account_keyword: "efectivo".to_string(),
            wallet_account_keyword: "billetera".to_string(),
            recent_orders_limit: 8,
        }
    }
}

impl Config {
    /// Read overrides from the process environment on top of the defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_json(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(url) = lookup("DATABASE_URL") {
            config.database_url = Some(url);
        }
        if let Some(raw) = lookup("CULTIVO_MAX_CONNECTIONS") {
            config.max_connections = parse_var("CULTIVO_MAX_CONNECTIONS", &raw)?;
        }
        if let Some(raw) = lookup("CULTIVO_UTC_OFFSET") {
            config.utc_offset = parse_offset(&raw)?;
        }
        if let Some(keyword) = lookup("CULTIVO_CASH_ACCOUNT") {
            config.cash_account_keyword = keyword;
        }
        if let Some(keyword) = lookup("CULTIVO_WALLET_ACCOUNT") {
            config.wallet_account_keyword = keyword;
        }
        if let Some(raw) = lookup("CULTIVO_RECENT_ORDERS") {
            config.recent_orders_limit = parse_var("CULTIVO_RECENT_ORDERS", &raw)?;
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} is not a valid number: {}", key, raw)))
}

fn parse_offset(raw: &str) -> Result<FixedOffset, Error> {
    raw.trim()
        .parse::<FixedOffset>()
        .map_err(|e| Error::Config(format!("invalid utc offset {}: {}", raw, e)))
}

fn serialize_offset<S: Serializer>(offset: &FixedOffset, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&offset.to_string())
}

fn deserialize_offset<'de, D: Deserializer<'de>>(d: D) -> Result<FixedOffset, D::Error> {
    let raw = String::deserialize(d)?;
    parse_offset(&raw).map_err(serde::de::Error::custom)
}
