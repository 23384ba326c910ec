use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::ConfigError;
use crate::store::HistoryOrder;
use ethers::types::Address;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::time::Duration;
use tracing::warn;

#[derive(Deserialize, Debug)]
pub struct Config {
    pub database_url: String,
    pub sqlx_max_connections: u32,
    pub sqlx_min_connections: Option<u32>,
    pub sqlx_connect_timeout: Option<u64>,
    pub sqlx_idle_timeout: Option<u64>,
    pub sqlx_max_lifetime: Option<u64>,
    pub sqlx_logging: Option<bool>,
    pub sqlx_logging_level: Option<String>,
    pub rust_log: String,
    pub indexer_service_log: String,
    pub eth_ws_url: String,
    pub beacon_deposit_contract_addr: String,
    pub start_block: u64,
    pub cache_capacity: Option<usize>,
    pub cache_ttl_secs: Option<u64>,
    pub history_newest_first: Option<bool>,
    pub backfill_on_start: Option<bool>,
    pub enable_datadog: bool,
    pub datadog_host: Option<String>,
    pub datadog_port: Option<String>,
    pub slack_notification: bool,
    pub slack_webhook_url: Option<String>,
    pub slack_channel_id: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

/// `App.toml`, overridden by `INDEXER_*` environment variables.
pub fn load() -> Result<Config, ConfigError> {
    from_figment(
        Figment::new()
            .merge(Toml::file("App.toml"))
            .merge(Env::prefixed("INDEXER_")),
    )
}

pub fn from_figment(figment: Figment) -> Result<Config, ConfigError> {
    Ok(figment.extract()?)
}

impl Config {
    pub fn cache_capacity(&self) -> NonZeroUsize {
        let capacity = self.cache_capacity.unwrap_or(1);
        NonZeroUsize::new(capacity).unwrap_or_else(|| {
            warn!("cache_capacity must be at least 1, using 1");
            NonZeroUsize::MIN
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        match self.cache_ttl_secs {
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_CACHE_TTL,
        }
    }

    pub fn history_order(&self) -> HistoryOrder {
        match self.history_newest_first {
            Some(true) => HistoryOrder::NewestFirst,
            _ => HistoryOrder::OldestFirst,
        }
    }

    pub fn backfill_on_start(&self) -> bool {
        self.backfill_on_start.unwrap_or(true)
    }

    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        self.beacon_deposit_contract_addr
            .parse::<Address>()
            .map_err(|_| {
                ConfigError::InvalidContractAddress(self.beacon_deposit_contract_addr.to_owned())
            })
    }

    pub fn datadog_config(&self) -> datadog_apm::Config {
        datadog_apm::Config {
            env: Some("prod".to_owned()),
            service: "beacon-deposit-indexer".to_owned(),
            host: self
                .datadog_host
                .to_owned()
                .unwrap_or_else(|| "localhost".to_owned()),
            port: self
                .datadog_port
                .to_owned()
                .unwrap_or_else(|| "8126".to_owned()),
            ..Default::default()
        }
    }
}

pub async fn get_db_connection(config: &Config) -> Result<DatabaseConnection, DbErr> {
    let mut options: ConnectOptions = config.database_url.to_owned().into();
    options
        .max_connections(config.sqlx_max_connections)
        .min_connections(match config.sqlx_min_connections {
            Some(v) => v,
            None => 2,
        })
        .connect_timeout(Duration::from_secs(match config.sqlx_connect_timeout {
            Some(v) => v,
            None => 8,
        }))
        .idle_timeout(Duration::from_secs(match config.sqlx_idle_timeout {
            Some(v) => v,
            None => 8,
        }))
        .max_lifetime(Duration::from_secs(match config.sqlx_max_lifetime {
            Some(v) => v,
            None => 8,
        }))
        .sqlx_logging(match config.sqlx_logging {
            Some(v) => v,
            None => false,
        })
        .sqlx_logging_level(
            match config
                .sqlx_logging_level
                .as_deref()
                .unwrap_or("info")
                .parse::<log::LevelFilter>()
            {
                Ok(level) => level,
                Err(_) => log::LevelFilter::Info,
            },
        );

    sea_orm::Database::connect(options).await
}
