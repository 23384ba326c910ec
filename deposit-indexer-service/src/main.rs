mod backfill;
mod cache;
mod config;
mod controller;
mod datadog;
mod deposit;
mod dto;
mod error;
mod guard;
mod normalizer;
mod notifier;
mod provider;
mod slack;
mod sql_stmt;
mod store;
mod subscriber;
mod telegram;
#[cfg(test)]
mod test_utils;

use backfill::BackfillReconciler;
use cache::RecentDepositCache;
use controller::IngestionController;
use notifier::{LogNotifier, Notifier};
use provider::EthDepositProvider;
use slack::SlackNotifier;
use std::error::Error;
use std::sync::Arc;
use store::SeaOrmDepositStore;
use subscriber::LiveSubscriber;
use telegram::TelegramNotifier;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = config::load()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", &config.rust_log);
    }
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                format!("deposit_indexer_service={}", &config.indexer_service_log).parse()?,
            ),
        )
        .with_span_events(FmtSpan::FULL)
        .init();

    let contract_address = config.contract_address()?;
    let db = config::get_db_connection(&config).await?;
    let client = reqwest::Client::builder().build()?;

    let datadog_client = if config.enable_datadog {
        Some(datadog_apm::Client::new(config.datadog_config()))
    } else {
        None
    };

    let provider = EthDepositProvider::connect(&config.eth_ws_url, contract_address).await?;
    let store = SeaOrmDepositStore::new(db, config.history_order(), datadog_client);
    let controller = Arc::new(IngestionController::new(
        Arc::new(provider),
        Arc::new(store),
        build_notifier(&config, client),
        RecentDepositCache::new(config.cache_capacity(), config.cache_ttl()),
    ));

    let cancel = CancellationToken::new();
    let subscriber = LiveSubscriber::start(controller.clone(), cancel.clone()).await?;

    let backfill = if config.backfill_on_start() {
        let reconciler = BackfillReconciler::new(controller.clone());
        Some(reconciler.spawn_to_head(config.start_block, cancel.clone()))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    cancel.cancel();

    if let Some(backfill) = backfill {
        if let Err(join_error) = backfill.await {
            warn!("Startup backfill ended abnormally: {:?}", join_error);
        }
    }
    if let Err(join_error) = subscriber.await {
        warn!("Live subscriber ended abnormally: {:?}", join_error);
    }
    Ok(())
}

fn build_notifier(config: &config::Config, client: reqwest::Client) -> Arc<dyn Notifier> {
    if let (Some(bot_token), Some(chat_id)) = (&config.telegram_bot_token, &config.telegram_chat_id)
    {
        info!("Deposit notifications go to Telegram");
        return Arc::new(TelegramNotifier::new(client, bot_token, chat_id.to_owned()));
    }
    if config.slack_notification {
        if let Some(webhook_url) = &config.slack_webhook_url {
            info!("Deposit notifications go to Slack");
            return Arc::new(SlackNotifier::new(
                client,
                webhook_url.to_owned(),
                config.slack_channel_id.to_owned().unwrap_or_default(),
            ));
        }
        warn!("slack_notification is set without slack_webhook_url");
    }
    Arc::new(LogNotifier)
}
