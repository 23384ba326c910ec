use crate::controller::IngestionController;
use crate::deposit::{IngestOutcome, RawDepositEvent};
use crate::error::ProviderError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Standing consumer of the provider's deposit subscription.
pub struct LiveSubscriber;

impl LiveSubscriber {
    pub async fn start(
        controller: Arc<IngestionController>,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, ProviderError> {
        let receiver = controller.provider().subscribe().await?;
        Ok(Self::spawn(controller, receiver, cancel))
    }

    pub fn spawn(
        controller: Arc<IngestionController>,
        receiver: mpsc::Receiver<RawDepositEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(run(controller, receiver, cancel))
    }
}

async fn run(
    controller: Arc<IngestionController>,
    mut receiver: mpsc::Receiver<RawDepositEvent>,
    cancel: CancellationToken,
) {
    info!("Live deposit subscriber started");
    let mut in_flight = JoinSet::new();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Live deposit subscriber cancelled");
                break;
            }
            delivery = receiver.recv() => match delivery {
                Some(raw) => {
                    let controller = controller.clone();
                    in_flight.spawn(async move { handle_delivery(&controller, raw).await });
                }
                None => {
                    warn!("Deposit subscription closed by provider");
                    break;
                }
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(join_error) = joined {
                    error!("Deposit ingestion task failed: {:?}", join_error);
                }
            }
        }
    }

    debug!("Draining {} in-flight deliveries", in_flight.len());
    while let Some(joined) = in_flight.join_next().await {
        if let Err(join_error) = joined {
            error!("Deposit ingestion task failed: {:?}", join_error);
        }
    }
    info!("Live deposit subscriber stopped");
}

async fn handle_delivery(controller: &IngestionController, raw: RawDepositEvent) {
    match controller.ingest_one(raw).await {
        Ok(IngestOutcome::Persisted(record)) => {
            debug!("Live deposit {} persisted", record.natural_key)
        }
        Ok(IngestOutcome::Duplicate) => debug!("Live deposit already ingested"),
        Err(ingest_error) if ingest_error.is_droppable() => {
            debug!("Live deposit dropped: {}", ingest_error)
        }
        Err(ingest_error) => error!("Live deposit ingestion failed: {}", ingest_error),
    }
}
