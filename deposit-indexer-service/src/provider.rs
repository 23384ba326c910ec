use crate::deposit::{BlockMeta, RawDepositEvent};
use crate::error::ProviderError;
use async_trait::async_trait;
use ethers::contract::{abigen, parse_log};
use ethers::providers::{Middleware, Provider, StreamExt, Ws};
use ethers::types::{Address, Filter, Log};
use std::sync::Arc;
use std::time::Duration;
use tokio::{sync::mpsc, time::sleep};
use tracing::{debug, error, info, warn};

abigen!(
    BeaconDepositContract,
    r#"[
        event DepositEvent(bytes pubkey, bytes withdrawal_credentials, bytes amount, bytes signature, bytes index)
    ]"#
);

pub const DEPOSIT_EVENT_SIGNATURE: &str = "DepositEvent(bytes,bytes,bytes,bytes,bytes)";

// eth_getLogs request span; larger ranges are split
pub const MAX_BLOCK_RANGE: u64 = 10_000;
const WS_RECONNECTS: usize = 10;
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);
const SUBSCRIPTION_BUFFER: usize = 1_024;

/// Source of deposit events and block metadata.
#[async_trait]
pub trait DepositProvider: Send + Sync {
    /// Standing subscription; the channel closes only when the provider gives up.
    async fn subscribe(&self) -> Result<mpsc::Receiver<RawDepositEvent>, ProviderError>;

    /// All deposit events in `from_block..=to_block`.
    async fn query_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawDepositEvent>, ProviderError>;

    async fn get_block(&self, number: u64) -> Result<BlockMeta, ProviderError>;

    async fn head_block(&self) -> Result<u64, ProviderError>;
}

pub struct EthDepositProvider {
    provider: Arc<Provider<Ws>>,
    contract_address: Address,
}

impl EthDepositProvider {
    pub async fn connect(ws_url: &str, contract_address: Address) -> Result<Self, ProviderError> {
        let provider = Provider::<Ws>::connect_with_reconnects(ws_url, WS_RECONNECTS).await?;
        info!("Connected to {} for contract {:?}", ws_url, contract_address);
        Ok(Self {
            provider: Arc::new(provider),
            contract_address,
        })
    }

    fn filter(&self) -> Filter {
        deposit_filter(self.contract_address)
    }
}

fn deposit_filter(contract_address: Address) -> Filter {
    Filter::new()
        .address(contract_address)
        .event(DEPOSIT_EVENT_SIGNATURE)
}

#[async_trait]
impl DepositProvider for EthDepositProvider {
    async fn subscribe(&self) -> Result<mpsc::Receiver<RawDepositEvent>, ProviderError> {
        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(forward_logs(self.provider.clone(), self.filter(), sender));
        Ok(receiver)
    }

    async fn query_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawDepositEvent>, ProviderError> {
        let mut events: Vec<RawDepositEvent> = vec![];
        let mut start = from_block;
        while start <= to_block {
            let end = to_block.min(start.saturating_add(MAX_BLOCK_RANGE - 1));
            let filter = self.filter().from_block(start).to_block(end);
            let logs = self.provider.get_logs(&filter).await.map_err(|error| {
                error!("get_logs failed for {}..={}: {:?}", start, end, error);
                ProviderError::from(error)
            })?;
            if let Some(log) = logs.iter().find(|log| log.address != self.contract_address) {
                return Err(ProviderError::Rpc(format!(
                    "Provider returned log from {:?}, expected {:?}",
                    log.address, self.contract_address
                )));
            }
            debug!("{} deposit logs in {}..={}", logs.len(), start, end);
            events.extend(logs.into_iter().map(decode_log));
            if end == u64::MAX {
                break;
            }
            start = end + 1;
        }
        Ok(events)
    }

    async fn get_block(&self, number: u64) -> Result<BlockMeta, ProviderError> {
        let block = self
            .provider
            .get_block(number)
            .await?
            .ok_or(ProviderError::BlockNotFound(number))?;
        let returned = block.number.map(|n| n.as_u64()).unwrap_or(number);
        if returned != number {
            return Err(ProviderError::Rpc(format!(
                "Requested block {}, provider returned {}",
                number, returned
            )));
        }
        Ok(BlockMeta {
            number: returned,
            timestamp: block.timestamp.low_u64(),
            base_fee_per_gas: block.base_fee_per_gas,
            hash: block.hash,
        })
    }

    async fn head_block(&self) -> Result<u64, ProviderError> {
        Ok(self.provider.get_block_number().await?.as_u64())
    }
}

async fn forward_logs(
    provider: Arc<Provider<Ws>>,
    filter: Filter,
    sender: mpsc::Sender<RawDepositEvent>,
) {
    loop {
        match provider.subscribe_logs(&filter).await {
            Ok(mut stream) => {
                info!("Subscribed to DepositEvent logs");
                while let Some(log) = stream.next().await {
                    if sender.send(decode_log(log)).await.is_err() {
                        info!("Deposit subscriber gone, closing subscription");
                        return;
                    }
                }
                warn!("DepositEvent subscription stream ended");
            }
            Err(error) => warn!("Failed to subscribe to DepositEvent logs: {:?}", error),
        }
        if sender.is_closed() {
            return;
        }
        sleep(RESUBSCRIBE_DELAY).await;
    }
}

/// Undecodable logs keep their position fields so the normalizer can
/// reject them with a precise reason.
pub fn decode_log(log: Log) -> RawDepositEvent {
    let block_number = log.block_number.map(|n| n.as_u64());
    let log_index = log.log_index.map(|i| i.low_u64());
    let transaction_hash = log.transaction_hash;
    match parse_log::<DepositEventFilter>(log) {
        Ok(event) => RawDepositEvent {
            pubkey: Some(event.pubkey),
            withdrawal_credentials: Some(event.withdrawal_credentials),
            amount: Some(event.amount),
            signature: Some(event.signature),
            index: Some(event.index),
            log_index,
            transaction_hash,
            block_number,
        },
        Err(error) => {
            warn!(
                target: "data_quality",
                "Undecodable DepositEvent log {:?}:{:?}: {}",
                transaction_hash,
                log_index,
                error
            );
            RawDepositEvent {
                log_index,
                transaction_hash,
                block_number,
                ..Default::default()
            }
        }
    }
}
