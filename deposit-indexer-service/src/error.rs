use sea_orm::DbErr;
use thiserror::Error;

/// A chain-supplied field needed to build a record is absent or unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IncompleteEventError {
    #[error("event has no pubkey")]
    MissingPubkey,
    #[error("pubkey must be {expected} bytes, got {actual}")]
    MalformedPubkey { expected: usize, actual: usize },
    #[error("event has no block number")]
    MissingBlockNumber,
    #[error("event is in block {event} but block {block} was supplied")]
    BlockMismatch { event: u64, block: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("RPC error: {0}")]
    Rpc(String),
    #[error("Block not found: {0}")]
    BlockNotFound(u64),
    #[error("Subscription error: {0}")]
    Subscription(String),
}

impl From<ethers::providers::ProviderError> for ProviderError {
    fn from(error: ethers::providers::ProviderError) -> Self {
        ProviderError::Rpc(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Db error: {0}")]
    Db(#[from] DbErr),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    IncompleteEvent(#[from] IncompleteEventError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl IngestError {
    /// Malformed events are dropped by every producer instead of failing it.
    pub fn is_droppable(&self) -> bool {
        matches!(self, IngestError::IncompleteEvent(_))
    }
}

#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("invalid block range {from}..={to}")]
    InvalidRange { from: u64, to: u64 },
    #[error("backfill cancelled after persisting {persisted} deposits")]
    Cancelled { persisted: usize },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// The realtime cache holds nothing readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no realtime deposit available")]
pub struct NoData;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config extraction failed: {0}")]
    Figment(#[from] figment::Error),
    #[error("Invalid contract address {0}")]
    InvalidContractAddress(String),
}
