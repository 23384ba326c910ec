use crate::cache::RecentDepositCache;
use crate::controller::IngestionController;
use crate::deposit::{BlockMeta, DepositRecord, RawDepositEvent};
use crate::error::{PersistenceError, ProviderError};
use crate::normalizer;
use crate::notifier::Notifier;
use crate::provider::DepositProvider;
use crate::store::{DepositStore, InsertSummary};
use async_trait::async_trait;
use ethers::types::{Bytes, H256, U256};
use sea_orm::DbErr;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

const FIXED_CREATED_AT: i64 = 1_700_000_000_000;

pub fn pubkey(block_number: u64, log_index: u64) -> Bytes {
    let mut bytes = vec![0x5a; normalizer::PUBKEY_LENGTH];
    bytes[..8].copy_from_slice(&block_number.to_be_bytes());
    bytes[8..16].copy_from_slice(&log_index.to_be_bytes());
    Bytes::from(bytes)
}

pub fn tx_hash(block_number: u64, log_index: u64) -> H256 {
    H256::from_low_u64_be(block_number * 1_000 + log_index + 1)
}

pub fn raw_event(block_number: u64, log_index: u64) -> RawDepositEvent {
    RawDepositEvent {
        pubkey: Some(pubkey(block_number, log_index)),
        withdrawal_credentials: Some(Bytes::from(vec![0x01; 32])),
        amount: Some(Bytes::from(32_000_000_000u64.to_le_bytes().to_vec())),
        signature: Some(Bytes::from(vec![0x99; 96])),
        index: Some(Bytes::from(block_number.to_le_bytes().to_vec())),
        log_index: Some(log_index),
        transaction_hash: Some(tx_hash(block_number, log_index)),
        block_number: Some(block_number),
    }
}

pub fn block_meta(number: u64) -> BlockMeta {
    BlockMeta {
        number,
        timestamp: 1_700_000_000 + number * 12,
        base_fee_per_gas: Some(U256::from(7_000_000_000u64)),
        hash: Some(H256::from_low_u64_be(0xb000_0000 + number)),
    }
}

/// Normalized record with fixed ingestion timestamps.
pub fn record(block_number: u64, log_index: u64) -> DepositRecord {
    let mut record = normalizer::normalize(
        &raw_event(block_number, log_index),
        &block_meta(block_number),
    )
    .unwrap();
    record.created_at = FIXED_CREATED_AT;
    record.updated_at = FIXED_CREATED_AT;
    record
}

/// Scripted chain: every event added is "on chain", blocks resolve to
/// [`block_meta`] unless marked as failing.
#[derive(Default)]
pub struct MockProvider {
    events: Mutex<Vec<RawDepositEvent>>,
    failing_blocks: Mutex<HashSet<u64>>,
    fail_queries: AtomicBool,
    range_queries: Mutex<Vec<(u64, u64)>>,
    head: AtomicU64,
    block_fetches: AtomicUsize,
    cancel_on_block: Mutex<Option<(u64, CancellationToken)>>,
    subscription: Mutex<Option<mpsc::Receiver<RawDepositEvent>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<RawDepositEvent>) -> Self {
        let provider = Self::new();
        provider.add_events(events);
        provider
    }

    pub fn add_events(&self, events: Vec<RawDepositEvent>) {
        self.events.lock().unwrap().extend(events);
    }

    pub fn set_head(&self, head: u64) {
        self.head.store(head, Ordering::SeqCst);
    }

    pub fn fail_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().insert(number);
    }

    pub fn heal_block(&self, number: u64) {
        self.failing_blocks.lock().unwrap().remove(&number);
    }

    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Cancels `token` when `number` is fetched.
    pub fn cancel_on_block(&self, number: u64, token: CancellationToken) {
        *self.cancel_on_block.lock().unwrap() = Some((number, token));
    }

    pub fn range_queries(&self) -> Vec<(u64, u64)> {
        self.range_queries.lock().unwrap().clone()
    }

    pub fn block_fetches(&self) -> usize {
        self.block_fetches.load(Ordering::SeqCst)
    }

    /// Sender side of the next `subscribe` call.
    pub fn subscription(&self) -> mpsc::Sender<RawDepositEvent> {
        let (sender, receiver) = mpsc::channel(64);
        *self.subscription.lock().unwrap() = Some(receiver);
        sender
    }
}

#[async_trait]
impl DepositProvider for MockProvider {
    async fn subscribe(&self) -> Result<mpsc::Receiver<RawDepositEvent>, ProviderError> {
        self.subscription
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ProviderError::Subscription("no scripted subscription".to_owned()))
    }

    async fn query_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawDepositEvent>, ProviderError> {
        self.range_queries.lock().unwrap().push((from_block, to_block));
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(ProviderError::Rpc("get_logs unavailable".to_owned()));
        }
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| match event.block_number {
                Some(number) => (from_block..=to_block).contains(&number),
                // position-less logs still come back from a range query
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_block(&self, number: u64) -> Result<BlockMeta, ProviderError> {
        self.block_fetches.fetch_add(1, Ordering::SeqCst);
        if let Some((at, token)) = self.cancel_on_block.lock().unwrap().as_ref() {
            if *at == number {
                token.cancel();
            }
        }
        if self.failing_blocks.lock().unwrap().contains(&number) {
            return Err(ProviderError::Rpc(format!("block {} unavailable", number)));
        }
        Ok(block_meta(number))
    }

    async fn head_block(&self) -> Result<u64, ProviderError> {
        Ok(self.head.load(Ordering::SeqCst))
    }
}

struct InsertGate {
    entered: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
    fail: bool,
}

/// Unique on natural key, like the table's primary key.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<DepositRecord>>,
    fail_inserts: AtomicBool,
    gate: Mutex<Option<InsertGate>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Holds the next insert until the returned sender fires. The receiver
    /// resolves once that insert has started. With `fail` the held insert
    /// errors instead of writing.
    pub fn gate_next_insert(&self, fail: bool) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(InsertGate {
            entered: entered_tx,
            release: release_rx,
            fail,
        });
        (entered_rx, release_tx)
    }

    /// Stored rows in insertion order.
    pub fn records(&self) -> Vec<DepositRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn positions(&self) -> Vec<(u64, Option<u64>)> {
        self.records()
            .iter()
            .map(|r| (r.block_number, r.log_index))
            .collect()
    }
}

#[async_trait]
impl DepositStore for MemoryStore {
    async fn insert_many(
        &self,
        records: &[DepositRecord],
    ) -> Result<InsertSummary, PersistenceError> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.await;
            if gate.fail {
                return Err(connection_refused());
            }
        }
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(connection_refused());
        }
        let mut rows = self.rows.lock().unwrap();
        let mut count = 0;
        for record in records {
            if !rows.iter().any(|row| row.natural_key == record.natural_key) {
                rows.push(record.clone());
                count += 1;
            }
        }
        Ok(InsertSummary { count })
    }

    async fn query(&self, start: u64, size: u64) -> Result<Vec<DepositRecord>, PersistenceError> {
        let mut rows = self.records();
        rows.sort_by_key(|r| (r.block_number, r.log_index));
        Ok(rows
            .into_iter()
            .skip(start as usize)
            .take(size as usize)
            .collect())
    }
}

fn connection_refused() -> PersistenceError {
    PersistenceError::Db(DbErr::Custom("connection refused".to_owned()))
}

pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, message: String) {
        let _ = self.sender.send(message);
    }
}

/// Never completes.
pub struct PendingNotifier;

#[async_trait]
impl Notifier for PendingNotifier {
    async fn notify(&self, _message: String) {
        std::future::pending::<()>().await;
    }
}

pub fn controller(
    provider: Arc<MockProvider>,
    store: Arc<MemoryStore>,
) -> (IngestionController, mpsc::UnboundedReceiver<String>) {
    let (notifier, notifications) = ChannelNotifier::new();
    let controller = IngestionController::new(
        provider,
        store,
        Arc::new(notifier),
        RecentDepositCache::new(NonZeroUsize::new(4).unwrap(), Duration::from_secs(3600)),
    );
    (controller, notifications)
}
