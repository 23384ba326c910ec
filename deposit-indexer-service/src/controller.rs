//! Shared ingestion path for both producers.
//!
//! ```text
//!   LiveSubscriber ──┐
//!                    ├─► normalize ─► guard.admit ─► store.insert_many ─► cache.push ─► notify
//!   BackfillReconciler┘
//! ```
//!
//! Persistence failures are returned to the producer. The admission permit
//! is released on failure, so a re-run or a re-delivery can admit the same
//! key again.

use crate::cache::RecentDepositCache;
use crate::deposit::{BlockMeta, DepositRecord, IngestOutcome, RawDepositEvent};
use crate::error::{IncompleteEventError, IngestError, NoData, PersistenceError};
use crate::guard::{Admission, IdempotencyGuard};
use crate::normalizer;
use crate::notifier::Notifier;
use crate::provider::DepositProvider;
use crate::store::DepositStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What to do when another producer is still persisting the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlightPolicy {
    /// Report `Duplicate`; the holder's outcome is not the caller's concern.
    Skip,
    /// Wait for the holder, then persist the event if the holder failed.
    Wait,
}

pub struct IngestionController {
    provider: Arc<dyn DepositProvider>,
    store: Arc<dyn DepositStore>,
    notifier: Arc<dyn Notifier>,
    guard: IdempotencyGuard,
    cache: RecentDepositCache,
}

impl IngestionController {
    pub fn new(
        provider: Arc<dyn DepositProvider>,
        store: Arc<dyn DepositStore>,
        notifier: Arc<dyn Notifier>,
        cache: RecentDepositCache,
    ) -> Self {
        Self {
            provider,
            store,
            notifier,
            guard: IdempotencyGuard::new(),
            cache,
        }
    }

    pub fn provider(&self) -> &Arc<dyn DepositProvider> {
        &self.provider
    }

    /// Resolves the event's own block, then runs the shared path. A key
    /// another producer is still persisting is reported as `Duplicate`.
    pub async fn ingest_one(&self, raw: RawDepositEvent) -> Result<IngestOutcome, IngestError> {
        let block_number = normalizer::required_block_number(&raw).map_err(|error| {
            log_dropped(&raw, &error);
            error
        })?;
        let block = self.provider.get_block(block_number).await?;
        self.ingest_with_block(&raw, &block, InFlightPolicy::Skip).await
    }

    pub async fn ingest_with_block(
        &self,
        raw: &RawDepositEvent,
        block: &BlockMeta,
        in_flight: InFlightPolicy,
    ) -> Result<IngestOutcome, IngestError> {
        let record = normalizer::normalize(raw, block).map_err(|error| {
            log_dropped(raw, &error);
            error
        })?;

        let permit = loop {
            match self.guard.admit(&record.natural_key) {
                Admission::Accepted(permit) => break permit,
                Admission::Duplicate => return Ok(IngestOutcome::Duplicate),
                Admission::InFlight(pending) => match in_flight {
                    InFlightPolicy::Skip => return Ok(IngestOutcome::Duplicate),
                    InFlightPolicy::Wait => {
                        debug!("Waiting on in-flight deposit {}", record.natural_key);
                        pending.settled().await;
                    }
                },
            }
        };
        let summary = self.store.insert_many(std::slice::from_ref(&record)).await?;
        permit.commit();

        debug!("{} deposit keys tracked", self.guard.tracked());

        if summary.count == 0 {
            debug!("Deposit {} already stored", record.natural_key);
            return Ok(IngestOutcome::Duplicate);
        }

        info!(
            "New deposit - PubKey: {}, Amount: {:?} gwei, Block: {}, Key: {}",
            record.pubkey, record.amount_gwei, record.block_number, record.natural_key
        );
        self.cache.push(record.clone());
        self.dispatch_notification(&record);
        Ok(IngestOutcome::Persisted(record))
    }

    pub async fn get_history(
        &self,
        start: u64,
        size: u64,
    ) -> Result<Vec<DepositRecord>, PersistenceError> {
        self.store.query(start, size).await
    }

    pub fn get_realtime(&self) -> Result<DepositRecord, NoData> {
        self.cache.most_recent()
    }

    fn dispatch_notification(&self, record: &DepositRecord) {
        let notifier = self.notifier.clone();
        let message = record.notification_message();
        tokio::spawn(async move {
            notifier.notify(message).await;
        });
    }
}

pub(crate) fn log_dropped(raw: &RawDepositEvent, error: &IncompleteEventError) {
    warn!(
        target: "data_quality",
        "Dropping deposit event at block {:?} tx {:?} log {:?}: {}",
        raw.block_number,
        raw.transaction_hash,
        raw.log_index,
        error
    );
}
