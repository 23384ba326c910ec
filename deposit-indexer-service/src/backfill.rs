use crate::controller::{log_dropped, InFlightPolicy, IngestionController};
use crate::deposit::{BlockMeta, IngestOutcome, RawDepositEvent};
use crate::error::{BackfillError, IngestError};
use crate::normalizer;
use crate::provider::MAX_BLOCK_RANGE;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// Events returned by the provider for the range.
    pub discovered: usize,
    pub persisted: usize,
    pub duplicates: usize,
    pub dropped: usize,
}

/// Replays a historical block range through the shared ingestion path.
/// Holds no progress cursor; a failed range is re-run as a whole.
pub struct BackfillReconciler {
    controller: Arc<IngestionController>,
}

impl BackfillReconciler {
    pub fn new(controller: Arc<IngestionController>) -> Self {
        Self { controller }
    }

    /// Runs [`Self::reconcile_to_head`] on its own task so `cancel` can be
    /// triggered while it is in progress. The outcome is logged when the
    /// task ends; live ingestion is unaffected by a failed run.
    pub fn spawn_to_head(
        self,
        from_block: u64,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<BackfillReport, BackfillError>> {
        tokio::spawn(async move {
            let result = self.reconcile_to_head(from_block, &cancel).await;
            match &result {
                Ok(report) => info!("Backfill from block {} finished: {:?}", from_block, report),
                Err(BackfillError::Cancelled { persisted }) => info!(
                    "Backfill from block {} cancelled after {} deposits",
                    from_block, persisted
                ),
                Err(backfill_error) => error!(
                    "Backfill from block {} failed, re-run to resume: {}",
                    from_block, backfill_error
                ),
            }
            result
        })
    }

    pub async fn reconcile_to_head(
        &self,
        from_block: u64,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, BackfillError> {
        let head = self.controller.provider().head_block().await?;
        self.reconcile(from_block, head, cancel).await
    }

    /// Fetches and ingests one `MAX_BLOCK_RANGE` chunk at a time, in
    /// ascending block order, so earlier chunks are persisted before later
    /// ones are requested.
    pub async fn reconcile(
        &self,
        from_block: u64,
        to_block: u64,
        cancel: &CancellationToken,
    ) -> Result<BackfillReport, BackfillError> {
        if from_block > to_block {
            return Err(BackfillError::InvalidRange {
                from: from_block,
                to: to_block,
            });
        }
        info!("Backfilling deposits in blocks {}..={}", from_block, to_block);

        let mut run = RangeRun {
            report: BackfillReport::default(),
            current_block: None,
        };
        let mut start = from_block;
        loop {
            let end = to_block.min(start.saturating_add(MAX_BLOCK_RANGE - 1));
            if let Err(backfill_error) = self.reconcile_chunk(start, end, cancel, &mut run).await {
                warn!(
                    "Backfill {}..={} failed in chunk {}..={}: {} ({:?})",
                    from_block, to_block, start, end, backfill_error, run.report
                );
                return Err(backfill_error);
            }
            if end == to_block {
                break;
            }
            start = end + 1;
        }

        info!(
            "Backfill {}..={} done: {:?}",
            from_block, to_block, run.report
        );
        Ok(run.report)
    }

    async fn reconcile_chunk(
        &self,
        start: u64,
        end: u64,
        cancel: &CancellationToken,
        run: &mut RangeRun,
    ) -> Result<(), BackfillError> {
        if cancel.is_cancelled() {
            return Err(run.cancelled());
        }
        let mut events = self.controller.provider().query_range(start, end).await?;
        // stable: equal positions keep provider order
        events.sort_by_key(|event| (event.block_number, event.log_index));
        debug!("{} deposit events in {}..={}", events.len(), start, end);
        run.report.discovered += events.len();

        for raw in events {
            if cancel.is_cancelled() {
                return Err(run.cancelled());
            }
            self.reconcile_event(raw, run).await?;
        }
        Ok(())
    }

    async fn reconcile_event(
        &self,
        raw: RawDepositEvent,
        run: &mut RangeRun,
    ) -> Result<(), BackfillError> {
        let block_number = match normalizer::required_block_number(&raw) {
            Ok(number) => number,
            Err(incomplete) => {
                log_dropped(&raw, &incomplete);
                run.report.dropped += 1;
                return Ok(());
            }
        };
        let block = match run.current_block {
            Some((number, ref block)) if number == block_number => block.clone(),
            _ => {
                let block = self.controller.provider().get_block(block_number).await?;
                run.current_block = Some((block_number, block.clone()));
                block
            }
        };

        match self
            .controller
            .ingest_with_block(&raw, &block, InFlightPolicy::Wait)
            .await
        {
            Ok(IngestOutcome::Persisted(_)) => run.report.persisted += 1,
            Ok(IngestOutcome::Duplicate) => run.report.duplicates += 1,
            Err(IngestError::IncompleteEvent(_)) => run.report.dropped += 1,
            Err(IngestError::Provider(provider_error)) => {
                return Err(BackfillError::Provider(provider_error))
            }
            Err(IngestError::Persistence(persistence_error)) => {
                error!(
                    "Backfill stopped at block {}: {}",
                    block_number, persistence_error
                );
                return Err(BackfillError::Persistence(persistence_error));
            }
        }
        Ok(())
    }
}

struct RangeRun {
    report: BackfillReport,
    // consecutive events in one block share a lookup
    current_block: Option<(u64, BlockMeta)>,
}

impl RangeRun {
    fn cancelled(&self) -> BackfillError {
        BackfillError::Cancelled {
            persisted: self.report.persisted,
        }
    }
}
