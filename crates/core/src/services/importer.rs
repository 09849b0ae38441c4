//! Import coordinator - turns chain events into persisted records.
//!
//! Events are handled strictly one at a time, in delivery order. A block is
//! inserted, read back by hash to learn its store-assigned id, and only then
//! are its transactions inserted with that id. Sequential handling is what
//! guarantees the block-before-transactions ordering; there is no worker
//! pool and no per-event timeout.
//!
//! # Failure policy
//!
//! | Failure | Policy |
//! |---|---|
//! | block insert | log, drop the block and its transactions, continue |
//! | transaction insert | log, drop the transaction, continue |
//! | lookup right after a successful insert | fatal |
//! | sender recovery | fatal |
//! | unsubscribe | log only |

use std::sync::Arc;

use alloy_consensus::TxEnvelope;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{Instrument, Span, debug, error, info, instrument, trace, warn};

use crate::adapter::{normalize_block, normalize_transaction};
use crate::error::{ImporterError, ImporterResult};
use crate::metrics::{
    ProcessingTimer, record_block_imported, record_insert_failure, record_pending_ignored,
    record_transaction_imported,
};
use crate::models::RecordId;
use crate::ports::{ChainBlock, ChainEvent, ChainEventStream, EventSource, PersistenceGateway};

/// Lifecycle of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterState {
    /// Subscribed and consuming events.
    Running,
    /// Not subscribed. Initial state, and final state after the channel
    /// closed or a fatal error.
    Stopped,
}

/// Sequential importer from an [`EventSource`] into a [`PersistenceGateway`].
///
/// The coordinator owns its gateway for its whole lifetime; nothing else
/// writes through it. Logging goes through the span given at construction,
/// which wraps every record the coordinator emits.
pub struct ImportCoordinator<S: EventSource, G: PersistenceGateway> {
    source: Arc<S>,
    gateway: G,
    span: Span,
    state: watch::Sender<ImporterState>,
}

impl<S: EventSource, G: PersistenceGateway> ImportCoordinator<S, G> {
    pub fn new(source: Arc<S>, gateway: G, span: Span) -> Self {
        let (state, _) = watch::channel(ImporterState::Stopped);
        Self {
            source,
            gateway,
            span,
            state,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ImporterState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ImporterState> {
        self.state.subscribe()
    }

    /// The gateway this coordinator writes through.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Subscribe and import events until the channel closes.
    ///
    /// Returns `Ok(())` on a clean close. Any error is fatal: the loop has
    /// already stopped and the subscription has been released.
    pub async fn run(&self) -> ImporterResult<()> {
        self.run_subscribed().instrument(self.span.clone()).await
    }

    async fn run_subscribed(&self) -> ImporterResult<()> {
        info!("⛓️  Starting importer");

        let mut events = self.source.subscribe().await?;
        self.state.send_replace(ImporterState::Running);
        debug!("📡 Subscription established");

        let result = self.consume(&mut events).await;
        drop(events);

        if let Err(e) = self.source.unsubscribe().await {
            warn!(error = %e, "⚠️  Unsubscribe failed");
        }
        self.state.send_replace(ImporterState::Stopped);

        match &result {
            Ok(()) => info!("🛑 Event channel closed, importer stopped"),
            Err(e) => error!(error = %e, "❌ Importer halted"),
        }
        result
    }

    async fn consume(&self, events: &mut ChainEventStream) -> ImporterResult<()> {
        while let Some(event) = events.next().await {
            trace!(kind = event.kind(), "Event received");
            match event {
                ChainEvent::BlockObserved(block) => {
                    self.handle_block_event(&block).await?;
                }
                ChainEvent::PendingTransactionObserved(tx) => {
                    self.handle_pending_transaction(&tx);
                }
            }
        }
        Ok(())
    }

    /// Import one block and its transactions.
    ///
    /// Returns the block's store id, or `None` when the store refused the
    /// block and the event was dropped.
    #[instrument(skip_all, fields(block = block.header.number))]
    pub async fn handle_block_event(&self, block: &ChainBlock) -> ImporterResult<Option<RecordId>> {
        let timer = ProcessingTimer::new();
        let record = normalize_block(block);
        debug!(
            hash = %record.block_hash,
            transactions = record.tx_amount,
            "Importing block"
        );

        if let Err(e) = self.gateway.insert_block(&record).await {
            error!(hash = %record.block_hash, error = %e, "❌ Block insert failed, skipping block");
            record_insert_failure("block");
            return Ok(None);
        }

        let block_id = match self.gateway.find_block_by_hash(&record.block_hash).await {
            Ok(Some(stored)) => stored.id.ok_or_else(|| ImporterError::BlockLookup {
                hash: record.block_hash.clone(),
                reason: "stored record has no id".to_string(),
            })?,
            Ok(None) => {
                return Err(ImporterError::BlockLookup {
                    hash: record.block_hash,
                    reason: "not found".to_string(),
                });
            }
            Err(e) => {
                return Err(ImporterError::BlockLookup {
                    hash: record.block_hash,
                    reason: e.to_string(),
                });
            }
        };

        let mut imported = 0u64;
        for tx in &block.body.transactions {
            if self.handle_transaction(tx, block_id).await? {
                imported += 1;
            }
        }

        record_block_imported();
        timer.finish();
        info!(
            hash = %record.block_hash,
            id = %block_id,
            transactions = imported,
            dropped = record.tx_amount - imported,
            "⛓️  Block imported"
        );
        Ok(Some(block_id))
    }

    /// Import one transaction of an already stored block.
    ///
    /// Returns `false` when the store refused the record.
    pub async fn handle_transaction(&self, tx: &TxEnvelope, block_id: RecordId) -> ImporterResult<bool> {
        let record = normalize_transaction(tx, Some(block_id))?;
        trace!(tx = %record.tx_hash, "Importing transaction");

        match self.gateway.insert_transaction(&record).await {
            Ok(()) => {
                record_transaction_imported();
                Ok(true)
            }
            Err(e) => {
                error!(tx = %record.tx_hash, error = %e, "❌ Transaction insert failed, skipping");
                record_insert_failure("transaction");
                Ok(false)
            }
        }
    }

    /// Pending transactions are not imported.
    pub fn handle_pending_transaction(&self, tx: &TxEnvelope) {
        trace!(tx = %tx.tx_hash(), "Pending transaction ignored");
        record_pending_ignored();
    }
}
