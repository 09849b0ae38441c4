//! Port trait for the chain event feed.
//!
//! This trait defines the subscribe/unsubscribe/receive contract the
//! importer needs from the node runtime. Implementations live in the
//! infrastructure layer (e.g., `quarry-node`).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use alloy_consensus::TxEnvelope;

use crate::error::ChainResult;

/// Full chain block as delivered by the node.
pub type ChainBlock = alloy_consensus::Block<TxEnvelope>;

/// Notification emitted by the node.
///
/// Adding a kind here forces every consumer to decide how to route it.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A new block was accepted into the chain.
    BlockObserved(Arc<ChainBlock>),
    /// A transaction entered the pending pool.
    PendingTransactionObserved(Arc<TxEnvelope>),
}

impl ChainEvent {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ChainEvent::BlockObserved(_) => "block",
            ChainEvent::PendingTransactionObserved(_) => "pending_transaction",
        }
    }
}

/// Stream of chain events. Ends when the source closes the channel.
pub type ChainEventStream = Pin<Box<dyn Stream<Item = ChainEvent> + Send>>;

/// Port trait for the chain event feed.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Open a subscription and return the stream of events.
    async fn subscribe(&self) -> ChainResult<ChainEventStream>;

    /// Release the subscription.
    ///
    /// Callers treat failures as best-effort.
    async fn unsubscribe(&self) -> ChainResult<()>;
}
