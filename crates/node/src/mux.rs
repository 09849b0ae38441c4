//! In-process chain event hub.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, trace};

use quarry_core::error::{ChainError, ChainResult};
use quarry_core::ports::{ChainEvent, ChainEventStream, EventSource};

/// Buffered events per subscription before `post` waits.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Single-subscriber event hub backed by a bounded channel.
///
/// Producers call [`EventMux::post`]; the importer consumes through the
/// [`EventSource`] port. Events posted while nobody is subscribed are dropped.
/// After [`EventMux::close`] the active stream ends and no new subscription
/// can be opened.
pub struct EventMux {
    capacity: usize,
    state: Mutex<MuxState>,
}

#[derive(Default)]
struct MuxState {
    sender: Option<mpsc::Sender<ChainEvent>>,
    closed: bool,
}

impl EventMux {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a mux whose subscriptions buffer `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(MuxState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MuxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an event to the current subscriber.
    ///
    /// Waits while the subscriber's buffer is full. Returns `Ok(false)` when
    /// there was nobody to deliver to.
    pub async fn post(&self, event: ChainEvent) -> ChainResult<bool> {
        let sender = {
            let state = self.lock();
            if state.closed {
                return Err(ChainError::Closed);
            }
            state.sender.clone()
        };

        let Some(sender) = sender else {
            trace!(kind = event.kind(), "No subscriber, event dropped");
            return Ok(false);
        };

        match sender.send(event).await {
            Ok(()) => Ok(true),
            Err(mpsc::error::SendError(event)) => {
                trace!(kind = event.kind(), "Subscriber gone, event dropped");
                let mut state = self.lock();
                if state
                    .sender
                    .as_ref()
                    .is_some_and(|current| current.same_channel(&sender))
                {
                    state.sender = None;
                }
                Ok(false)
            }
        }
    }

    /// Close the hub. The active stream ends once its buffer is drained.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            debug!("Event mux closed");
        }
        state.closed = true;
        state.sender = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl Default for EventMux {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for EventMux {
    async fn subscribe(&self) -> ChainResult<ChainEventStream> {
        let mut state = self.lock();
        if state.closed {
            return Err(ChainError::Closed);
        }
        if state.sender.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(ChainError::SubscriptionError(
                "event mux already has a subscriber".into(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.capacity);
        state.sender = Some(tx);
        debug!(capacity = self.capacity, "📡 Subscribed to event mux");

        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn unsubscribe(&self) -> ChainResult<()> {
        if self.lock().sender.take().is_some() {
            debug!("Unsubscribed from event mux");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use alloy_consensus::{Block, BlockBody, Header, TxEnvelope};
    use futures::StreamExt;

    fn block_event(number: u64) -> ChainEvent {
        let block: Block<TxEnvelope> = Block {
            header: Header {
                number,
                ..Default::default()
            },
            body: BlockBody {
                transactions: vec![],
                ommers: vec![],
                withdrawals: None,
            },
        };
        ChainEvent::BlockObserved(Arc::new(block))
    }

    fn number_of(event: &ChainEvent) -> u64 {
        match event {
            ChainEvent::BlockObserved(block) => block.header.number,
            other => panic!("unexpected event {}", other.kind()),
        }
    }

    #[tokio::test]
    async fn test_events_arrive_in_post_order() {
        let mux = EventMux::new();
        let mut stream = mux.subscribe().await.unwrap();

        for n in 1..=3 {
            assert!(mux.post(block_event(n)).await.unwrap());
        }

        for n in 1..=3 {
            assert_eq!(number_of(&stream.next().await.unwrap()), n);
        }
    }

    // Test critique: sans abonné, l'événement est perdu sans erreur
    #[tokio::test]
    async fn test_post_without_subscriber_drops_event() {
        let mux = EventMux::new();
        assert!(!mux.post(block_event(1)).await.unwrap());

        let mut stream = mux.subscribe().await.unwrap();
        mux.post(block_event(2)).await.unwrap();
        assert_eq!(number_of(&stream.next().await.unwrap()), 2);
    }

    #[tokio::test]
    async fn test_close_ends_stream_and_rejects_posts() {
        let mux = EventMux::new();
        let mut stream = mux.subscribe().await.unwrap();
        mux.post(block_event(1)).await.unwrap();

        mux.close();

        // Buffered events still drain before the stream ends
        assert_eq!(number_of(&stream.next().await.unwrap()), 1);
        assert!(stream.next().await.is_none());
        assert!(matches!(mux.post(block_event(2)).await, Err(ChainError::Closed)));
        assert!(matches!(mux.subscribe().await, Err(ChainError::Closed)));
        assert!(mux.is_closed());
    }

    #[tokio::test]
    async fn test_second_subscriber_rejected() {
        let mux = EventMux::new();
        let _stream = mux.subscribe().await.unwrap();
        assert!(matches!(
            mux.subscribe().await,
            Err(ChainError::SubscriptionError(_))
        ));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_and_allows_resubscribe() {
        let mux = EventMux::new();
        let mut first = mux.subscribe().await.unwrap();

        mux.unsubscribe().await.unwrap();
        mux.unsubscribe().await.unwrap();
        assert!(first.next().await.is_none());

        let mut second = mux.subscribe().await.unwrap();
        mux.post(block_event(7)).await.unwrap();
        assert_eq!(number_of(&second.next().await.unwrap()), 7);
    }

    #[tokio::test]
    async fn test_dropped_stream_counts_as_no_subscriber() {
        let mux = EventMux::new();
        let stream = mux.subscribe().await.unwrap();
        drop(stream);

        assert!(!mux.post(block_event(1)).await.unwrap());
        // Stale sender was cleared, a new subscriber is accepted
        assert!(mux.subscribe().await.is_ok());
    }

    // Test critique: le buffer borné applique la contre-pression
    #[tokio::test]
    async fn test_full_buffer_waits_for_consumer() {
        let mux = EventMux::with_capacity(1);
        let mut stream = mux.subscribe().await.unwrap();

        mux.post(block_event(1)).await.unwrap();
        let blocked = tokio::time::timeout(Duration::from_millis(50), mux.post(block_event(2))).await;
        assert!(blocked.is_err());

        assert_eq!(number_of(&stream.next().await.unwrap()), 1);
        mux.post(block_event(3)).await.unwrap();
        assert_eq!(number_of(&stream.next().await.unwrap()), 3);
    }
}
