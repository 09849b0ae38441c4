//! JSON-RPC block feed.
//!
//! Polls an Ethereum node over HTTP, starting at its head when the feed
//! starts, and posts every new block into an [`EventMux`].

use std::sync::Arc;
use std::time::Duration;

use alloy_consensus::{BlockBody, Header};
use alloy_eips::{BlockId, BlockNumberOrTag};
use alloy_provider::{Provider, RootProvider};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use url::Url;

use quarry_core::error::{ChainError, ChainResult};
use quarry_core::ports::{ChainBlock, ChainEvent};

use crate::mux::EventMux;

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Configuration for the RPC block feed.
#[derive(Debug, Clone)]
pub struct RpcFeedConfig {
    /// HTTP JSON-RPC endpoint (e.g., "http://127.0.0.1:8545").
    pub rpc_url: Url,
    /// Delay between head polls when the feed is caught up.
    pub poll_interval: Duration,
}

impl RpcFeedConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// Follows a node's chain head and republishes blocks as [`ChainEvent`]s.
pub struct RpcBlockFeed {
    provider: RootProvider,
    mux: Arc<EventMux>,
    poll_interval: Duration,
}

impl RpcBlockFeed {
    pub fn new(config: RpcFeedConfig, mux: Arc<EventMux>) -> Self {
        Self {
            provider: RootProvider::new_http(config.rpc_url),
            mux,
            poll_interval: config.poll_interval,
        }
    }

    /// Poll until shutdown is signalled, then close the mux.
    ///
    /// RPC failures are retried with exponential backoff. The loop also
    /// stops when the mux is closed by someone else.
    #[instrument(skip_all, name = "rpc_feed")]
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut next_block: Option<u64> = None;
        let mut retry_delay = INITIAL_RETRY_DELAY;

        info!("🚀 Block feed started");

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                break;
            }

            let polled = tokio::select! {
                result = self.poll(&mut next_block) => result,
                _ = shutdown_rx.changed() => continue,
            };

            let delay = match polled {
                Ok(posted) => {
                    if posted > 0 {
                        debug!(posted, next = ?next_block, "Blocks published");
                    }
                    retry_delay = INITIAL_RETRY_DELAY;
                    self.poll_interval
                }
                Err(ChainError::Closed) => {
                    debug!("Event mux closed, stopping feed");
                    break;
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_ms = retry_delay.as_millis(),
                        "⚠️  Block poll failed, retrying..."
                    );
                    let delay = retry_delay;
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown channel dropped");
                        break;
                    }
                }
            }
        }

        self.mux.close();
        info!("🛑 Block feed stopped");
    }

    /// Publish every block between `next_block` and the current head.
    ///
    /// On the first call the feed starts at the head itself. Returns the
    /// number of blocks posted.
    async fn poll(&self, next_block: &mut Option<u64>) -> ChainResult<usize> {
        let head = self
            .provider
            .get_block_number()
            .await
            .map_err(|e| {
                if e.is_transport_error() {
                    ChainError::ConnectionFailed(e.to_string())
                } else {
                    ChainError::RpcError(e.to_string())
                }
            })?;

        let start = *next_block.get_or_insert(head);
        let mut posted = 0;

        for number in start..=head {
            let block = self.fetch_block(number).await?;
            self.mux
                .post(ChainEvent::BlockObserved(Arc::new(block)))
                .await?;
            *next_block = Some(number + 1);
            posted += 1;
        }

        Ok(posted)
    }

    async fn fetch_block(&self, number: u64) -> ChainResult<ChainBlock> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(number))
            .full()
            .await
            .map_err(|e| ChainError::BlockFetchError {
                number,
                message: e.to_string(),
            })?
            .ok_or_else(|| ChainError::BlockFetchError {
                number,
                message: "block not found".into(),
            })?;

        let ommers = self.fetch_ommers(number, &block).await?;
        into_chain_block(number, block, ommers)
    }

    /// Fetch the full uncle headers of a block, in the block's uncle order.
    ///
    /// RPC blocks only list uncle hashes; the headers are part of the
    /// encoded block and of its size.
    async fn fetch_ommers(
        &self,
        number: u64,
        block: &alloy_rpc_types_eth::Block,
    ) -> ChainResult<Vec<Header>> {
        let mut ommers = Vec::with_capacity(block.uncles.len());

        for index in 0..block.uncles.len() {
            let uncle = self
                .provider
                .get_uncle(BlockId::hash(block.header.hash), index as u64)
                .await
                .map_err(|e| ChainError::BlockFetchError {
                    number,
                    message: format!("uncle {}: {}", index, e),
                })?
                .ok_or_else(|| ChainError::BlockFetchError {
                    number,
                    message: format!("uncle {} not found", index),
                })?;
            ommers.push(uncle.header.inner);
        }

        Ok(ommers)
    }
}

/// Convert an RPC block with full transactions into a consensus block.
///
/// `ommers` must be the headers of `block.uncles`, in the same order.
fn into_chain_block(
    number: u64,
    block: alloy_rpc_types_eth::Block,
    ommers: Vec<Header>,
) -> ChainResult<ChainBlock> {
    if block.transactions.is_hashes() && !block.transactions.is_empty() {
        return Err(ChainError::BlockFetchError {
            number,
            message: "node returned transaction hashes instead of bodies".into(),
        });
    }

    let ommer_hashes: Vec<_> = ommers.iter().map(Header::hash_slow).collect();
    if ommer_hashes != block.uncles {
        return Err(ChainError::BlockFetchError {
            number,
            message: format!(
                "uncle headers do not match the {} listed uncle hashes",
                block.uncles.len()
            ),
        });
    }

    let transactions = block
        .transactions
        .into_transactions()
        .map(|tx| tx.inner.into_inner())
        .collect();

    Ok(ChainBlock {
        header: block.header.inner,
        body: BlockBody {
            transactions,
            ommers,
            withdrawals: block.withdrawals,
        },
    })
}
