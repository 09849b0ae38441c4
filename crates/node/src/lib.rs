//! Chain event sources for the Quarry importer.
//!
//! This crate implements the [`EventSource`] port from `quarry-core`.
//!
//! - [`EventMux`] - in-process publish/subscribe hub. Whatever runs the node
//!   posts [`ChainEvent`]s into it; the importer subscribes to it.
//! - [`RpcBlockFeed`] - follows an Ethereum JSON-RPC endpoint from its
//!   current head and posts every new block into a mux.
//!
//! # Usage
//!
//! ```ignore
//! use quarry_node::{EventMux, RpcBlockFeed, RpcFeedConfig};
//!
//! let mux = Arc::new(EventMux::with_capacity(64));
//! let feed = RpcBlockFeed::new(RpcFeedConfig::new(rpc_url), mux.clone());
//! tokio::spawn(feed.run(shutdown_rx));
//!
//! let importer = ImportCoordinator::new(mux, gateway, info_span!("importer"));
//! importer.run().await?;
//! ```
//!
//! [`EventSource`]: quarry_core::ports::EventSource
//! [`ChainEvent`]: quarry_core::ports::ChainEvent

mod feed;
mod mux;

pub use feed::{RpcBlockFeed, RpcFeedConfig};
pub use mux::{DEFAULT_CHANNEL_CAPACITY, EventMux};
