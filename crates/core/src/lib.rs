//! Core domain layer for the Quarry chain importer.
//!
//! This crate contains the storable record models, the port traits the
//! importer depends on, the pure domain adapter and the import coordinator.
//! It follows hexagonal architecture principles - infrastructure (the
//! database, the node feed) lives in other crates and plugs in through the
//! ports defined here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      quarry (binary)                        │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │        quarry-storage        │         quarry-node          │
//! │         (PostgreSQL)         │   (event mux + RPC feed)     │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                   quarry-core  ← YOU ARE HERE               │
//! │         (models, ports, adapter, import coordinator)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`models`] - Storable records (BlockRecord, TransactionRecord)
//! - [`ports`] - Interface traits for adapters to implement
//! - [`adapter`] - Pure chain object to record normalization
//! - [`services`] - Import coordinator
//! - [`error`] - Error types per layer
//! - [`metrics`] - Prometheus metrics definitions
//!
//! # Ports
//!
//! - [`ports::EventSource`] - Subscribe to a stream of [`ports::ChainEvent`]s
//! - [`ports::PersistenceGateway`] - Append blocks and transactions, look
//!   blocks up by hash
//!
//! # Import Lifecycle
//!
//! 1. Subscribe to the event source
//! 2. For each block event, normalize and insert the block
//! 3. Read the block back by hash to learn its store-assigned id
//! 4. Normalize and insert every transaction with that id
//! 5. Unsubscribe once the channel closes or a fatal error occurs

pub mod adapter;
pub mod error;
pub mod metrics;
pub mod models;
pub mod ports;
pub mod services;

#[cfg(test)]
pub(crate) mod test_utils;
