//! PostgreSQL storage adapter.
//!
//! This module implements the persistence gateway defined in `quarry-core`
//! using PostgreSQL as the backing store.
//!
//! # Architecture
//!
//! - [`Database`] - Connection pool and migrations
//! - [`PgGateway`] - Composite gateway implementing `PersistenceGateway`
//! - Individual repos: `PgBlockRepository`, `PgTransactionRepository`
//!
//! Every statement runs on the pool directly, outside any transaction, so
//! a block is visible to `find_block_by_hash` as soon as its insert returns.

mod block_repo;
mod database;
mod helpers;
mod transaction_repo;

pub use block_repo::PgBlockRepository;
pub use database::{Database, DatabaseConfig};
pub use transaction_repo::PgTransactionRepository;

use async_trait::async_trait;
use tracing::trace;

use quarry_core::error::StorageResult;
use quarry_core::models::{BlockRecord, TransactionRecord};
use quarry_core::ports::PersistenceGateway;

// =============================================================================
// Composite Gateway
// =============================================================================

/// PostgreSQL implementation of the `PersistenceGateway` trait.
pub struct PgGateway {
    blocks: PgBlockRepository,
    transactions: PgTransactionRepository,
}

impl PgGateway {
    /// Create a gateway over a database connection pool.
    pub fn new(db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            blocks: PgBlockRepository::new(pool.clone()),
            transactions: PgTransactionRepository::new(pool),
        }
    }
}

#[async_trait]
impl PersistenceGateway for PgGateway {
    async fn insert_block(&self, record: &BlockRecord) -> StorageResult<()> {
        trace!(hash = %record.block_hash, "INSERT blocks");
        self.blocks.insert(record).await
    }

    async fn find_block_by_hash(&self, hash: &str) -> StorageResult<Option<BlockRecord>> {
        trace!(hash, "SELECT blocks");
        self.blocks.find_by_hash(hash).await
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> StorageResult<()> {
        trace!(tx = %record.tx_hash, "INSERT transactions");
        self.transactions.insert(record).await
    }
}
