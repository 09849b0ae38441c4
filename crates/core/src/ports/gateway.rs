//! Port trait for the persistence gateway.
//!
//! This is the storage interface used by the import coordinator.
//! Implementations live in the infrastructure layer (e.g., `quarry-storage`).

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{BlockRecord, TransactionRecord};

/// Append-only access to the `blocks` and `transactions` collections.
///
/// # Contract
///
/// - `find_block_by_hash` must observe a prior successful `insert_block`
///   made through the same gateway (read-after-write consistency).
/// - `insert_transaction` does not check that `block_id` exists; the
///   coordinator guarantees it by inserting the block first.
/// - There is no update, delete or upsert.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Append a block record. The store assigns its identity.
    async fn insert_block(&self, record: &BlockRecord) -> StorageResult<()>;

    /// Look a block up by its natural key, with its identity set.
    async fn find_block_by_hash(&self, hash: &str) -> StorageResult<Option<BlockRecord>>;

    /// Append a transaction record.
    async fn insert_transaction(&self, record: &TransactionRecord) -> StorageResult<()>;
}
