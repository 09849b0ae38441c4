//! Block collection for PostgreSQL.

use sqlx::PgPool;

use quarry_core::error::StorageResult;
use quarry_core::models::{BlockRecord, RecordId};

use super::helpers::{non_negative, query_error, to_bigint};

/// PostgreSQL access to the `blocks` table.
pub struct PgBlockRepository {
    pool: PgPool,
}

impl PgBlockRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a block record. A duplicate `block_hash` is a constraint violation.
    pub async fn insert(&self, block: &BlockRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO blocks (
                block_hash, parent_hash, uncle_hash, coin_base, root, tx_hash,
                receipt_hash, number, difficulty, gas_limit, gas_used, time,
                tx_amount, extra, nonce, storage_size, mix_digest, processed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(&block.block_hash)
        .bind(&block.parent_hash)
        .bind(&block.uncle_hash)
        .bind(&block.coinbase)
        .bind(&block.root)
        .bind(&block.tx_hash)
        .bind(&block.receipt_hash)
        .bind(&block.number)
        .bind(&block.difficulty)
        .bind(&block.gas_limit)
        .bind(&block.gas_used)
        .bind(to_bigint(block.time, "block.time")?)
        .bind(to_bigint(block.tx_amount, "block.tx_amount")?)
        .bind(&block.extra)
        .bind(&block.nonce)
        .bind(&block.storage_size)
        .bind(&block.mix_digest)
        .bind(block.processed)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    pub async fn find_by_hash(&self, hash: &str) -> StorageResult<Option<BlockRecord>> {
        let row = sqlx::query_as::<_, BlockRow>(
            r#"
            SELECT id, block_hash, parent_hash, uncle_hash, coin_base, root, tx_hash,
                   receipt_hash, number, difficulty, gas_limit, gas_used, time,
                   tx_amount, extra, nonce, storage_size, mix_digest, processed
            FROM blocks
            WHERE block_hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(BlockRow::into_record).transpose()
    }
}

/// Database row representation for a block.
#[derive(sqlx::FromRow)]
struct BlockRow {
    id: i64,
    block_hash: String,
    parent_hash: String,
    uncle_hash: String,
    coin_base: String,
    root: String,
    tx_hash: String,
    receipt_hash: String,
    number: String,
    difficulty: String,
    gas_limit: String,
    gas_used: String,
    time: i64,
    tx_amount: i64,
    extra: String,
    nonce: String,
    storage_size: String,
    mix_digest: String,
    processed: bool,
}

impl BlockRow {
    fn into_record(self) -> StorageResult<BlockRecord> {
        Ok(BlockRecord {
            id: Some(RecordId(self.id)),
            block_hash: self.block_hash,
            parent_hash: self.parent_hash,
            uncle_hash: self.uncle_hash,
            coinbase: self.coin_base,
            root: self.root,
            tx_hash: self.tx_hash,
            receipt_hash: self.receipt_hash,
            number: self.number,
            difficulty: self.difficulty,
            gas_limit: self.gas_limit,
            gas_used: self.gas_used,
            time: non_negative(self.time, "block.time")?,
            tx_amount: non_negative(self.tx_amount, "block.tx_amount")?,
            extra: self.extra,
            nonce: self.nonce,
            storage_size: self.storage_size,
            mix_digest: self.mix_digest,
            processed: self.processed,
        })
    }
}
