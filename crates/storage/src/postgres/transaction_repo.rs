//! Transaction collection for PostgreSQL.

use sqlx::PgPool;

use quarry_core::error::StorageResult;
use quarry_core::models::TransactionRecord;

use super::helpers::query_error;

/// PostgreSQL access to the `transactions` table.
pub struct PgTransactionRepository {
    pool: PgPool,
}

impl PgTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a transaction record. `block_id` is not checked.
    pub async fn insert(&self, tx: &TransactionRecord) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO transactions (
                tx_hash, recipient, "from", amount, price, gas_limit, payload, block_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&tx.tx_hash)
        .bind(&tx.recipient)
        .bind(&tx.from)
        .bind(&tx.amount)
        .bind(&tx.price)
        .bind(&tx.gas_limit)
        .bind(&tx.payload)
        .bind(tx.block_id.map(|id| id.0))
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }
}
