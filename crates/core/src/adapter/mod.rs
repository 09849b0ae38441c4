//! Domain adapter - turns chain objects into storable records.
//!
//! Both functions are deterministic and perform no I/O. Inputs are borrowed
//! and never mutated, so they can be unit tested without a store.
//!
//! Normalization rules:
//!
//! - hashes, addresses, nonces and extra data: 0x-prefixed hex
//! - block number, difficulty, gas figures, value, price: decimal strings,
//!   which keeps 256-bit quantities exact in any backend
//! - payload bytes: copied verbatim

use alloy_consensus::transaction::SignerRecoverable;
use alloy_consensus::{Transaction, TxEnvelope};
use alloy_rlp::Encodable;

use crate::error::{DomainError, DomainResult};
use crate::models::{BlockRecord, RecordId, TransactionRecord};
use crate::ports::ChainBlock;

/// Normalize a chain block into a [`BlockRecord`].
///
/// The record has no identity yet and `processed` is `false`.
pub fn normalize_block(block: &ChainBlock) -> BlockRecord {
    let header = &block.header;

    BlockRecord {
        id: None,
        block_hash: header.hash_slow().to_string(),
        parent_hash: header.parent_hash.to_string(),
        uncle_hash: header.ommers_hash.to_string(),
        coinbase: header.beneficiary.to_string(),
        root: header.state_root.to_string(),
        tx_hash: header.transactions_root.to_string(),
        receipt_hash: header.receipts_root.to_string(),
        number: header.number.to_string(),
        difficulty: header.difficulty.to_string(),
        gas_limit: header.gas_limit.to_string(),
        gas_used: header.gas_used.to_string(),
        time: header.timestamp,
        tx_amount: block.body.transactions.len() as u64,
        extra: header.extra_data.to_string(),
        nonce: header.nonce.to_string(),
        storage_size: block.length().to_string(),
        mix_digest: header.mix_hash.to_string(),
        processed: false,
    }
}

/// Normalize a signed transaction into a [`TransactionRecord`].
///
/// Fails only when the sender cannot be recovered from the signature.
pub fn normalize_transaction(
    tx: &TxEnvelope,
    block_id: Option<RecordId>,
) -> DomainResult<TransactionRecord> {
    let tx_hash = tx.tx_hash().to_string();

    let from = tx
        .recover_signer()
        .map_err(|e| DomainError::SenderRecovery {
            tx_hash: tx_hash.clone(),
            reason: e.to_string(),
        })?;

    Ok(TransactionRecord {
        tx_hash,
        recipient: tx.to().map(|to| to.to_string()),
        from: from.to_string(),
        amount: tx.value().to_string(),
        price: effective_price(tx).to_string(),
        gas_limit: tx.gas_limit().to_string(),
        payload: tx.input().to_vec(),
        block_id,
    })
}

/// Gas price for legacy and access-list transactions, max fee per gas for
/// the fee-market families.
fn effective_price(tx: &TxEnvelope) -> u128 {
    tx.gas_price().unwrap_or_else(|| tx.max_fee_per_gas())
}
