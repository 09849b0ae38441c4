//! Storable records produced by the importer.
//!
//! Records are flat and storage-agnostic: every hash is a 0x-prefixed hex
//! string and every quantity that can exceed 64 bits is a decimal string,
//! so no backend has to deal with 256-bit integers. Serde names are the
//! document keys of the `blocks` and `transactions` collections.

use serde::{Deserialize, Serialize};

// =============================================================================
// Record Identity
// =============================================================================

/// Opaque identity assigned by the store when a block record is inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

// =============================================================================
// Blocks
// =============================================================================

/// One record per observed chain block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Store-assigned identity, `None` until inserted.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    /// Block hash (natural key).
    pub block_hash: String,
    pub parent_hash: String,
    /// Hash of the uncle (ommers) list.
    pub uncle_hash: String,
    /// Beneficiary of the block rewards.
    #[serde(rename = "coin_base")]
    pub coinbase: String,
    /// State root.
    pub root: String,
    /// Transactions root.
    pub tx_hash: String,
    /// Receipts root.
    pub receipt_hash: String,
    pub number: String,
    pub difficulty: String,
    pub gas_limit: String,
    pub gas_used: String,
    /// Block timestamp in seconds.
    pub time: u64,
    /// Number of transactions contained in the block.
    pub tx_amount: u64,
    /// Extra data, hex encoded.
    pub extra: String,
    pub nonce: String,
    /// RLP-encoded size of the block in bytes.
    pub storage_size: String,
    pub mix_digest: String,
    /// Reserved for downstream consumers; always `false` when imported.
    pub processed: bool,
}

// =============================================================================
// Transactions
// =============================================================================

/// One record per transaction of an imported block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Transaction hash (natural key).
    pub tx_hash: String,
    /// Recipient, `None` for contract creation.
    pub recipient: Option<String>,
    /// Sender recovered from the signature.
    pub from: String,
    /// Transferred value in wei.
    pub amount: String,
    /// Gas price (or max fee per gas) in wei.
    pub price: String,
    pub gas_limit: String,
    /// Raw call data.
    pub payload: Vec<u8>,
    /// Owning block, `None` only for pending transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_id: Option<RecordId>,
}

impl TransactionRecord {
    /// Whether this transaction deploys a contract.
    pub fn is_contract_creation(&self) -> bool {
        self.recipient.is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================
