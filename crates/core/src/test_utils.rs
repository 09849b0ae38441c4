//! Test doubles shared by the unit tests of this crate.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use alloy_consensus::{BlockBody, Header, Signed, TxEip1559, TxEnvelope, TxLegacy};
use alloy_primitives::{Address, B256, Bytes, Signature, TxKind, U256};
use async_trait::async_trait;
use metrics::{
    Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};

use crate::error::{ChainError, ChainResult, StorageError, StorageResult};
use crate::models::{BlockRecord, RecordId, TransactionRecord};
use crate::ports::{ChainBlock, ChainEvent, ChainEventStream, EventSource, PersistenceGateway};

// =============================================================================
// Chain objects
// =============================================================================

/// Deterministic transaction hash for test transaction `n`.
pub(crate) fn tx_hash(n: u8) -> B256 {
    B256::with_last_byte(n)
}

pub(crate) fn legacy_tx(n: u8, to: Option<Address>, value: U256) -> TxEnvelope {
    let tx = TxLegacy {
        chain_id: Some(1),
        nonce: n as u64,
        gas_price: 20_000_000_000,
        gas_limit: 21_000,
        to: to.map(TxKind::Call).unwrap_or(TxKind::Create),
        value,
        input: Bytes::from_static(&[0xca, 0xfe]),
    };
    TxEnvelope::Legacy(Signed::new_unchecked(tx, Signature::test_signature(), tx_hash(n)))
}

pub(crate) fn eip1559_tx(n: u8, to: Address, max_fee_per_gas: u128) -> TxEnvelope {
    let tx = TxEip1559 {
        chain_id: 1,
        nonce: n as u64,
        gas_limit: 21_000,
        max_fee_per_gas,
        max_priority_fee_per_gas: 1_000_000_000,
        to: TxKind::Call(to),
        ..Default::default()
    };
    TxEnvelope::Eip1559(Signed::new_unchecked(tx, Signature::test_signature(), tx_hash(n)))
}

/// Transaction whose signature scalars are zero; recovery always fails.
pub(crate) fn unsigned_tx(n: u8) -> TxEnvelope {
    let tx = TxLegacy { nonce: n as u64, ..Default::default() };
    let sig = Signature::new(U256::ZERO, U256::ZERO, false);
    TxEnvelope::Legacy(Signed::new_unchecked(tx, sig, tx_hash(n)))
}

pub(crate) fn block_with(header: Header, transactions: Vec<TxEnvelope>) -> ChainBlock {
    ChainBlock {
        header,
        body: BlockBody { transactions, ommers: Vec::new(), withdrawals: None },
    }
}

/// Block at `number` carrying `transactions`.
pub(crate) fn block_at(number: u64, transactions: Vec<TxEnvelope>) -> ChainBlock {
    block_with(Header { number, gas_limit: 30_000_000, ..Default::default() }, transactions)
}

// =============================================================================
// In-memory gateway
// =============================================================================

#[derive(Default)]
struct MemoryState {
    blocks: Vec<BlockRecord>,
    transactions: Vec<TransactionRecord>,
    next_id: i64,
    lookups: usize,
}

/// In-memory gateway with failure injection.
///
/// Mirrors the PostgreSQL gateway: sequential ids and a unique block hash.
#[derive(Default)]
pub(crate) struct MemoryGateway {
    state: Mutex<MemoryState>,
    fail_block_inserts: bool,
    fail_lookups: bool,
    lose_writes: bool,
    failing_transactions: HashSet<String>,
}

impl MemoryGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_block_inserts(mut self) -> Self {
        self.fail_block_inserts = true;
        self
    }

    pub(crate) fn failing_lookups(mut self) -> Self {
        self.fail_lookups = true;
        self
    }

    /// Accept block inserts without storing them, so lookups miss.
    pub(crate) fn losing_writes(mut self) -> Self {
        self.lose_writes = true;
        self
    }

    pub(crate) fn failing_transaction(mut self, hash: B256) -> Self {
        self.failing_transactions.insert(hash.to_string());
        self
    }

    pub(crate) fn blocks(&self) -> Vec<BlockRecord> {
        self.state.lock().unwrap().blocks.clone()
    }

    pub(crate) fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub(crate) fn lookups(&self) -> usize {
        self.state.lock().unwrap().lookups
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn insert_block(&self, record: &BlockRecord) -> StorageResult<()> {
        if self.fail_block_inserts {
            return Err(StorageError::QueryError("block insert refused".into()));
        }
        let mut state = self.state.lock().unwrap();
        if state.blocks.iter().any(|b| b.block_hash == record.block_hash) {
            return Err(StorageError::ConstraintViolation(format!(
                "duplicate block_hash {}",
                record.block_hash
            )));
        }
        if self.lose_writes {
            return Ok(());
        }
        state.next_id += 1;
        let mut stored = record.clone();
        stored.id = Some(RecordId(state.next_id));
        state.blocks.push(stored);
        Ok(())
    }

    async fn find_block_by_hash(&self, hash: &str) -> StorageResult<Option<BlockRecord>> {
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        if self.fail_lookups {
            return Err(StorageError::QueryError("replica unavailable".into()));
        }
        Ok(state.blocks.iter().find(|b| b.block_hash == hash).cloned())
    }

    async fn insert_transaction(&self, record: &TransactionRecord) -> StorageResult<()> {
        if self.failing_transactions.contains(&record.tx_hash) {
            return Err(StorageError::QueryError(format!(
                "transaction insert refused for {}",
                record.tx_hash
            )));
        }
        self.state.lock().unwrap().transactions.push(record.clone());
        Ok(())
    }
}

// =============================================================================
// Scripted event source
// =============================================================================

/// Event source replaying a fixed list of events, then closing.
pub(crate) struct ScriptedSource {
    events: Mutex<Option<Vec<ChainEvent>>>,
    fail_unsubscribe: bool,
    unsubscribed: AtomicUsize,
}

impl ScriptedSource {
    pub(crate) fn new(events: Vec<ChainEvent>) -> Self {
        Self {
            events: Mutex::new(Some(events)),
            fail_unsubscribe: false,
            unsubscribed: AtomicUsize::new(0),
        }
    }

    pub(crate) fn failing_unsubscribe(mut self) -> Self {
        self.fail_unsubscribe = true;
        self
    }

    pub(crate) fn unsubscribe_calls(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn subscribe(&self) -> ChainResult<ChainEventStream> {
        let events = self
            .events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| ChainError::SubscriptionError("already subscribed".into()))?;
        Ok(Box::pin(futures::stream::iter(events)))
    }

    async fn unsubscribe(&self) -> ChainResult<()> {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        if self.fail_unsubscribe {
            return Err(ChainError::SubscriptionError("mux already gone".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Metrics recorder
// =============================================================================

type Samples = Arc<Mutex<Vec<(String, f64)>>>;

/// Local recorder keeping every histogram sample. Counters and gauges are
/// discarded.
#[derive(Default)]
pub(crate) struct HistogramRecorder {
    samples: Samples,
}

impl HistogramRecorder {
    /// Number of samples recorded under `name`.
    pub(crate) fn samples(&self, name: &str) -> usize {
        self.samples.lock().unwrap().iter().filter(|(n, _)| n == name).count()
    }
}

struct HistogramSink {
    name: String,
    samples: Samples,
}

impl HistogramFn for HistogramSink {
    fn record(&self, value: f64) {
        self.samples.lock().unwrap().push((self.name.clone(), value));
    }
}

impl Recorder for HistogramRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(Arc::new(HistogramSink {
            name: key.name().to_string(),
            samples: self.samples.clone(),
        }))
    }
}
