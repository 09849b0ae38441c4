//! Metrics definitions for the importer.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "blocks_imported_total",
        "Total number of blocks persisted with their transactions"
    );
    describe_counter!(
        "transactions_imported_total",
        "Total number of transactions persisted"
    );
    describe_counter!(
        "insert_failures_total",
        "Total number of records dropped because the store refused the insert"
    );
    describe_counter!(
        "pending_transactions_ignored_total",
        "Total number of pending transaction events routed to the no-op handler"
    );
    describe_histogram!(
        "block_import_duration_seconds",
        "Time taken to import a block and its transactions in seconds"
    );
}

/// Record a successfully imported block.
pub fn record_block_imported() {
    counter!("blocks_imported_total").increment(1);
}

/// Record a successfully imported transaction.
pub fn record_transaction_imported() {
    counter!("transactions_imported_total").increment(1);
}

/// Record a dropped record.
///
/// # Arguments
/// * `kind` - The record kind ("block" or "transaction")
pub fn record_insert_failure(kind: &'static str) {
    counter!("insert_failures_total", "kind" => kind).increment(1);
}

/// Record a pending transaction event that was not imported.
pub fn record_pending_ignored() {
    counter!("pending_transactions_ignored_total").increment(1);
}

/// Record block import duration.
pub fn record_block_import_duration(duration_secs: f64) {
    histogram!("block_import_duration_seconds").record(duration_secs);
}

/// Times one block import. Only [`ProcessingTimer::finish`] records, so
/// dropped or halted blocks stay out of the histogram.
pub struct ProcessingTimer {
    start: Instant,
}

impl ProcessingTimer {
    /// Start a new processing timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Record the elapsed time as a completed import.
    pub fn finish(self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        record_block_import_duration(elapsed);
        elapsed
    }
}

impl Default for ProcessingTimer {
    fn default() -> Self {
        Self::new()
    }
}
