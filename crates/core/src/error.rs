//! Error types for the importer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Normalization failures
//! - [`StorageError`] - Database/gateway errors
//! - [`ChainError`] - Event source and node feed errors
//! - [`ImporterError`] - Top-level coordinator errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Errors raised while turning chain objects into records.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The sender address could not be recovered from the signature.
    #[error("Could not recover sender of transaction {tx_hash}: {reason}")]
    SenderRecovery {
        /// Hash of the offending transaction.
        tx_hash: String,
        /// Recovery failure details.
        reason: String,
    },
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Database and gateway errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// Query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Database constraint was violated (unique index, etc.).
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Stored data could not be converted back into a record.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Event source and node connectivity errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Connection to the node failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// RPC request failed.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Subscribing or unsubscribing failed.
    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    /// Block could not be fetched.
    #[error("Block fetch error at {number}: {message}")]
    BlockFetchError {
        /// Block number that failed to fetch.
        number: u64,
        /// Error details.
        message: String,
    },

    /// The event channel was closed by its owner.
    #[error("Event channel closed")]
    Closed,
}

// =============================================================================
// Importer Errors
// =============================================================================

/// Top-level import coordinator errors.
///
/// Every error returned by [`crate::services::ImportCoordinator::run`] stops
/// the coordinator. Recoverable per-record failures never surface here; they
/// are logged and counted inside the coordinator.
#[derive(Debug, Error)]
pub enum ImporterError {
    /// Normalization failed in a way the importer cannot paper over.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage failure outside the per-record policy.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Event source failure.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// A block that was just inserted could not be read back.
    ///
    /// Write and read paths of the store disagree; continuing would attach
    /// transactions to a block id we do not know.
    #[error("Could not find block {hash} right after inserting it: {reason}")]
    BlockLookup {
        /// Natural key of the block.
        hash: String,
        /// Why the lookup failed.
        reason: String,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for importer operations.
pub type ImporterResult<T> = Result<T, ImporterError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
