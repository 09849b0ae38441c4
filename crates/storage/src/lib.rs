//! Storage layer for the Quarry importer.
//!
//! This crate provides the PostgreSQL implementation of the
//! [`PersistenceGateway`](quarry_core::ports::PersistenceGateway) port
//! defined in `quarry-core`: connection pooling, migrations and the
//! append-only `blocks` / `transactions` tables.
//!
//! # Usage
//!
//! ```ignore
//! use quarry_storage::{Database, DatabaseConfig, PgGateway};
//!
//! let config = DatabaseConfig::for_importer(&database_url, Some("chain_explorer"));
//! let db = Database::connect(&config).await?;
//! db.migrate().await?;
//!
//! let gateway = PgGateway::new(&db);
//! ```

pub mod postgres;

pub use postgres::{Database, DatabaseConfig, PgGateway};
