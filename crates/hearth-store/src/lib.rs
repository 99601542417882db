//! Hearth Store - SQLite backing store
//!
//! Persists lists and their item collections in SQLite and implements the
//! `IBackingStore` port from `hearth-core`, including push subscriptions
//! for writes made through the same store instance.
//!
//! ## Architecture
//!
//! This crate is a driven (secondary) adapter in the hexagonal
//! architecture. Records are stored as opaque JSON documents; the store
//! never interprets domain fields beyond the `id`.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteBackingStore`] - Full `IBackingStore` implementation
//! - [`StoreError`] - Error types for store operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use hearth_store::{DatabasePool, SqliteBackingStore};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let pool = DatabasePool::new(Path::new("/home/user/.local/share/hearth/hearth.db")).await?;
//! let store = SqliteBackingStore::new(pool.pool().clone());
//! // Use store as IBackingStore...
//! # Ok(())
//! # }
//! ```

pub mod backing_store;
pub mod notifier;
pub mod pool;

pub use backing_store::SqliteBackingStore;
pub use pool::DatabasePool;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be mapped to a domain type
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The addressed record or list does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}
