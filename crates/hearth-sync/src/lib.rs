//! Hearth Sync - Optimistic collection synchronization engine
//!
//! Provides:
//! - Instant local commits with background remote dispatch
//! - Minimal create/patch/delete sets computed by diffing collections
//! - Push-driven full snapshot replacement of the active collection
//! - A derived, read-only urgent task view across all task lists
//!
//! ## Modules
//!
//! - [`diff`] - Pure added/removed/changed partition of two collections
//! - [`store`] - In-memory collections keyed by list id
//! - [`dispatcher`] - Concurrent, independently fallible remote writes
//! - [`listener`] - Push subscription loops feeding snapshots back in
//! - [`registry`] - Active-list tracking and the subscription handle table
//! - [`engine`] - [`CollectionSync`], one generic engine per record domain
//! - [`urgent`] - The urgent task projection
//! - [`household`] - Session wiring of the three domains and the list index

pub mod diff;
pub mod dispatcher;
pub mod engine;
pub mod household;
pub mod listener;
pub mod registry;
pub mod store;
pub mod urgent;

use hearth_core::domain::{DomainError, ListId, RecordId};
use thiserror::Error;

pub use diff::{diff, RecordChange, RecordDiff};
pub use dispatcher::{DispatchReport, OperationFailure, RemoteOperation};
pub use engine::{CollectionSync, DispatchHandle, SettleEvent, SettleOrigin};
pub use household::Household;
pub use urgent::{UrgentTask, UrgentView};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// The target list is a derived view and cannot be committed to
    #[error("List {0} is a derived view and cannot be written to")]
    ReadOnlyList(ListId),

    /// The list is not known to the household list index
    #[error("List not found: {0}")]
    ListNotFound(ListId),

    /// No local collection holds a record with this id
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// The backing store rejected or failed a call
    #[error("Backing store error: {0:#}")]
    Backing(#[from] anyhow::Error),

    /// A domain-level error propagated from hearth-core
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The background dispatch task panicked or was cancelled
    #[error("Dispatch task failed: {0}")]
    DispatchJoin(String),
}
