//! Backing store port (driven/secondary port)
//!
//! This module defines the interface to the remote multi-writer store that
//! holds the authoritative copy of every list and record. The trait is
//! transport-independent: a document database with push listeners, an HTTP
//! service with server-sent events, or a local SQLite file can all back it.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and the engine only logs them.
//! - Records cross the port as JSON documents ([`RecordDocument`]) so one
//!   trait serves all three item domains.
//! - Push notifications are delivered into unbounded channels owned by the
//!   caller. Implementations must stop sending once `unsubscribe` returns for
//!   a handle.

use tokio::sync::mpsc;

use crate::domain::{
    HouseholdId, ListId, ListMeta, RecordDocument, RecordId, RecordPatch, SubscriptionId,
};

// ============================================================================
// Notifications
// ============================================================================

/// Push notification for one item collection
#[derive(Debug, Clone, PartialEq)]
pub enum ItemsNotification {
    /// The full current contents of the collection
    Snapshot(Vec<RecordDocument>),
    /// The collection changed; the listener must re-fetch it
    Invalidated,
}

/// Push notification for a household's list index
///
/// Only list creation and deletion are reported, never item-level changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListsNotification {
    Created(ListMeta),
    Deleted(ListId),
}

// ============================================================================
// IBackingStore trait
// ============================================================================

/// Port trait for the remote authoritative store
///
/// ## Implementation Notes
///
/// - `create_item` must use the record's own `id` field as its primary key.
/// - `patch_item` merges only the given fields into the stored record.
/// - `delete_list` must cascade to the list's item collection and to its
///   master template collection ([`ListId::master_of`]).
/// - A subscription may deliver a first notification immediately after it
///   is established.
#[async_trait::async_trait]
pub trait IBackingStore: Send + Sync {
    /// Lists belonging to a household, in creation order
    async fn fetch_lists(&self, household: &HouseholdId) -> anyhow::Result<Vec<ListMeta>>;

    /// Current contents of one item collection
    async fn fetch_items(&self, list_id: &ListId) -> anyhow::Result<Vec<RecordDocument>>;

    /// Stores a new record in `list_id`, keyed by its client-generated id
    async fn create_item(&self, list_id: &ListId, record: RecordDocument) -> anyhow::Result<()>;

    /// Applies a field-level patch to an existing record
    async fn patch_item(&self, record_id: &RecordId, patch: &RecordPatch) -> anyhow::Result<()>;

    /// Deletes a record
    async fn delete_item(&self, record_id: &RecordId) -> anyhow::Result<()>;

    /// Registers a new list in the household index
    async fn create_list(&self, household: &HouseholdId, meta: &ListMeta) -> anyhow::Result<()>;

    /// Deletes a list, its item collection and its master collection
    async fn delete_list(&self, list_id: &ListId) -> anyhow::Result<()>;

    /// Starts pushing collection changes for `list_id` into `sink`
    async fn subscribe_items(
        &self,
        list_id: &ListId,
        sink: mpsc::UnboundedSender<ItemsNotification>,
    ) -> anyhow::Result<SubscriptionId>;

    /// Starts pushing list creation/deletion for `household` into `sink`
    async fn subscribe_lists(
        &self,
        household: &HouseholdId,
        sink: mpsc::UnboundedSender<ListsNotification>,
    ) -> anyhow::Result<SubscriptionId>;

    /// Stops a subscription created by either subscribe method
    async fn unsubscribe(&self, handle: SubscriptionId) -> anyhow::Result<()>;
}
