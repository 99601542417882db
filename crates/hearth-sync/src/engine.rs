//! Generic optimistic collection engine
//!
//! A [`CollectionSync`] owns the local copies of every loaded collection of
//! one record domain and keeps them in step with the backing store:
//!
//! 1. **Commit** (local -> remote): the next version replaces the local
//!    collection immediately, is diffed against the previous version, and
//!    the resulting writes are dispatched on a background task.
//! 2. **Push** (remote -> local): while a collection is active, every
//!    snapshot delivered by its subscription replaces the local copy
//!    wholesale, whether or not local writes are still in flight.
//!
//! The same engine serves shopping lists, task lists, voucher lists and
//! shopping master templates; the record shape is the only parameter.
//!
//! ## Design Notes
//!
//! - `commit` is synchronous: it never waits on the network and returns a
//!   [`DispatchHandle`] that callers may await or simply drop.
//! - Remote write failures never roll back local state.
//! - Settle events are broadcast after every local change so derived views
//!   (the urgent task view) can recompute.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hearth_core::domain::{
    document_id, ListDomain, ListId, RecordDocument, RecordId, SyncRecord,
};
use hearth_core::ports::IBackingStore;

use crate::diff::diff;
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::listener;
use crate::registry::{
    ActiveSubscription, CollectionRegistry, SubscriptionTable, SubscriptionTarget,
};
use crate::store::{Collection, CollectionStore};
use crate::SyncError;

/// Buffered settle events per engine before slow receivers start lagging
const SETTLE_CHANNEL_CAPACITY: usize = 256;

// ============================================================================
// SettleEvent
// ============================================================================

/// What caused a local collection to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOrigin {
    /// A local commit replaced the collection
    Commit,
    /// A push snapshot or explicit load replaced the collection
    Snapshot,
    /// The collection was dropped from memory
    Removed,
}

/// Notification that a local collection reached a new state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleEvent {
    pub domain: ListDomain,
    pub list_id: ListId,
    pub origin: SettleOrigin,
}

// ============================================================================
// DispatchHandle
// ============================================================================

enum HandleState {
    Done(DispatchReport),
    Pending(JoinHandle<DispatchReport>),
}

/// Handle to the background dispatch of one commit
///
/// Dropping the handle detaches the dispatch; it still runs to completion.
pub struct DispatchHandle {
    list_id: ListId,
    state: HandleState,
}

impl DispatchHandle {
    fn done(report: DispatchReport) -> Self {
        Self {
            list_id: report.list_id.clone(),
            state: HandleState::Done(report),
        }
    }

    fn pending(list_id: ListId, task: JoinHandle<DispatchReport>) -> Self {
        Self {
            list_id,
            state: HandleState::Pending(task),
        }
    }

    pub fn list_id(&self) -> &ListId {
        &self.list_id
    }

    /// True once every remote write has completed or failed
    pub fn is_finished(&self) -> bool {
        match &self.state {
            HandleState::Done(_) => true,
            HandleState::Pending(task) => task.is_finished(),
        }
    }

    /// Wait for the dispatch and return its report
    ///
    /// # Errors
    /// Returns [`SyncError::DispatchJoin`] if the dispatch task panicked or
    /// the runtime shut down underneath it.
    pub async fn wait(self) -> Result<DispatchReport, SyncError> {
        match self.state {
            HandleState::Done(report) => Ok(report),
            HandleState::Pending(task) => task
                .await
                .map_err(|e| SyncError::DispatchJoin(e.to_string())),
        }
    }
}

impl std::fmt::Debug for DispatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchHandle")
            .field("list_id", &self.list_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

// ============================================================================
// CollectionSync
// ============================================================================

struct Inner<R> {
    backing: Arc<dyn IBackingStore>,
    store: CollectionStore<R>,
    dispatcher: Dispatcher,
    registry: CollectionRegistry,
    settled: broadcast::Sender<SettleEvent>,
    reserved: Vec<ListId>,
}

/// Optimistic sync engine for one record domain
///
/// Cheap to clone; clones share all state.
pub struct CollectionSync<R> {
    inner: Arc<Inner<R>>,
}

impl<R> Clone for CollectionSync<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Non-owning handle held by listener tasks
///
/// Listeners must not keep the engine alive: once every [`CollectionSync`]
/// is dropped the subscription table goes with it and stops its listeners.
pub(crate) struct WeakCollectionSync<R> {
    inner: Weak<Inner<R>>,
}

impl<R> WeakCollectionSync<R> {
    pub(crate) fn upgrade(&self) -> Option<CollectionSync<R>> {
        self.inner.upgrade().map(|inner| CollectionSync { inner })
    }
}

impl<R: SyncRecord> CollectionSync<R> {
    /// Create an engine for record type `R`
    ///
    /// # Arguments
    /// * `backing` - The backing store all collections sync against
    /// * `table` - Subscription table shared with the other domains
    /// * `operation_timeout` - Upper bound for each remote write
    /// * `reserved` - List ids that may never be committed to
    pub fn new(
        backing: Arc<dyn IBackingStore>,
        table: Arc<SubscriptionTable>,
        operation_timeout: Duration,
        reserved: Vec<ListId>,
    ) -> Self {
        let (settled, _) = broadcast::channel(SETTLE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                dispatcher: Dispatcher::new(Arc::clone(&backing), operation_timeout),
                registry: CollectionRegistry::new(R::DOMAIN, Arc::clone(&backing), table),
                store: CollectionStore::new(),
                backing,
                settled,
                reserved,
            }),
        }
    }

    pub fn domain(&self) -> ListDomain {
        R::DOMAIN
    }

    pub(crate) fn downgrade(&self) -> WeakCollectionSync<R> {
        WeakCollectionSync {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ------------------------------------------------------------------------
    // Local reads
    // ------------------------------------------------------------------------

    /// Current local copy of a collection (empty if never loaded)
    pub fn collection(&self, list_id: &ListId) -> Collection<R> {
        self.inner.store.get_or_empty(list_id)
    }

    pub fn is_loaded(&self, list_id: &ListId) -> bool {
        self.inner.store.contains(list_id)
    }

    /// Point-in-time copy of every loaded collection
    pub fn snapshot(&self) -> std::collections::BTreeMap<ListId, Collection<R>> {
        self.inner.store.snapshot()
    }

    /// Locate a record and the collection holding it
    pub fn find(&self, record_id: &RecordId) -> Option<(ListId, R)> {
        self.inner.store.find(record_id)
    }

    /// Receive an event after every local collection change
    pub fn settled(&self) -> broadcast::Receiver<SettleEvent> {
        self.inner.settled.subscribe()
    }

    pub fn is_reserved(&self, list_id: &ListId) -> bool {
        self.inner.reserved.contains(list_id)
    }

    // ------------------------------------------------------------------------
    // Commit (local -> remote)
    // ------------------------------------------------------------------------

    /// Commit the next version of a collection
    ///
    /// The local copy is replaced before this returns; the remote writes run
    /// on a background task. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns [`SyncError::ReadOnlyList`] if `list_id` is reserved for a
    /// derived view.
    pub fn commit(&self, list_id: &ListId, next: Vec<R>) -> Result<DispatchHandle, SyncError> {
        if self.is_reserved(list_id) {
            return Err(SyncError::ReadOnlyList(list_id.clone()));
        }

        let next = Arc::new(next);
        let previous = self
            .inner
            .store
            .swap(list_id, Arc::clone(&next))
            .unwrap_or_default();
        let changes = diff(&previous, &next);

        self.publish(list_id, SettleOrigin::Commit);

        if changes.is_empty() {
            debug!(domain = %R::DOMAIN, list_id = %list_id, "Commit produced no remote writes");
            return Ok(DispatchHandle::done(DispatchReport::empty(list_id.clone())));
        }

        debug!(
            domain = %R::DOMAIN,
            list_id = %list_id,
            added = changes.added.len(),
            changed = changes.changed.len(),
            removed = changes.removed.len(),
            "Committed locally, dispatching"
        );

        let dispatcher = self.inner.dispatcher.clone();
        let target = list_id.clone();
        let task = tokio::spawn(async move { dispatcher.dispatch(&target, &changes).await });

        Ok(DispatchHandle::pending(list_id.clone(), task))
    }

    /// Commit the result of applying `edit` to the current local copy
    ///
    /// # Errors
    /// Same as [`CollectionSync::commit`]
    pub fn update<F>(&self, list_id: &ListId, edit: F) -> Result<DispatchHandle, SyncError>
    where
        F: FnOnce(&mut Vec<R>),
    {
        let mut next = self.collection(list_id).as_ref().clone();
        edit(&mut next);
        self.commit(list_id, next)
    }

    // ------------------------------------------------------------------------
    // Replace (remote -> local)
    // ------------------------------------------------------------------------

    /// Replace a local collection with an authoritative snapshot
    pub fn replace(&self, list_id: &ListId, records: Vec<R>) {
        let count = records.len();
        self.inner.store.swap(list_id, Arc::new(records));
        debug!(domain = %R::DOMAIN, list_id = %list_id, count, "Collection replaced");
        self.publish(list_id, SettleOrigin::Snapshot);
    }

    /// Fetch the current remote contents of a collection
    ///
    /// Documents that do not decode as `R` are skipped with a warning.
    ///
    /// # Errors
    /// Returns error if the backing store call fails
    pub async fn fetch(&self, list_id: &ListId) -> Result<Vec<R>, SyncError> {
        let documents = self.inner.backing.fetch_items(list_id).await?;
        Ok(decode_snapshot(list_id, documents))
    }

    /// Fetch a collection and replace the local copy with it
    ///
    /// On failure the local copy is left untouched.
    ///
    /// # Errors
    /// Returns error if the backing store call fails
    #[tracing::instrument(skip(self), fields(domain = %R::DOMAIN))]
    pub async fn load(&self, list_id: &ListId) -> Result<usize, SyncError> {
        let records = self.fetch(list_id).await?;
        let count = records.len();
        self.replace(list_id, records);
        Ok(count)
    }

    // ------------------------------------------------------------------------
    // Subscription lifecycle
    // ------------------------------------------------------------------------

    /// Make `list_id` the active collection of this domain
    ///
    /// Returns false if it was already active.
    ///
    /// # Errors
    /// Returns error if the backing store refuses the subscription
    pub async fn activate(&self, list_id: &ListId) -> Result<bool, SyncError> {
        self.inner
            .registry
            .activate(list_id, |target| self.subscribe(target))
            .await
    }

    /// Stop syncing `list_id` if it is active; returns true if it was
    pub async fn deactivate(&self, list_id: &ListId) -> bool {
        self.inner.registry.deactivate(list_id).await
    }

    /// Stop syncing the active collection, if any
    pub async fn deactivate_current(&self) -> Option<ListId> {
        self.inner.registry.deactivate_current().await
    }

    pub async fn active(&self) -> Option<ListId> {
        self.inner.registry.active().await
    }

    /// Deactivate and drop a collection, e.g. after its list was deleted
    pub async fn forget(&self, list_id: &ListId) {
        self.deactivate(list_id).await;
        if self.inner.store.remove(list_id).is_some() {
            debug!(domain = %R::DOMAIN, list_id = %list_id, "Collection dropped");
            self.publish(list_id, SettleOrigin::Removed);
        }
    }

    async fn subscribe(&self, list_id: ListId) -> Result<ActiveSubscription, SyncError> {
        let (sink, notifications) = mpsc::unbounded_channel();
        let handle = self.inner.backing.subscribe_items(&list_id, sink).await?;

        let cancel = CancellationToken::new();
        let task = listener::spawn_items_listener(
            self.downgrade(),
            list_id.clone(),
            notifications,
            cancel.clone(),
        );

        Ok(ActiveSubscription::new(
            SubscriptionTarget::Items(list_id),
            handle,
            cancel,
            task,
        ))
    }

    fn publish(&self, list_id: &ListId, origin: SettleOrigin) {
        // No receivers is not an error
        let _ = self.inner.settled.send(SettleEvent {
            domain: R::DOMAIN,
            list_id: list_id.clone(),
            origin,
        });
    }
}

impl<R> std::fmt::Debug for CollectionSync<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionSync")
            .field("registry", &self.inner.registry)
            .field("reserved", &self.inner.reserved)
            .finish_non_exhaustive()
    }
}

/// Decode a pushed or fetched snapshot, skipping malformed documents
pub(crate) fn decode_snapshot<R: SyncRecord>(
    list_id: &ListId,
    documents: Vec<RecordDocument>,
) -> Vec<R> {
    let total = documents.len();
    let records: Vec<R> = documents
        .into_iter()
        .filter_map(|document| {
            let id = document_id(&document);
            match R::from_document(document) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(
                        list_id = %list_id,
                        record_id = ?id.as_ref().map(RecordId::as_str),
                        error = %e,
                        "Skipping undecodable record"
                    );
                    None
                }
            }
        })
        .collect();

    if records.len() < total {
        debug!(list_id = %list_id, skipped = total - records.len(), "Snapshot partially decoded");
    }
    records
}
