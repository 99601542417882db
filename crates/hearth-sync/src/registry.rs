//! Active collection registry and subscription table
//!
//! For each record domain at most one collection is "active": it has a live
//! push subscription whose snapshots replace the local copy. Switching the
//! active list is a two-step transition, unsubscribe the old list, then
//! subscribe the new one, and transitions of one domain are serialized by an
//! async mutex. Rapid switching therefore yields exactly one unsubscribe per
//! subscribe, in order.
//!
//! Live subscriptions are kept in a [`SubscriptionTable`] keyed by
//! `(domain, list id)`. Teardown is an explicit operation on the removed
//! [`ActiveSubscription`], not a stored closure.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearth_core::domain::{HouseholdId, ListDomain, ListId, SubscriptionId};
use hearth_core::ports::IBackingStore;

use crate::SyncError;

// ============================================================================
// ActiveSubscription
// ============================================================================

/// What a push subscription observes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionTarget {
    /// The item collection of one list
    Items(ListId),
    /// The list index of a household
    Lists(HouseholdId),
}

impl fmt::Display for SubscriptionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionTarget::Items(list_id) => write!(f, "items:{list_id}"),
            SubscriptionTarget::Lists(household) => write!(f, "lists:{household}"),
        }
    }
}

/// A live push subscription and the task draining it
///
/// Dropping it without [`ActiveSubscription::unsubscribe`] still stops the
/// listener, but the remote handle is only released by `unsubscribe`.
#[derive(Debug)]
pub struct ActiveSubscription {
    target: SubscriptionTarget,
    handle: SubscriptionId,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ActiveSubscription {
    pub fn new(
        target: SubscriptionTarget,
        handle: SubscriptionId,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            target,
            handle,
            cancel,
            task: Some(task),
        }
    }

    pub fn target(&self) -> &SubscriptionTarget {
        &self.target
    }

    pub fn handle(&self) -> SubscriptionId {
        self.handle
    }

    /// Stop the listener and release the remote handle
    ///
    /// The listener is cancelled first so that a notification racing with
    /// the teardown is dropped instead of applied. A failing remote
    /// unsubscribe is logged only.
    pub async fn unsubscribe(mut self, backing: &dyn IBackingStore) {
        self.cancel.cancel();

        if let Err(e) = backing.unsubscribe(self.handle).await {
            warn!(
                target_id = %self.target,
                handle = %self.handle,
                error = %format!("{e:#}"),
                "Failed to release subscription"
            );
        }

        // Wait for the listener so no snapshot lands after teardown returns
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if e.is_panic() {
                    warn!(target_id = %self.target, "Listener task panicked");
                }
            }
        }

        debug!(target_id = %self.target, handle = %self.handle, "Subscription torn down");
    }
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// SubscriptionTable
// ============================================================================

/// Live subscriptions keyed by `(domain, list id)`
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    entries: DashMap<(ListDomain, ListId), ActiveSubscription>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, returning any entry it displaced
    pub fn insert(
        &self,
        domain: ListDomain,
        list_id: ListId,
        subscription: ActiveSubscription,
    ) -> Option<ActiveSubscription> {
        self.entries.insert((domain, list_id), subscription)
    }

    pub fn remove(&self, domain: ListDomain, list_id: &ListId) -> Option<ActiveSubscription> {
        self.entries
            .remove(&(domain, list_id.clone()))
            .map(|(_, subscription)| subscription)
    }

    pub fn contains(&self, domain: ListDomain, list_id: &ListId) -> bool {
        self.entries.contains_key(&(domain, list_id.clone()))
    }

    pub fn handle_of(&self, domain: ListDomain, list_id: &ListId) -> Option<SubscriptionId> {
        self.entries
            .get(&(domain, list_id.clone()))
            .map(|entry| entry.value().handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, e.g. at session shutdown
    pub fn drain(&self) -> Vec<ActiveSubscription> {
        let keys: Vec<(ListDomain, ListId)> =
            self.entries.iter().map(|entry| entry.key().clone()).collect();
        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|(_, sub)| sub))
            .collect()
    }
}

// ============================================================================
// CollectionRegistry
// ============================================================================

/// Tracks the active collection of one record domain
pub struct CollectionRegistry {
    domain: ListDomain,
    backing: Arc<dyn IBackingStore>,
    table: Arc<SubscriptionTable>,
    active: Mutex<Option<ListId>>,
}

impl CollectionRegistry {
    pub fn new(
        domain: ListDomain,
        backing: Arc<dyn IBackingStore>,
        table: Arc<SubscriptionTable>,
    ) -> Self {
        Self {
            domain,
            backing,
            table,
            active: Mutex::new(None),
        }
    }

    pub fn domain(&self) -> ListDomain {
        self.domain
    }

    /// Currently active list id
    pub async fn active(&self) -> Option<ListId> {
        self.active.lock().await.clone()
    }

    /// Make `list_id` the active collection
    ///
    /// Returns `Ok(false)` without touching any subscription if the list is
    /// already active. Otherwise tears down the previous subscription (if
    /// any) and establishes a new one through `subscribe`.
    ///
    /// # Errors
    /// Returns the error of `subscribe`; in that case no list is active.
    pub async fn activate<F, Fut>(&self, list_id: &ListId, subscribe: F) -> Result<bool, SyncError>
    where
        F: FnOnce(ListId) -> Fut,
        Fut: Future<Output = Result<ActiveSubscription, SyncError>>,
    {
        let mut active = self.active.lock().await;

        if active.as_ref() == Some(list_id) && self.table.contains(self.domain, list_id) {
            debug!(domain = %self.domain, list_id = %list_id, "List already active");
            return Ok(false);
        }

        if let Some(previous) = active.take() {
            self.teardown(&previous).await;
        }

        let subscription = subscribe(list_id.clone()).await?;
        if let Some(stale) = self.table.insert(self.domain, list_id.clone(), subscription) {
            stale.unsubscribe(self.backing.as_ref()).await;
        }
        *active = Some(list_id.clone());

        info!(domain = %self.domain, list_id = %list_id, "Collection activated");
        Ok(true)
    }

    /// Stop syncing `list_id` if it is the active collection
    ///
    /// Returns true if a subscription was torn down.
    pub async fn deactivate(&self, list_id: &ListId) -> bool {
        let mut active = self.active.lock().await;
        if active.as_ref() != Some(list_id) {
            return false;
        }
        *active = None;
        self.teardown(list_id).await;
        info!(domain = %self.domain, list_id = %list_id, "Collection deactivated");
        true
    }

    /// Stop syncing whatever list is active
    pub async fn deactivate_current(&self) -> Option<ListId> {
        let mut active = self.active.lock().await;
        let previous = active.take()?;
        self.teardown(&previous).await;
        info!(domain = %self.domain, list_id = %previous, "Collection deactivated");
        Some(previous)
    }

    async fn teardown(&self, list_id: &ListId) {
        if let Some(subscription) = self.table.remove(self.domain, list_id) {
            subscription.unsubscribe(self.backing.as_ref()).await;
        }
    }
}

impl fmt::Debug for CollectionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionRegistry")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}
