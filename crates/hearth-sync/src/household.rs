//! Household session
//!
//! A [`Household`] wires the three record domains to one backing store and
//! keeps the household-level state in step:
//!
//! - **List index**: fetched at start, then kept current by a lists
//!   subscription that reports creations and deletions.
//! - **Collections**: one [`CollectionSync`] per domain. Every task list is
//!   loaded at start so the urgent view sees all of them.
//! - **Urgent view**: recomputed whenever a task collection settles or the
//!   list index changes, and periodically to follow the calendar.
//!
//! ## Lifecycle
//!
//! ```text
//! new() -> start() -> [open_list / commit / ...] -> shutdown()
//! ```
//!
//! Background tasks only hold weak references to the session. Dropping the
//! last [`Household`] clone stops them, but remote subscription handles are
//! released by `shutdown` alone.
//!
//! Deleting a list removes it from the index, drops its collection (and the
//! master template collection of a shopping list) and tears down its
//! subscription.

use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hearth_core::config::Config;
use hearth_core::domain::{
    HouseholdId, ListDomain, ListId, ListMeta, RecordId, ShoppingItem, SubscriptionId,
    SyncRecord, Task, Voucher,
};
use hearth_core::ports::{IBackingStore, ListsNotification};

use crate::engine::{CollectionSync, DispatchHandle};
use crate::registry::{ActiveSubscription, SubscriptionTable, SubscriptionTarget};
use crate::urgent::{UrgentProjection, UrgentRules, UrgentSource, UrgentView};
use crate::SyncError;

/// How often the urgent view is recomputed without any data change
const URGENT_CLOCK_TICK: Duration = Duration::from_secs(300);

type ListIndex = Arc<Vec<ListMeta>>;

struct Session {
    household_id: HouseholdId,
    backing: Arc<dyn IBackingStore>,
    shopping: CollectionSync<ShoppingItem>,
    tasks: CollectionSync<Task>,
    vouchers: CollectionSync<Voucher>,
    lists: watch::Sender<ListIndex>,
    lists_subscription: Mutex<Option<ActiveSubscription>>,
    urgent: UrgentProjection,
    shutdown: CancellationToken,
    urgent_task: StdMutex<Option<JoinHandle<()>>>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// All synchronized state of one household
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Household {
    inner: Arc<Session>,
}

impl Household {
    /// Create a session
    ///
    /// # Arguments
    /// * `backing` - The authoritative store
    /// * `household_id` - Owner scope of the list index
    /// * `operation_timeout` - Upper bound for each remote item write
    /// * `rules` - Inclusion rules of the urgent view; its reserved id is
    ///   read-only in the task domain
    pub fn new(
        backing: Arc<dyn IBackingStore>,
        household_id: HouseholdId,
        operation_timeout: Duration,
        rules: UrgentRules,
    ) -> Self {
        let table = Arc::new(SubscriptionTable::new());
        let (lists, _) = watch::channel(ListIndex::default());

        let shopping = CollectionSync::new(
            Arc::clone(&backing),
            Arc::clone(&table),
            operation_timeout,
            Vec::new(),
        );
        let tasks = CollectionSync::new(
            Arc::clone(&backing),
            Arc::clone(&table),
            operation_timeout,
            vec![rules.reserved.clone()],
        );
        let vouchers = CollectionSync::new(
            Arc::clone(&backing),
            Arc::clone(&table),
            operation_timeout,
            Vec::new(),
        );

        Self {
            inner: Arc::new(Session {
                household_id,
                backing,
                shopping,
                tasks,
                vouchers,
                lists,
                lists_subscription: Mutex::new(None),
                urgent: UrgentProjection::new(rules),
                shutdown: CancellationToken::new(),
                urgent_task: StdMutex::new(None),
            }),
        }
    }

    /// Create a session from the `store`, `dispatch` and `urgent` settings
    ///
    /// # Errors
    /// Returns error if the configured household id is invalid
    pub fn from_config(backing: Arc<dyn IBackingStore>, config: &Config) -> Result<Self, SyncError> {
        let household_id = HouseholdId::new(config.store.household.clone())?;
        let rules = UrgentRules {
            window_days: config.urgent.window_days,
            reserved: config.urgent_list_id(),
        };
        Ok(Self::new(
            backing,
            household_id,
            Duration::from_millis(config.dispatch.operation_timeout_ms),
            rules,
        ))
    }

    pub fn household_id(&self) -> &HouseholdId {
        &self.inner.household_id
    }

    pub fn shopping(&self) -> &CollectionSync<ShoppingItem> {
        &self.inner.shopping
    }

    pub fn tasks(&self) -> &CollectionSync<Task> {
        &self.inner.tasks
    }

    pub fn vouchers(&self) -> &CollectionSync<Voucher> {
        &self.inner.vouchers
    }

    // ------------------------------------------------------------------------
    // Session lifecycle
    // ------------------------------------------------------------------------

    /// Load the list index and all task lists, then start listening
    ///
    /// Calling `start` on a running session is a no-op.
    ///
    /// # Errors
    /// Returns error if the list index cannot be fetched or subscribed.
    /// Failing to load an individual task list is only logged.
    #[tracing::instrument(skip(self), fields(household = %self.inner.household_id))]
    pub async fn start(&self) -> Result<(), SyncError> {
        let mut subscription = self.inner.lists_subscription.lock().await;
        if subscription.is_some() {
            debug!("Household session already running");
            return Ok(());
        }

        // Subscribe before fetching: changes made while the index is read
        // stay buffered and are applied on top of it
        let (sink, notifications) = mpsc::unbounded_channel();
        let handle = self
            .inner
            .backing
            .subscribe_lists(&self.inner.household_id, sink)
            .await?;

        let index = match self.inner.backing.fetch_lists(&self.inner.household_id).await {
            Ok(index) => index,
            Err(e) => {
                if let Err(release) = self.inner.backing.unsubscribe(handle).await {
                    warn!(handle = %handle, error = %release, "Failed to release lists subscription");
                }
                return Err(e.into());
            }
        };
        info!(lists = index.len(), "List index loaded");
        self.inner.lists.send_replace(Arc::new(index));

        *subscription = Some(self.listen_lists(handle, notifications));
        drop(subscription);
        self.spawn_urgent_loop();

        for meta in self.lists_in(ListDomain::Tasks) {
            if let Err(e) = self.inner.tasks.load(&meta.id).await {
                warn!(list_id = %meta.id, error = %e, "Failed to load task list");
            }
            // Deleted remotely while it was loading
            if self.list(&meta.id).is_none() {
                self.inner.tasks.forget(&meta.id).await;
            }
        }

        self.refresh_urgent();

        info!("Household session started");
        Ok(())
    }

    /// Tear down every subscription and background task
    ///
    /// Must be called to release the remote subscription handles; dropping
    /// the session only stops the local tasks. A session that was shut down
    /// cannot be started again.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        self.inner.shopping.deactivate_current().await;
        self.inner.tasks.deactivate_current().await;
        self.inner.vouchers.deactivate_current().await;

        let lists_subscription = self.inner.lists_subscription.lock().await.take();
        if let Some(subscription) = lists_subscription {
            subscription.unsubscribe(self.inner.backing.as_ref()).await;
        }

        let urgent_task = self
            .inner
            .urgent_task
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(task) = urgent_task {
            let _ = task.await;
        }

        info!(household = %self.inner.household_id, "Household session stopped");
    }

    fn listen_lists(
        &self,
        handle: SubscriptionId,
        notifications: mpsc::UnboundedReceiver<ListsNotification>,
    ) -> ActiveSubscription {
        let cancel = CancellationToken::new();
        let task = spawn_lists_listener(
            Arc::downgrade(&self.inner),
            notifications,
            cancel.clone(),
        );

        ActiveSubscription::new(
            SubscriptionTarget::Lists(self.inner.household_id.clone()),
            handle,
            cancel,
            task,
        )
    }

    // ------------------------------------------------------------------------
    // List index
    // ------------------------------------------------------------------------

    /// Every list of the household, in index order
    pub fn lists(&self) -> ListIndex {
        Arc::clone(&self.inner.lists.borrow())
    }

    /// Lists of one domain, in index order
    pub fn lists_in(&self, domain: ListDomain) -> Vec<ListMeta> {
        self.inner
            .lists
            .borrow()
            .iter()
            .filter(|meta| meta.domain == domain)
            .cloned()
            .collect()
    }

    pub fn list(&self, list_id: &ListId) -> Option<ListMeta> {
        self.inner
            .lists
            .borrow()
            .iter()
            .find(|meta| &meta.id == list_id)
            .cloned()
    }

    /// Observe changes of the list index
    pub fn watch_lists(&self) -> watch::Receiver<ListIndex> {
        self.inner.lists.subscribe()
    }

    /// Create a list and register it in the index
    ///
    /// A new task list starts out as a loaded, empty collection.
    ///
    /// # Errors
    /// Returns error if the name is blank or the backing store fails
    pub async fn create_list(
        &self,
        name: impl Into<String>,
        domain: ListDomain,
    ) -> Result<ListMeta, SyncError> {
        let meta = ListMeta::create(name, domain)?;
        self.inner
            .backing
            .create_list(&self.inner.household_id, &meta)
            .await?;

        info!(list_id = %meta.id, domain = %domain, name = %meta.name, "List created");
        self.index_insert(meta.clone());
        if domain == ListDomain::Tasks && !self.inner.tasks.is_loaded(&meta.id) {
            self.inner.tasks.replace(&meta.id, Vec::new());
        }
        Ok(meta)
    }

    /// Delete a list, its items and, for shopping lists, its master template
    ///
    /// # Errors
    /// Returns [`SyncError::ListNotFound`] for unknown lists, or the backing
    /// store error; local state is only dropped once the store succeeded.
    pub async fn delete_list(&self, list_id: &ListId) -> Result<(), SyncError> {
        let meta = self
            .list(list_id)
            .ok_or_else(|| SyncError::ListNotFound(list_id.clone()))?;

        self.inner.backing.delete_list(list_id).await?;
        info!(list_id = %list_id, domain = %meta.domain, "List deleted");
        self.forget_list(list_id).await;
        Ok(())
    }

    /// Load a list and make it the active collection of its domain
    ///
    /// # Errors
    /// Returns error if the list is unknown or the subscription fails.
    /// A failing initial load is logged; the subscription delivers the
    /// contents once the store is reachable.
    pub async fn open_list(&self, list_id: &ListId) -> Result<ListMeta, SyncError> {
        let meta = self
            .list(list_id)
            .ok_or_else(|| SyncError::ListNotFound(list_id.clone()))?;

        match meta.domain {
            ListDomain::Shopping => open_in(&self.inner.shopping, list_id).await?,
            ListDomain::Tasks => open_in(&self.inner.tasks, list_id).await?,
            ListDomain::Vouchers => open_in(&self.inner.vouchers, list_id).await?,
        }
        Ok(meta)
    }

    fn index_insert(&self, meta: ListMeta) {
        self.inner.lists.send_if_modified(|index| {
            if index.iter().any(|existing| existing == &meta) {
                return false;
            }
            let mut next = index.as_ref().clone();
            match next.iter_mut().find(|existing| existing.id == meta.id) {
                Some(existing) => *existing = meta,
                None => next.push(meta),
            }
            *index = Arc::new(next);
            true
        });
    }

    /// Drop a list from the index and from memory
    async fn forget_list(&self, list_id: &ListId) {
        let mut removed: Option<ListMeta> = None;
        self.inner.lists.send_if_modified(|index| {
            let position = index.iter().position(|meta| &meta.id == list_id);
            match position {
                Some(position) => {
                    let mut next = index.as_ref().clone();
                    removed = Some(next.remove(position));
                    *index = Arc::new(next);
                    true
                }
                None => false,
            }
        });

        let domain = removed.map(|meta| meta.domain);
        match domain {
            Some(ListDomain::Shopping) => {
                self.inner.shopping.forget(list_id).await;
                self.inner.shopping.forget(&ListId::master_of(list_id)).await;
            }
            Some(ListDomain::Tasks) => self.inner.tasks.forget(list_id).await,
            Some(ListDomain::Vouchers) => self.inner.vouchers.forget(list_id).await,
            None => {
                // Unknown to the index; drop whatever might be loaded
                self.inner.shopping.forget(list_id).await;
                self.inner.shopping.forget(&ListId::master_of(list_id)).await;
                self.inner.tasks.forget(list_id).await;
                self.inner.vouchers.forget(list_id).await;
            }
        }
    }

    // ------------------------------------------------------------------------
    // Shopping master templates
    // ------------------------------------------------------------------------

    /// Load the master template collection of a shopping list
    ///
    /// Returns the id under which the template is committed through
    /// [`Household::shopping`].
    ///
    /// # Errors
    /// Returns error if the list is not a known shopping list or the fetch
    /// fails
    pub async fn load_master(&self, list_id: &ListId) -> Result<ListId, SyncError> {
        match self.list(list_id) {
            Some(meta) if meta.domain == ListDomain::Shopping => {}
            _ => return Err(SyncError::ListNotFound(list_id.clone())),
        }
        let master = ListId::master_of(list_id);
        self.inner.shopping.load(&master).await?;
        Ok(master)
    }

    // ------------------------------------------------------------------------
    // Urgent view
    // ------------------------------------------------------------------------

    /// Observe the urgent view
    pub fn urgent(&self) -> watch::Receiver<Arc<UrgentView>> {
        self.inner.urgent.subscribe()
    }

    /// The current urgent view
    pub fn urgent_view(&self) -> Arc<UrgentView> {
        self.inner.urgent.current()
    }

    /// Recompute the urgent view now; returns true if it changed
    pub fn refresh_urgent(&self) -> bool {
        refresh_urgent(&self.inner, today())
    }

    /// Commit an edited task shown in the urgent view to its own list
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if no task collection holds
    /// the task any more
    pub fn commit_from_urgent(&self, edited: Task) -> Result<DispatchHandle, SyncError> {
        let tasks = &self.inner.tasks;
        let hinted = self
            .inner
            .urgent
            .current()
            .get(&edited.id)
            .map(|entry| entry.source_list_id.clone());

        let source = hinted
            .filter(|list_id| tasks.collection(list_id).iter().any(|t| t.id == edited.id))
            .or_else(|| tasks.find(&edited.id).map(|(list_id, _)| list_id))
            .ok_or_else(|| SyncError::RecordNotFound(edited.id.clone()))?;

        debug!(source = %source, record_id = %edited.id, "Redirecting urgent edit to source list");
        tasks.update(&source, |current| {
            for task in current.iter_mut().filter(|task| task.id == edited.id) {
                *task = edited.clone();
            }
        })
    }

    /// Remove a task shown in the urgent view from its own list
    ///
    /// # Errors
    /// Returns [`SyncError::RecordNotFound`] if no task collection holds it
    pub fn remove_from_urgent(&self, record_id: &RecordId) -> Result<DispatchHandle, SyncError> {
        let (source, _) = self
            .inner
            .tasks
            .find(record_id)
            .ok_or_else(|| SyncError::RecordNotFound(record_id.clone()))?;
        self.inner
            .tasks
            .update(&source, |tasks| tasks.retain(|task| &task.id != record_id))
    }

    fn spawn_urgent_loop(&self) {
        let weak = Arc::downgrade(&self.inner);
        let mut settled = self.inner.tasks.settled();
        let mut lists = self.inner.lists.subscribe();
        let cancel = self.inner.shutdown.clone();

        let task = tokio::spawn(async move {
            let mut clock = tokio::time::interval(URGENT_CLOCK_TICK);
            clock.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                let settled_list = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    event = settled.recv() => match event {
                        Ok(event) => Some(event.list_id),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(skipped, "Urgent loop lagged; recomputing");
                            None
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    changed = lists.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        None
                    }
                    _ = clock.tick() => None,
                };

                let Some(session) = weak.upgrade() else { break };
                if settled_list.is_some_and(|list_id| session.tasks.is_reserved(&list_id)) {
                    continue;
                }
                refresh_urgent(&session, today());
            }
            debug!("Urgent view loop stopped");
        });

        if let Ok(mut slot) = self.inner.urgent_task.lock() {
            *slot = Some(task);
        }
    }
}

impl std::fmt::Debug for Household {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Household")
            .field("household_id", &self.inner.household_id)
            .finish_non_exhaustive()
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

async fn open_in<R: SyncRecord>(sync: &CollectionSync<R>, list_id: &ListId) -> Result<(), SyncError> {
    if let Err(e) = sync.load(list_id).await {
        warn!(list_id = %list_id, error = %e, "Initial load failed; waiting for push");
    }
    sync.activate(list_id).await?;
    Ok(())
}

fn refresh_urgent(session: &Session, today: NaiveDate) -> bool {
    let collections = session.tasks.snapshot();
    let index = Arc::clone(&session.lists.borrow());

    let sources = collections.iter().map(|(list_id, tasks)| UrgentSource {
        list_id,
        list_name: index
            .iter()
            .find(|meta| &meta.id == list_id)
            .map_or(list_id.as_str(), |meta| meta.name.as_str()),
        tasks: tasks.as_slice(),
    });

    session.urgent.refresh(sources, today)
}

/// Apply list index notifications until cancelled
fn spawn_lists_listener(
    session: Weak<Session>,
    mut notifications: mpsc::UnboundedReceiver<ListsNotification>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let notification = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = notifications.recv() => match received {
                    Some(notification) => notification,
                    None => break,
                },
            };
            let Some(inner) = session.upgrade() else { break };
            let household = Household { inner };

            match notification {
                ListsNotification::Created(meta) => {
                    debug!(list_id = %meta.id, domain = %meta.domain, "List created remotely");
                    let load_tasks =
                        meta.domain == ListDomain::Tasks && !household.tasks().is_loaded(&meta.id);
                    let list_id = meta.id.clone();
                    household.index_insert(meta);
                    if load_tasks {
                        if let Err(e) = household.tasks().load(&list_id).await {
                            warn!(list_id = %list_id, error = %e, "Failed to load new task list");
                        }
                    }
                }
                ListsNotification::Deleted(list_id) => {
                    debug!(list_id = %list_id, "List deleted remotely");
                    household.forget_list(&list_id).await;
                }
            }
        }
    })
}
