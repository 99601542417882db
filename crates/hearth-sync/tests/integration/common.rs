//! Shared test helpers for sync engine integration tests
//!
//! Provides an in-memory [`FakeStore`] implementing `IBackingStore` that
//! records every call, applies writes to its own documents, and lets tests
//! inject write failures, stalled writes and push notifications.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use hearth_core::domain::{
    document_id, HouseholdId, ListId, ListMeta, RecordDocument, RecordId, RecordPatch,
    SubscriptionId, SyncRecord,
};
use hearth_core::ports::{IBackingStore, ItemsNotification, ListsNotification};
use hearth_sync::registry::SubscriptionTable;
use hearth_sync::CollectionSync;

/// One observed call on the fake store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    FetchLists,
    FetchItems(ListId),
    Create(ListId, RecordId),
    Patch(RecordId, Vec<String>),
    Delete(RecordId),
    CreateList(ListId),
    DeleteList(ListId),
    SubscribeItems(ListId, SubscriptionId),
    SubscribeLists(SubscriptionId),
    Unsubscribe(SubscriptionId),
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    lists: Vec<(HouseholdId, ListMeta)>,
    items: BTreeMap<ListId, Vec<RecordDocument>>,
    failing: HashSet<RecordId>,
    stalled: HashSet<RecordId>,
    fail_fetch: bool,
    changes_after_list_fetch: Vec<(HouseholdId, ListsNotification)>,
    keep_sinks: bool,
    item_sinks: HashMap<SubscriptionId, (ListId, UnboundedSender<ItemsNotification>)>,
    list_sinks: HashMap<SubscriptionId, UnboundedSender<ListsNotification>>,
    released_sinks: Vec<(ListId, UnboundedSender<ItemsNotification>)>,
}

/// In-memory backing store with failure injection
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    // ------------------------------------------------------------------------
    // Seeding and injection
    // ------------------------------------------------------------------------

    pub fn seed_list(&self, household: &HouseholdId, meta: ListMeta) {
        self.with_state(|s| s.lists.push((household.clone(), meta)));
    }

    pub fn seed_records<R: SyncRecord>(&self, list_id: &ListId, records: &[R]) {
        let documents: Vec<RecordDocument> =
            records.iter().map(|r| r.to_document().unwrap()).collect();
        self.with_state(|s| {
            s.items.insert(list_id.clone(), documents);
        });
    }

    pub fn seed_documents(&self, list_id: &ListId, documents: Vec<RecordDocument>) {
        self.with_state(|s| {
            s.items.insert(list_id.clone(), documents);
        });
    }

    /// Every write touching `record_id` fails
    pub fn fail_writes_for(&self, record_id: &RecordId) {
        self.with_state(|s| s.failing.insert(record_id.clone()));
    }

    /// Every write touching `record_id` hangs
    pub fn stall_writes_for(&self, record_id: &RecordId) {
        self.with_state(|s| s.stalled.insert(record_id.clone()));
    }

    /// Apply a list creation or deletion right after the next list index
    /// read, as another client racing with it would
    pub fn change_lists_after_fetch(&self, household: &HouseholdId, change: ListsNotification) {
        self.with_state(|s| s.changes_after_list_fetch.push((household.clone(), change)));
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.with_state(|s| s.fail_fetch = fail);
    }

    /// Keep senders of released subscriptions around so tests can emit
    /// stale notifications
    pub fn keep_released_sinks(&self) {
        self.with_state(|s| s.keep_sinks = true);
    }

    // ------------------------------------------------------------------------
    // Push helpers
    // ------------------------------------------------------------------------

    /// Send a notification to every live subscriber of `list_id`
    pub fn push(&self, list_id: &ListId, notification: ItemsNotification) -> usize {
        self.with_state(|s| {
            s.item_sinks
                .values()
                .filter(|(subscribed, _)| subscribed == list_id)
                .filter(|(_, sink)| sink.send(notification.clone()).is_ok())
                .count()
        })
    }

    /// Push the stored documents of `list_id` as a snapshot
    pub fn push_snapshot(&self, list_id: &ListId) -> usize {
        let documents = self.documents(list_id);
        self.push(list_id, ItemsNotification::Snapshot(documents))
    }

    /// Send through senders whose subscription was already released
    pub fn push_released(&self, list_id: &ListId, notification: ItemsNotification) -> usize {
        self.with_state(|s| {
            s.released_sinks
                .iter()
                .filter(|(subscribed, _)| subscribed == list_id)
                .filter(|(_, sink)| sink.send(notification.clone()).is_ok())
                .count()
        })
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }

    /// Calls other than fetches, in order
    pub fn writes_and_subscriptions(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, Call::FetchItems(_) | Call::FetchLists))
            .collect()
    }

    pub fn documents(&self, list_id: &ListId) -> Vec<RecordDocument> {
        self.with_state(|s| s.items.get(list_id).cloned().unwrap_or_default())
    }

    pub fn records<R: SyncRecord>(&self, list_id: &ListId) -> Vec<R> {
        self.documents(list_id)
            .into_iter()
            .map(|doc| R::from_document(doc).unwrap())
            .collect()
    }

    pub fn has_collection(&self, list_id: &ListId) -> bool {
        self.with_state(|s| s.items.contains_key(list_id))
    }

    pub fn live_item_subscriptions(&self) -> Vec<ListId> {
        self.with_state(|s| s.item_sinks.values().map(|(l, _)| l.clone()).collect())
    }

    pub fn live_list_subscriptions(&self) -> usize {
        self.with_state(|s| s.list_sinks.len())
    }

    fn begin_write(&self, call: Call, record_id: &RecordId) -> (bool, bool) {
        self.with_state(|s| {
            s.calls.push(call);
            (s.failing.contains(record_id), s.stalled.contains(record_id))
        })
    }
}

async fn stall() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

#[async_trait::async_trait]
impl IBackingStore for FakeStore {
    async fn fetch_lists(&self, household: &HouseholdId) -> anyhow::Result<Vec<ListMeta>> {
        self.with_state(|s| -> anyhow::Result<Vec<ListMeta>> {
            s.calls.push(Call::FetchLists);
            let index = s
                .lists
                .iter()
                .filter(|(owner, _)| owner == household)
                .map(|(_, meta)| meta.clone())
                .collect();

            for (owner, change) in std::mem::take(&mut s.changes_after_list_fetch) {
                match &change {
                    ListsNotification::Created(meta) => {
                        s.lists.push((owner, meta.clone()));
                        s.items.entry(meta.id.clone()).or_default();
                    }
                    ListsNotification::Deleted(list_id) => {
                        s.lists.retain(|(_, meta)| &meta.id != list_id);
                        s.items.remove(list_id);
                    }
                }
                for sink in s.list_sinks.values() {
                    let _ = sink.send(change.clone());
                }
            }
            Ok(index)
        })
    }

    async fn fetch_items(&self, list_id: &ListId) -> anyhow::Result<Vec<RecordDocument>> {
        self.with_state(|s| -> anyhow::Result<Vec<RecordDocument>> {
            s.calls.push(Call::FetchItems(list_id.clone()));
            if s.fail_fetch {
                anyhow::bail!("store unreachable");
            }
            Ok(s.items.get(list_id).cloned().unwrap_or_default())
        })
    }

    async fn create_item(&self, list_id: &ListId, record: RecordDocument) -> anyhow::Result<()> {
        let record_id = document_id(&record).ok_or_else(|| anyhow::anyhow!("record without id"))?;
        let (fail, hang) = self.begin_write(Call::Create(list_id.clone(), record_id.clone()), &record_id);
        if hang {
            stall().await;
        }
        if fail {
            anyhow::bail!("injected create failure for {record_id}");
        }
        self.with_state(|s| {
            let documents = s.items.entry(list_id.clone()).or_default();
            documents.retain(|doc| document_id(doc).as_ref() != Some(&record_id));
            documents.push(record);
        });
        Ok(())
    }

    async fn patch_item(&self, record_id: &RecordId, patch: &RecordPatch) -> anyhow::Result<()> {
        let fields = patch.field_names().map(str::to_string).collect();
        let (fail, hang) = self.begin_write(Call::Patch(record_id.clone(), fields), record_id);
        if hang {
            stall().await;
        }
        if fail {
            anyhow::bail!("injected patch failure for {record_id}");
        }
        self.with_state(|s| -> anyhow::Result<()> {
            let document = s
                .items
                .values_mut()
                .flat_map(|documents| documents.iter_mut())
                .find(|doc| document_id(doc).as_ref() == Some(record_id))
                .ok_or_else(|| anyhow::anyhow!("no record {record_id}"))?;
            patch.apply_to(document)?;
            Ok(())
        })
    }

    async fn delete_item(&self, record_id: &RecordId) -> anyhow::Result<()> {
        let (fail, hang) = self.begin_write(Call::Delete(record_id.clone()), record_id);
        if hang {
            stall().await;
        }
        if fail {
            anyhow::bail!("injected delete failure for {record_id}");
        }
        self.with_state(|s| {
            for documents in s.items.values_mut() {
                documents.retain(|doc| document_id(doc).as_ref() != Some(record_id));
            }
        });
        Ok(())
    }

    async fn create_list(&self, household: &HouseholdId, meta: &ListMeta) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.calls.push(Call::CreateList(meta.id.clone()));
            s.lists.push((household.clone(), meta.clone()));
            s.items.entry(meta.id.clone()).or_default();
            for sink in s.list_sinks.values() {
                let _ = sink.send(ListsNotification::Created(meta.clone()));
            }
        });
        Ok(())
    }

    async fn delete_list(&self, list_id: &ListId) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.calls.push(Call::DeleteList(list_id.clone()));
            s.lists.retain(|(_, meta)| &meta.id != list_id);
            s.items.remove(list_id);
            s.items.remove(&ListId::master_of(list_id));
            for sink in s.list_sinks.values() {
                let _ = sink.send(ListsNotification::Deleted(list_id.clone()));
            }
        });
        Ok(())
    }

    async fn subscribe_items(
        &self,
        list_id: &ListId,
        sink: UnboundedSender<ItemsNotification>,
    ) -> anyhow::Result<SubscriptionId> {
        let handle = SubscriptionId::next();
        self.with_state(|s| {
            s.calls.push(Call::SubscribeItems(list_id.clone(), handle));
            s.item_sinks.insert(handle, (list_id.clone(), sink));
        });
        Ok(handle)
    }

    async fn subscribe_lists(
        &self,
        _household: &HouseholdId,
        sink: UnboundedSender<ListsNotification>,
    ) -> anyhow::Result<SubscriptionId> {
        let handle = SubscriptionId::next();
        self.with_state(|s| {
            s.calls.push(Call::SubscribeLists(handle));
            s.list_sinks.insert(handle, sink);
        });
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionId) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.calls.push(Call::Unsubscribe(handle));
            if let Some(entry) = s.item_sinks.remove(&handle) {
                if s.keep_sinks {
                    s.released_sinks.push(entry);
                }
            }
            s.list_sinks.remove(&handle);
        });
        Ok(())
    }
}

// ============================================================================
// Engine helpers
// ============================================================================

pub fn list_id(id: &str) -> ListId {
    ListId::new(id.to_string()).unwrap()
}

pub fn household() -> HouseholdId {
    HouseholdId::new("home".to_string()).unwrap()
}

/// Engine over `store` with a short write timeout
pub fn engine<R: SyncRecord>(store: &Arc<FakeStore>) -> CollectionSync<R> {
    engine_with_timeout(store, Duration::from_millis(200))
}

pub fn engine_with_timeout<R: SyncRecord>(
    store: &Arc<FakeStore>,
    timeout: Duration,
) -> CollectionSync<R> {
    CollectionSync::new(
        Arc::clone(store) as Arc<dyn IBackingStore>,
        Arc::new(SubscriptionTable::new()),
        timeout,
        vec![ListId::urgent()],
    )
}

/// Poll `condition` until it holds or two seconds pass
pub async fn eventually<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Await `future` for at most two seconds
pub async fn within<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(2), future)
        .await
        .expect("operation did not complete in time")
}
