//! In-memory collection store
//!
//! Holds the local copy of every loaded collection of one record domain.
//! Collections are immutable `Arc<Vec<R>>` snapshots; every commit or push
//! replaces the whole snapshot, so readers never observe a half-applied
//! update.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use hearth_core::domain::{ListId, RecordId, SyncRecord};

/// Shared snapshot of one collection
pub type Collection<R> = Arc<Vec<R>>;

/// Local collections of a single record domain, keyed by list id
#[derive(Debug)]
pub struct CollectionStore<R> {
    collections: DashMap<ListId, Collection<R>>,
}

impl<R> Default for CollectionStore<R> {
    fn default() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }
}

impl<R: SyncRecord> CollectionStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of a collection, if it was ever loaded or committed
    pub fn get(&self, list_id: &ListId) -> Option<Collection<R>> {
        self.collections
            .get(list_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Current snapshot, or an empty collection for unknown lists
    pub fn get_or_empty(&self, list_id: &ListId) -> Collection<R> {
        self.get(list_id).unwrap_or_default()
    }

    /// Atomically install `next` and return what it replaced
    pub fn swap(&self, list_id: &ListId, next: Collection<R>) -> Option<Collection<R>> {
        self.collections.insert(list_id.clone(), next)
    }

    /// Drop a collection from memory
    pub fn remove(&self, list_id: &ListId) -> Option<Collection<R>> {
        self.collections.remove(list_id).map(|(_, collection)| collection)
    }

    pub fn contains(&self, list_id: &ListId) -> bool {
        self.collections.contains_key(list_id)
    }

    /// Ids of all loaded collections, sorted
    pub fn list_ids(&self) -> Vec<ListId> {
        let mut ids: Vec<ListId> = self.collections.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Point-in-time copy of every loaded collection
    pub fn snapshot(&self) -> BTreeMap<ListId, Collection<R>> {
        self.collections
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    /// Locate a record by id across all loaded collections
    pub fn find(&self, record_id: &RecordId) -> Option<(ListId, R)> {
        self.collections.iter().find_map(|entry| {
            entry
                .value()
                .iter()
                .rev()
                .find(|record| record.id() == record_id)
                .map(|record| (entry.key().clone(), record.clone()))
        })
    }
}
