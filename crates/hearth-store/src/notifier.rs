//! In-process subscriber registry
//!
//! Keeps the notification sinks handed to `subscribe_items` and
//! `subscribe_lists` and fans out notifications after writes. Sinks whose
//! receiver was dropped are pruned on the next delivery attempt.

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

use hearth_core::domain::{HouseholdId, ListId, SubscriptionId};
use hearth_core::ports::{ItemsNotification, ListsNotification};

struct ItemSink {
    list_id: ListId,
    sender: UnboundedSender<ItemsNotification>,
}

struct ListSink {
    household: HouseholdId,
    sender: UnboundedSender<ListsNotification>,
}

/// Registered push subscribers of one store instance
#[derive(Default)]
pub struct Notifier {
    items: DashMap<SubscriptionId, ItemSink>,
    lists: DashMap<SubscriptionId, ListSink>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_items(
        &self,
        list_id: ListId,
        sender: UnboundedSender<ItemsNotification>,
    ) -> SubscriptionId {
        let handle = SubscriptionId::next();
        self.items.insert(handle, ItemSink { list_id, sender });
        handle
    }

    pub fn add_lists(
        &self,
        household: HouseholdId,
        sender: UnboundedSender<ListsNotification>,
    ) -> SubscriptionId {
        let handle = SubscriptionId::next();
        self.lists.insert(handle, ListSink { household, sender });
        handle
    }

    /// Forget a handle; returns false if it was unknown
    pub fn remove(&self, handle: SubscriptionId) -> bool {
        self.items.remove(&handle).is_some() || self.lists.remove(&handle).is_some()
    }

    /// True if anyone listens to `list_id`
    pub fn has_item_subscribers(&self, list_id: &ListId) -> bool {
        self.items.iter().any(|entry| &entry.value().list_id == list_id)
    }

    /// Deliver to one subscription only
    pub fn send_to(&self, handle: SubscriptionId, notification: ItemsNotification) -> bool {
        let delivered = self
            .items
            .get(&handle)
            .is_some_and(|sink| sink.sender.send(notification).is_ok());
        if !delivered {
            self.items.remove(&handle);
        }
        delivered
    }

    /// Deliver to every subscriber of `list_id`; returns the delivery count
    pub fn notify_items(&self, list_id: &ListId, notification: &ItemsNotification) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.items.iter().filter(|e| &e.value().list_id == list_id) {
            if entry.value().sender.send(notification.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for handle in closed {
            self.items.remove(&handle);
        }

        trace!(list_id = %list_id, delivered, "Item notification fanned out");
        delivered
    }

    /// Deliver to every list-index subscriber of `household`
    pub fn notify_lists(&self, household: &HouseholdId, notification: &ListsNotification) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.lists.iter().filter(|e| &e.value().household == household) {
            if entry.value().sender.send(notification.clone()).is_ok() {
                delivered += 1;
            } else {
                closed.push(*entry.key());
            }
        }
        for handle in closed {
            self.lists.remove(&handle);
        }

        trace!(household = %household, delivered, "List notification fanned out");
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.items.len() + self.lists.len()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("item_subscribers", &self.items.len())
            .field("list_subscribers", &self.lists.len())
            .finish()
    }
}
