//! Subscription lifecycle and push-driven replacement

use std::time::Duration;

use serde_json::json;

use hearth_core::domain::{RecordId, ShoppingItem, SubscriptionId};
use hearth_core::ports::ItemsNotification;

use crate::common::{self, Call, FakeStore};

fn item(id: &str, text: &str) -> ShoppingItem {
    ShoppingItem {
        id: RecordId::new(id.to_string()).unwrap(),
        text: text.to_string(),
        category: None,
        completed: false,
        added_by: None,
    }
}

fn subscribed_handles(calls: &[Call]) -> Vec<SubscriptionId> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::SubscribeItems(_, handle) => Some(*handle),
            _ => None,
        })
        .collect()
}

fn released_handles(calls: &[Call]) -> Vec<SubscriptionId> {
    calls
        .iter()
        .filter_map(|call| match call {
            Call::Unsubscribe(handle) => Some(*handle),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_activate_twice_subscribes_once() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let sync = common::engine::<ShoppingItem>(&store);

    assert!(sync.activate(&groceries).await.unwrap());
    assert!(!sync.activate(&groceries).await.unwrap());

    assert_eq!(subscribed_handles(&store.calls()).len(), 1);
    assert_eq!(sync.active().await, Some(groceries));
}

#[tokio::test]
async fn test_switching_unsubscribes_old_then_subscribes_new() {
    let store = FakeStore::new();
    let first = common::list_id("weekly");
    let second = common::list_id("party");
    let sync = common::engine::<ShoppingItem>(&store);

    sync.activate(&first).await.unwrap();
    sync.activate(&second).await.unwrap();

    let calls = store.writes_and_subscriptions();
    let handles = subscribed_handles(&calls);
    assert_eq!(handles.len(), 2);
    assert_eq!(
        calls,
        vec![
            Call::SubscribeItems(first.clone(), handles[0]),
            Call::Unsubscribe(handles[0]),
            Call::SubscribeItems(second.clone(), handles[1]),
        ]
    );
    assert_eq!(store.live_item_subscriptions(), vec![second]);
}

#[tokio::test]
async fn test_rapid_switching_keeps_one_live_subscription() {
    let store = FakeStore::new();
    let lists: Vec<_> = ["a", "b", "c", "d"].into_iter().map(common::list_id).collect();
    let sync = common::engine::<ShoppingItem>(&store);

    let (r1, r2, r3, r4) = tokio::join!(
        sync.activate(&lists[0]),
        sync.activate(&lists[1]),
        sync.activate(&lists[2]),
        sync.activate(&lists[1]),
    );
    for result in [r1, r2, r3, r4] {
        result.unwrap();
    }
    sync.activate(&lists[3]).await.unwrap();

    let calls = store.writes_and_subscriptions();
    let subscribed = subscribed_handles(&calls);
    let released = released_handles(&calls);

    // Every subscription but the live one was released exactly once, in order
    assert_eq!(released.len(), subscribed.len() - 1);
    assert_eq!(released, subscribed[..subscribed.len() - 1].to_vec());

    // Calls strictly alternate subscribe / unsubscribe
    for pair in calls.windows(2) {
        let alternates = matches!(
            pair,
            [Call::SubscribeItems(..), Call::Unsubscribe(_)]
                | [Call::Unsubscribe(_), Call::SubscribeItems(..)]
        );
        assert!(alternates, "unexpected call order: {pair:?}");
    }

    assert_eq!(store.live_item_subscriptions(), vec![lists[3].clone()]);
    assert_eq!(sync.active().await, Some(lists[3].clone()));
}

#[tokio::test]
async fn test_deactivate_releases_subscription() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let sync = common::engine::<ShoppingItem>(&store);

    sync.activate(&groceries).await.unwrap();
    assert!(!sync.deactivate(&common::list_id("other")).await);
    assert!(sync.deactivate(&groceries).await);

    assert!(store.live_item_subscriptions().is_empty());
    assert_eq!(sync.active().await, None);
    assert_eq!(released_handles(&store.calls()).len(), 1);
}

#[tokio::test]
async fn test_forget_drops_collection_and_subscription() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.seed_records(&groceries, &[item("a", "Milk")]);
    let sync = common::engine::<ShoppingItem>(&store);

    sync.load(&groceries).await.unwrap();
    sync.activate(&groceries).await.unwrap();
    sync.forget(&groceries).await;

    assert!(!sync.is_loaded(&groceries));
    assert!(store.live_item_subscriptions().is_empty());
}

// ============================================================================
// Push-driven replacement
// ============================================================================

#[tokio::test]
async fn test_snapshot_replaces_local_state_with_pending_writes() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.stall_writes_for(&RecordId::new("local".to_string()).unwrap());
    let sync = common::engine_with_timeout::<ShoppingItem>(&store, Duration::from_secs(30));

    sync.activate(&groceries).await.unwrap();
    let pending = sync.commit(&groceries, vec![item("local", "Pending")]).unwrap();
    assert!(!pending.is_finished());

    let remote = vec![item("r1", "Coffee"), item("r2", "Sugar")];
    store.seed_records(&groceries, &remote);
    assert_eq!(store.push_snapshot(&groceries), 1);

    assert!(common::eventually(|| sync.collection(&groceries).as_ref() == &remote).await);
}

#[tokio::test]
async fn test_invalidated_triggers_refetch() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let sync = common::engine::<ShoppingItem>(&store);
    sync.activate(&groceries).await.unwrap();

    store.seed_records(&groceries, &[item("x", "Butter")]);
    store.push(&groceries, ItemsNotification::Invalidated);

    assert!(common::eventually(|| sync.collection(&groceries).len() == 1).await);
    assert!(store.calls().contains(&Call::FetchItems(groceries.clone())));
}

#[tokio::test]
async fn test_failed_refetch_keeps_local_state() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.seed_records(&groceries, &[item("a", "Milk")]);
    let sync = common::engine::<ShoppingItem>(&store);
    sync.load(&groceries).await.unwrap();
    sync.activate(&groceries).await.unwrap();

    store.set_fail_fetch(true);
    store.push(&groceries, ItemsNotification::Invalidated);
    assert!(
        common::eventually(|| {
            store
                .calls()
                .iter()
                .filter(|c| **c == Call::FetchItems(groceries.clone()))
                .count()
                == 2
        })
        .await
    );

    // Listener survives the failure and applies the next snapshot
    store.seed_records(&groceries, &[item("a", "Milk"), item("b", "Jam")]);
    assert_eq!(sync.collection(&groceries).len(), 1);
    store.push_snapshot(&groceries);
    assert!(common::eventually(|| sync.collection(&groceries).len() == 2).await);
}

#[tokio::test]
async fn test_failed_load_leaves_state_untouched() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let sync = common::engine::<ShoppingItem>(&store);
    sync.commit(&groceries, vec![item("a", "Milk")]).unwrap();

    store.set_fail_fetch(true);
    assert!(sync.load(&groceries).await.is_err());
    assert_eq!(sync.collection(&groceries).len(), 1);
}

#[tokio::test]
async fn test_malformed_documents_are_skipped() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let sync = common::engine::<ShoppingItem>(&store);
    sync.activate(&groceries).await.unwrap();

    store.push(
        &groceries,
        ItemsNotification::Snapshot(vec![
            json!({"id": "ok", "text": "Rice"}),
            json!({"id": "broken", "text": 42}),
            json!(null),
        ]),
    );

    assert!(common::eventually(|| sync.collection(&groceries).len() == 1).await);
    assert_eq!(sync.collection(&groceries)[0].text, "Rice");
}

#[tokio::test]
async fn test_notifications_after_teardown_are_ignored() {
    let store = FakeStore::new();
    store.keep_released_sinks();
    let first = common::list_id("weekly");
    let second = common::list_id("party");
    let sync = common::engine::<ShoppingItem>(&store);

    sync.activate(&first).await.unwrap();
    sync.activate(&second).await.unwrap();

    store.push_released(
        &first,
        ItemsNotification::Snapshot(vec![json!({"id": "stale", "text": "Ghost"})]),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!sync.is_loaded(&first));
}
