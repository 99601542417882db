//! Commit flow: optimistic local update, minimal dispatch, failure isolation

use std::time::Duration;

use hearth_core::domain::{ListId, RecordId, ShoppingItem, Task, Voucher, VoucherKind};
use hearth_sync::{diff, RemoteOperation, SyncError};

use crate::common::{self, Call, FakeStore};

fn item(id: &str, text: &str, completed: bool) -> ShoppingItem {
    ShoppingItem {
        id: RecordId::new(id.to_string()).unwrap(),
        text: text.to_string(),
        category: None,
        completed,
        added_by: None,
    }
}

fn rid(id: &str) -> RecordId {
    RecordId::new(id.to_string()).unwrap()
}

// ============================================================================
// Dispatch shape
// ============================================================================

#[tokio::test]
async fn test_commit_dispatches_minimal_operations() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.seed_records(&groceries, &[item("a", "Milk", false), item("b", "Bread", false)]);

    let sync = common::engine::<ShoppingItem>(&store);
    sync.load(&groceries).await.unwrap();
    store.clear_calls();

    let handle = sync
        .commit(&groceries, vec![item("a", "Milk", true), item("c", "Eggs", false)])
        .unwrap();
    let report = common::within(handle.wait()).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.patched, 1);
    assert_eq!(report.deleted, 1);
    assert!(report.is_clean());

    let mut calls = store.calls();
    calls.sort_by_key(|call| format!("{call:?}"));
    assert_eq!(
        calls,
        vec![
            Call::Create(groceries.clone(), rid("c")),
            Call::Delete(rid("b")),
            Call::Patch(rid("a"), vec!["completed".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_identical_commit_sends_nothing() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let items = vec![item("a", "Milk", false)];
    store.seed_records(&groceries, &items);

    let sync = common::engine::<ShoppingItem>(&store);
    sync.load(&groceries).await.unwrap();
    store.clear_calls();

    let handle = sync.commit(&groceries, items).unwrap();
    assert!(handle.is_finished());
    let report = handle.wait().await.unwrap();

    assert_eq!(report.attempted(), 0);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn test_metadata_only_edit_sends_nothing() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.seed_records(&groceries, &[item("a", "Milk", false)]);

    let sync = common::engine::<ShoppingItem>(&store);
    sync.load(&groceries).await.unwrap();
    store.clear_calls();

    let mut annotated = item("a", "Milk", false);
    annotated.added_by = Some("robin".to_string());
    let report = sync.commit(&groceries, vec![annotated]).unwrap().wait().await.unwrap();

    assert_eq!(report.attempted(), 0);
    assert!(store.calls().is_empty());
    assert_eq!(sync.collection(&groceries)[0].added_by.as_deref(), Some("robin"));
}

// ============================================================================
// Optimistic local state
// ============================================================================

#[tokio::test]
async fn test_commit_applies_locally_before_remote_completes() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.stall_writes_for(&rid("slow"));

    let sync = common::engine_with_timeout::<ShoppingItem>(&store, Duration::from_secs(30));
    let handle = sync.commit(&groceries, vec![item("slow", "Flour", false)]).unwrap();

    assert!(!handle.is_finished());
    assert_eq!(sync.collection(&groceries).len(), 1);
    assert_eq!(sync.collection(&groceries)[0].text, "Flour");

    // Dropping the handle detaches the dispatch without affecting local state
    drop(handle);
    assert_eq!(sync.collection(&groceries).len(), 1);
}

#[tokio::test]
async fn test_settle_event_follows_commit() {
    let store = FakeStore::new();
    let chores = common::list_id("chores");
    let sync = common::engine::<Task>(&store);
    let mut settled = sync.settled();

    sync.commit(&chores, vec![Task::new("Hoover")]).unwrap();

    let event = common::within(settled.recv()).await.unwrap();
    assert_eq!(event.list_id, chores);
    assert_eq!(event.origin, hearth_sync::SettleOrigin::Commit);
}

#[tokio::test]
async fn test_update_edits_current_collection() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    let sync = common::engine::<ShoppingItem>(&store);
    sync.commit(&groceries, vec![item("a", "Milk", false)]).unwrap();

    let handle = sync
        .update(&groceries, |items| items.push(item("b", "Tea", false)))
        .unwrap();
    common::within(handle.wait()).await.unwrap();

    let texts: Vec<String> = sync.collection(&groceries).iter().map(|i| i.text.clone()).collect();
    assert_eq!(texts, vec!["Milk", "Tea"]);
}

#[tokio::test]
async fn test_reserved_list_rejects_commit() {
    let store = FakeStore::new();
    let sync = common::engine::<Task>(&store);

    let result = sync.commit(&ListId::urgent(), vec![Task::new("Sneaky")]);

    assert!(matches!(result, Err(SyncError::ReadOnlyList(_))));
    assert!(sync.collection(&ListId::urgent()).is_empty());
    assert!(store.calls().is_empty());
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_failed_write_does_not_affect_others() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.fail_writes_for(&rid("bad"));

    let sync = common::engine::<ShoppingItem>(&store);
    let next = vec![
        item("ok1", "Apples", false),
        item("bad", "Pears", false),
        item("ok2", "Plums", false),
    ];
    let report = common::within(sync.commit(&groceries, next.clone()).unwrap().wait())
        .await
        .unwrap();

    assert_eq!(report.created, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].record_id, rid("bad"));
    assert_eq!(report.failures[0].operation, RemoteOperation::Create);
    assert!(report.failures[0].error.contains("injected"));

    // No rollback: the local copy still holds the unsent record
    assert_eq!(sync.collection(&groceries).as_ref(), &next);

    let stored: Vec<ShoppingItem> = store.records(&groceries);
    let ids: Vec<&str> = stored.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["ok1", "ok2"]);
}

#[tokio::test]
async fn test_timed_out_write_counts_as_failure() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.stall_writes_for(&rid("slow"));

    let sync = common::engine_with_timeout::<ShoppingItem>(&store, Duration::from_millis(50));
    let report = common::within(
        sync.commit(&groceries, vec![item("slow", "Yeast", false), item("fast", "Salt", false)])
            .unwrap()
            .wait(),
    )
    .await
    .unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].error.contains("timed out"));
}

#[tokio::test]
async fn test_later_snapshot_reconciles_failed_write() {
    let store = FakeStore::new();
    let groceries = common::list_id("groceries");
    store.fail_writes_for(&rid("bad"));

    let sync = common::engine::<ShoppingItem>(&store);
    sync.activate(&groceries).await.unwrap();

    let report = common::within(
        sync.commit(&groceries, vec![item("bad", "Pears", false)]).unwrap().wait(),
    )
    .await
    .unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(sync.collection(&groceries).len(), 1);

    store.push_snapshot(&groceries);
    assert!(common::eventually(|| sync.collection(&groceries).is_empty()).await);
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_applied_commit_round_trips_to_empty_diff() {
    let store = FakeStore::new();
    let chores = common::list_id("chores");
    let mut hoover = Task::new("Hoover");
    hoover.id = rid("t1");
    let mut dishes = Task::new("Dishes");
    dishes.id = rid("t2");
    store.seed_records(&chores, &[hoover.clone(), dishes.clone()]);

    let sync = common::engine::<Task>(&store);
    sync.load(&chores).await.unwrap();

    let mut windows = Task::new("Windows").with_assignee("kim");
    windows.id = rid("t3");
    let next = vec![hoover.toggled(), windows];
    let report = common::within(sync.commit(&chores, next.clone()).unwrap().wait())
        .await
        .unwrap();
    assert!(report.is_clean());

    let refetched = sync.fetch(&chores).await.unwrap();
    assert!(diff(&next, &refetched).is_empty());
}

// ============================================================================
// Voucher lists
// ============================================================================

#[tokio::test]
async fn test_redeeming_voucher_patches_flag_and_takes_pushed_snapshot() {
    let store = FakeStore::new();
    let wallet = common::list_id("wallet");
    let mut cinema = Voucher::new("Cinema", VoucherKind::Voucher);
    cinema.id = rid("cinema");
    cinema.code = Some("FILM-42".to_string());
    let mut dinner = Voucher::new("Dinner at Luigi's", VoucherKind::Reservation);
    dinner.id = rid("dinner");
    store.seed_records(&wallet, &[cinema.clone(), dinner.clone()]);

    let sync = common::engine::<Voucher>(&store);
    sync.load(&wallet).await.unwrap();
    sync.activate(&wallet).await.unwrap();
    store.clear_calls();

    let handle = sync
        .update(&wallet, |vouchers| {
            for voucher in vouchers.iter_mut().filter(|v| v.id == cinema.id) {
                voucher.redeemed = true;
            }
        })
        .unwrap();
    assert!(sync.collection(&wallet)[0].redeemed);

    let report = common::within(handle.wait()).await.unwrap();
    assert_eq!(report.patched, 1);
    assert!(report.is_clean());
    assert_eq!(
        store.calls(),
        vec![Call::Patch(rid("cinema"), vec!["redeemed".to_string()])]
    );
    assert!(store.records::<Voucher>(&wallet)[0].redeemed);

    // Another member adds the table number; the snapshot replaces the copy
    dinner.notes = Some("Table 7".to_string());
    let mut redeemed = cinema.clone();
    redeemed.redeemed = true;
    store.seed_records(&wallet, &[redeemed, dinner]);
    assert_eq!(store.push_snapshot(&wallet), 1);

    assert!(common::eventually(|| {
        sync.collection(&wallet)
            .iter()
            .any(|v| v.notes.as_deref() == Some("Table 7"))
    })
    .await);
    assert_eq!(sync.collection(&wallet).len(), 2);
    sync.deactivate(&wallet).await;
}
