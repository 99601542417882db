//! SQLite implementation of IBackingStore
//!
//! Lists live in the `lists` table, scoped by household. Every item
//! collection (including master templates, which have no list row) lives in
//! `items`, one JSON document per row.
//!
//! ## Type Mapping
//!
//! | Domain Type          | SQL Type | Strategy                              |
//! |----------------------|----------|---------------------------------------|
//! | ListId, RecordId     | TEXT     | `.as_str()` / `::new()`               |
//! | HouseholdId          | TEXT     | `.as_str()` / `HouseholdId::new()`    |
//! | ListDomain           | TEXT     | `.name()` / `FromStr`                 |
//! | RecordDocument       | TEXT     | serde_json serialization              |
//! | DateTime<Utc>        | TEXT     | ISO 8601 via `to_rfc3339()`           |
//!
//! ## Notifications
//!
//! Writes made through this instance are pushed to its own subscribers as a
//! full snapshot of the affected collection. Writes from other processes
//! sharing the database file are not observed.
//!
//! Publishing is best-effort: the snapshot is read after the write has
//! committed, and a failing read is logged without failing the write. On a
//! pool with several connections, snapshots of concurrent writes to one
//! collection may be delivered out of order, so the last one received can
//! be stale until the next write.

use std::str::FromStr;

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

use hearth_core::domain::{
    document_id, HouseholdId, ListDomain, ListId, ListMeta, RecordDocument, RecordId, RecordPatch,
    SubscriptionId,
};
use hearth_core::ports::{IBackingStore, ItemsNotification, ListsNotification};

use crate::notifier::Notifier;
use crate::StoreError;

/// SQLite-based implementation of the backing store port
pub struct SqliteBackingStore {
    pool: SqlitePool,
    notifier: Notifier,
}

impl SqliteBackingStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            notifier: Notifier::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Number of live push subscriptions of either kind
    pub fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }

    async fn load_documents(&self, list_id: &ListId) -> Result<Vec<RecordDocument>, StoreError> {
        let rows = sqlx::query("SELECT data FROM items WHERE list_id = ? ORDER BY rowid")
            .bind(list_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(document_from_row).collect()
    }

    /// Push the current contents of `list_id` to its subscribers
    async fn publish_snapshot(&self, list_id: &ListId) {
        if !self.notifier.has_item_subscribers(list_id) {
            return;
        }
        match self.load_documents(list_id).await {
            Ok(documents) => {
                self.notifier
                    .notify_items(list_id, &ItemsNotification::Snapshot(documents));
            }
            Err(e) => warn!(list_id = %list_id, error = %e, "Failed to publish snapshot"),
        }
    }

    /// Same as `publish_snapshot`, for a list id read back from `items`
    async fn publish_stored_snapshot(&self, list_id: String) {
        match ListId::new(list_id) {
            Ok(list_id) => self.publish_snapshot(&list_id).await,
            Err(e) => warn!(error = %e, "Stored item has an invalid list id"),
        }
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn document_from_row(row: &SqliteRow) -> Result<RecordDocument, StoreError> {
    let data: String = row.try_get("data")?;
    Ok(serde_json::from_str(&data)?)
}

fn list_meta_from_row(row: &SqliteRow) -> Result<ListMeta, StoreError> {
    let id: String = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let domain: String = row.try_get("domain")?;

    Ok(ListMeta {
        id: ListId::new(id).map_err(|e| StoreError::SerializationError(e.to_string()))?,
        name,
        domain: ListDomain::from_str(&domain)
            .map_err(|e| StoreError::SerializationError(e.to_string()))?,
    })
}

fn household_from_row(row: &SqliteRow) -> Result<HouseholdId, StoreError> {
    let household: String = row.try_get("household_id")?;
    HouseholdId::new(household).map_err(|e| StoreError::SerializationError(e.to_string()))
}

// ============================================================================
// IBackingStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IBackingStore for SqliteBackingStore {
    async fn fetch_lists(&self, household: &HouseholdId) -> anyhow::Result<Vec<ListMeta>> {
        let rows = sqlx::query(
            "SELECT id, name, domain FROM lists WHERE household_id = ? ORDER BY rowid",
        )
        .bind(household.as_str())
        .fetch_all(&self.pool)
        .await?;

        let lists = rows
            .iter()
            .map(list_meta_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        trace!(household = %household, count = lists.len(), "Fetched lists");
        Ok(lists)
    }

    async fn fetch_items(&self, list_id: &ListId) -> anyhow::Result<Vec<RecordDocument>> {
        let documents = self.load_documents(list_id).await?;
        trace!(list_id = %list_id, count = documents.len(), "Fetched items");
        Ok(documents)
    }

    async fn create_item(&self, list_id: &ListId, record: RecordDocument) -> anyhow::Result<()> {
        let record_id = document_id(&record).ok_or_else(|| {
            StoreError::SerializationError("record document has no id".to_string())
        })?;
        let data = serde_json::to_string(&record)?;

        // Upsert keeps the original rowid, and with it the collection order
        sqlx::query(
            r#"INSERT INTO items (id, list_id, data, updated_at) VALUES (?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   list_id = excluded.list_id,
                   data = excluded.data,
                   updated_at = excluded.updated_at"#,
        )
        .bind(record_id.as_str())
        .bind(list_id.as_str())
        .bind(&data)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(list_id = %list_id, record_id = %record_id, "Item created");
        self.publish_snapshot(list_id).await;
        Ok(())
    }

    async fn patch_item(&self, record_id: &RecordId, patch: &RecordPatch) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT list_id, data FROM items WHERE id = ?")
            .bind(record_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("record {record_id}")))?;

        let list_id: String = row.try_get("list_id")?;
        let mut document = document_from_row(&row)?;
        patch.apply_to(&mut document)?;

        sqlx::query("UPDATE items SET data = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(&document)?)
            .bind(Utc::now().to_rfc3339())
            .bind(record_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(record_id = %record_id, fields = patch.len(), "Item patched");
        self.publish_stored_snapshot(list_id).await;
        Ok(())
    }

    async fn delete_item(&self, record_id: &RecordId) -> anyhow::Result<()> {
        let row = sqlx::query("DELETE FROM items WHERE id = ? RETURNING list_id")
            .bind(record_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        // Deleting a missing record is not an error
        let Some(row) = row else {
            trace!(record_id = %record_id, "Delete of unknown item ignored");
            return Ok(());
        };

        let list_id: String = row.try_get("list_id")?;
        debug!(record_id = %record_id, list_id = %list_id, "Item deleted");
        self.publish_stored_snapshot(list_id).await;
        Ok(())
    }

    async fn create_list(&self, household: &HouseholdId, meta: &ListMeta) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO lists (id, household_id, name, domain, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(meta.id.as_str())
        .bind(household.as_str())
        .bind(&meta.name)
        .bind(meta.domain.name())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(household = %household, list_id = %meta.id, domain = %meta.domain, "List created");
        self.notifier
            .notify_lists(household, &ListsNotification::Created(meta.clone()));
        Ok(())
    }

    async fn delete_list(&self, list_id: &ListId) -> anyhow::Result<()> {
        let master = ListId::master_of(list_id);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT household_id FROM lists WHERE id = ?")
            .bind(list_id.as_str())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("list {list_id}")))?;
        let household = household_from_row(&row)?;

        let removed = sqlx::query("DELETE FROM items WHERE list_id IN (?, ?)")
            .bind(list_id.as_str())
            .bind(master.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        sqlx::query("DELETE FROM lists WHERE id = ?")
            .bind(list_id.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!(list_id = %list_id, removed_items = removed, "List deleted");
        self.notifier
            .notify_lists(&household, &ListsNotification::Deleted(list_id.clone()));
        for collection in [list_id, &master] {
            self.notifier
                .notify_items(collection, &ItemsNotification::Snapshot(Vec::new()));
        }
        Ok(())
    }

    async fn subscribe_items(
        &self,
        list_id: &ListId,
        sink: UnboundedSender<ItemsNotification>,
    ) -> anyhow::Result<SubscriptionId> {
        let handle = self.notifier.add_items(list_id.clone(), sink);

        let documents = match self.load_documents(list_id).await {
            Ok(documents) => documents,
            Err(e) => {
                self.notifier.remove(handle);
                return Err(e.into());
            }
        };
        self.notifier
            .send_to(handle, ItemsNotification::Snapshot(documents));

        debug!(list_id = %list_id, handle = %handle, "Item subscription opened");
        Ok(handle)
    }

    async fn subscribe_lists(
        &self,
        household: &HouseholdId,
        sink: UnboundedSender<ListsNotification>,
    ) -> anyhow::Result<SubscriptionId> {
        let handle = self.notifier.add_lists(household.clone(), sink);
        debug!(household = %household, handle = %handle, "List subscription opened");
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: SubscriptionId) -> anyhow::Result<()> {
        if self.notifier.remove(handle) {
            debug!(handle = %handle, "Subscription closed");
        } else {
            trace!(handle = %handle, "Unsubscribe of unknown handle ignored");
        }
        Ok(())
    }
}
