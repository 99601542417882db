//! Push subscription listeners
//!
//! One listener task runs per active collection. It drains the
//! notification channel handed to the backing store and feeds every
//! snapshot into the engine as a full replacement of the local copy:
//!
//! - [`ItemsNotification::Snapshot`] is decoded and applied as-is.
//! - [`ItemsNotification::Invalidated`] triggers a fetch; if the fetch
//!   fails the failure is logged and the local copy is kept.
//!
//! The loop exits when its cancellation token fires, the backing store
//! drops the sending side, or the engine itself was dropped. Once cancelled, a listener never applies another
//! snapshot, including one whose fetch was already in flight.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use hearth_core::domain::{ListId, SyncRecord};
use hearth_core::ports::ItemsNotification;

use crate::engine::{decode_snapshot, WeakCollectionSync};

/// Spawn the listener task for one active collection
pub(crate) fn spawn_items_listener<R: SyncRecord>(
    engine: WeakCollectionSync<R>,
    list_id: ListId,
    mut notifications: mpsc::UnboundedReceiver<ItemsNotification>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(domain = %R::DOMAIN, list_id = %list_id, "Listener started");

        loop {
            let notification = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                received = notifications.recv() => match received {
                    Some(notification) => notification,
                    None => {
                        debug!(list_id = %list_id, "Notification channel closed");
                        break;
                    }
                },
            };

            let Some(sync) = engine.upgrade() else {
                debug!(list_id = %list_id, "Engine dropped");
                break;
            };

            let records = match notification {
                ItemsNotification::Snapshot(documents) => decode_snapshot::<R>(&list_id, documents),
                ItemsNotification::Invalidated => {
                    let fetched = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        fetched = sync.fetch(&list_id) => fetched,
                    };
                    match fetched {
                        Ok(records) => records,
                        Err(e) => {
                            warn!(
                                list_id = %list_id,
                                error = %e,
                                "Re-fetch after push failed; keeping local copy"
                            );
                            continue;
                        }
                    }
                }
            };

            if cancel.is_cancelled() {
                break;
            }
            sync.replace(&list_id, records);
        }

        debug!(domain = %R::DOMAIN, list_id = %list_id, "Listener stopped");
    })
}
