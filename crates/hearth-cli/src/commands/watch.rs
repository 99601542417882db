//! Watch command - follow a list until interrupted
//!
//! Prints the list whenever its local collection settles. Pushes only reach
//! this process for writes made through the same store instance, so the
//! collection is also re-fetched every `--interval` seconds to pick up writes
//! from other `hearth` processes sharing the database.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use hearth_core::domain::{ListDomain, ListId, SyncRecord};
use hearth_sync::{diff, CollectionSync};

use crate::context::{resolve_list, AppContext};
use crate::output::{describe_item, describe_task, describe_voucher};

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// List id or name
    pub list: String,
    /// Seconds between re-fetches of the list
    #[arg(long, default_value_t = 5)]
    pub interval: u64,
}

impl WatchCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let interval = Duration::from_secs(self.interval.max(1));

        ctx.with_household(|household| async move {
            let meta = resolve_list(&household, &self.list)?;
            household
                .open_list(&meta.id)
                .await
                .with_context(|| format!("Failed to open list '{}'", meta.name))?;

            ctx.formatter()
                .success(&format!("Watching '{}' (Ctrl+C to stop)", meta.name));

            match meta.domain {
                ListDomain::Shopping => {
                    follow(ctx, household.shopping(), &meta.id, interval, describe_item).await
                }
                ListDomain::Tasks => {
                    follow(ctx, household.tasks(), &meta.id, interval, describe_task).await
                }
                ListDomain::Vouchers => {
                    follow(ctx, household.vouchers(), &meta.id, interval, describe_voucher).await
                }
            }
        })
        .await
    }
}

async fn follow<R: SyncRecord>(
    ctx: &AppContext,
    sync: &CollectionSync<R>,
    list_id: &ListId,
    interval: Duration,
    render: fn(&R) -> String,
) -> Result<()> {
    let mut settled = sync.settled();
    let mut poll = tokio::time::interval(interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    print_collection(ctx, sync, list_id, render)?;

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                debug!("Interrupted");
                return Ok(());
            }
            event = settled.recv() => match event {
                Ok(event) if &event.list_id == list_id => {
                    print_collection(ctx, sync, list_id, render)?;
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    print_collection(ctx, sync, list_id, render)?;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
            _ = poll.tick() => match sync.fetch(list_id).await {
                Ok(remote) => {
                    if !diff(&sync.collection(list_id), &remote).is_empty() {
                        sync.replace(list_id, remote);
                    }
                }
                Err(e) => warn!(list_id = %list_id, error = %e, "Re-fetch failed"),
            },
        }
    }
}

fn print_collection<R: SyncRecord>(
    ctx: &AppContext,
    sync: &CollectionSync<R>,
    list_id: &ListId,
    render: fn(&R) -> String,
) -> Result<()> {
    let records = sync.collection(list_id);
    let formatter = ctx.formatter();

    if ctx.is_json() {
        let entries = serde_json::to_value(records.as_ref())?;
        formatter.print_json(&serde_json::json!({
            "list_id": list_id.as_str(),
            "at": chrono::Local::now().to_rfc3339(),
            "entries": entries,
        }));
        return Ok(());
    }

    formatter.info("");
    formatter.info(&format!(
        "{} - {} entries",
        chrono::Local::now().format("%H:%M:%S"),
        records.len()
    ));
    for record in records.iter() {
        formatter.info(&render(record));
    }
    Ok(())
}
