//! Per-invocation state shared by all commands

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use hearth_core::config::Config;
use hearth_core::domain::{ListMeta, RecordId, SyncRecord};
use hearth_core::ports::IBackingStore;
use hearth_store::{DatabasePool, SqliteBackingStore};
use hearth_sync::{DispatchHandle, Household};

use crate::output::{get_formatter, print_report, OutputFormat, OutputFormatter};

pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub format: OutputFormat,
}

impl AppContext {
    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(matches!(self.format, OutputFormat::Json))
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Open the configured database and start a household session on it
    pub async fn open_household(&self) -> Result<Household> {
        let db_path = &self.config.store.database;
        let pool = DatabasePool::new(db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        let store: Arc<dyn IBackingStore> = Arc::new(SqliteBackingStore::new(pool.pool().clone()));

        let household = Household::from_config(store, &self.config)
            .context("Invalid household configuration")?;
        household
            .start()
            .await
            .context("Failed to start household session")?;
        Ok(household)
    }

    /// Run `command` against a started session and always shut it down
    pub async fn with_household<T, F, Fut>(&self, command: F) -> Result<T>
    where
        F: FnOnce(Household) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let household = self.open_household().await?;
        let result = command(household.clone()).await;
        household.shutdown().await;
        result
    }

    /// Wait for a commit's remote writes and print the outcome
    pub async fn finish_commit(&self, handle: DispatchHandle) -> Result<()> {
        let report = handle.wait().await.context("Remote dispatch did not complete")?;
        print_report(self.formatter().as_ref(), self.format, &report);
        Ok(())
    }
}

/// Find a list by id, or by case-insensitive name
pub fn resolve_list(household: &Household, needle: &str) -> Result<ListMeta> {
    let lists = household.lists();
    if let Some(meta) = lists.iter().find(|m| m.id.as_str() == needle) {
        return Ok(meta.clone());
    }

    let matches: Vec<&ListMeta> = lists
        .iter()
        .filter(|m| m.name.eq_ignore_ascii_case(needle))
        .collect();
    match matches.as_slice() {
        [meta] => Ok((*meta).clone()),
        [] => bail!("No list named or identified by '{needle}'"),
        _ => bail!("'{needle}' matches {} lists; use the list id", matches.len()),
    }
}

/// Find a record by id, or by a case-insensitive label
pub fn resolve_record<R, F>(records: &[R], needle: &str, label: F) -> Result<RecordId>
where
    R: SyncRecord,
    F: Fn(&R) -> &str,
{
    if let Some(record) = records.iter().find(|r| r.id().as_str() == needle) {
        return Ok(record.id().clone());
    }

    let matches: Vec<&R> = records
        .iter()
        .filter(|r| label(r).eq_ignore_ascii_case(needle))
        .collect();
    match matches.as_slice() {
        [record] => Ok(record.id().clone()),
        [] => bail!("No entry named or identified by '{needle}'"),
        _ => bail!("'{needle}' matches {} entries; use the id", matches.len()),
    }
}
