//! Remote write dispatcher
//!
//! Translates a [`RecordDiff`] into backing-store calls:
//!
//! - `added`   -> `create_item` with the full record document
//! - `removed` -> `delete_item` by id
//! - `changed` -> `patch_item` with the fields that differ
//!
//! All operations of one diff are issued concurrently and are independent:
//! a failed or timed-out call is logged and recorded in the
//! [`DispatchReport`], the others still run. Nothing is retried and the
//! local state is never rolled back; the next push snapshot from the
//! backing store is the only reconciliation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{join_all, BoxFuture};
use tracing::{debug, info, warn};

use hearth_core::domain::{ListId, RecordId, RecordPatch, SyncRecord};
use hearth_core::ports::IBackingStore;

use crate::diff::RecordDiff;

// ============================================================================
// DispatchReport
// ============================================================================

/// Kind of remote write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOperation {
    Create,
    Patch,
    Delete,
}

impl fmt::Display for RemoteOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RemoteOperation::Create => "create",
            RemoteOperation::Patch => "patch",
            RemoteOperation::Delete => "delete",
        })
    }
}

/// One remote write that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub record_id: RecordId,
    pub operation: RemoteOperation,
    pub error: String,
}

/// Outcome of dispatching one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Collection the commit targeted
    pub list_id: ListId,
    /// Successful creates
    pub created: usize,
    /// Successful patches
    pub patched: usize,
    /// Successful deletes
    pub deleted: usize,
    /// Writes that failed or timed out (non-fatal)
    pub failures: Vec<OperationFailure>,
    /// Wall-clock duration of the dispatch in milliseconds
    pub duration_ms: u64,
}

impl DispatchReport {
    /// Report for a commit that required no remote write
    pub fn empty(list_id: ListId) -> Self {
        Self {
            list_id,
            created: 0,
            patched: 0,
            deleted: 0,
            failures: Vec::new(),
            duration_ms: 0,
        }
    }

    /// True if every attempted write succeeded
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of writes attempted, successful or not
    pub fn attempted(&self) -> usize {
        self.created + self.patched + self.deleted + self.failures.len()
    }

    fn record_success(&mut self, operation: RemoteOperation) {
        match operation {
            RemoteOperation::Create => self.created += 1,
            RemoteOperation::Patch => self.patched += 1,
            RemoteOperation::Delete => self.deleted += 1,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

type Outcome = (RecordId, RemoteOperation, anyhow::Result<()>);

/// Issues the remote writes for a diff
#[derive(Clone)]
pub struct Dispatcher {
    backing: Arc<dyn IBackingStore>,
    operation_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher bounding each remote call by `operation_timeout`
    pub fn new(backing: Arc<dyn IBackingStore>, operation_timeout: Duration) -> Self {
        Self {
            backing,
            operation_timeout,
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    /// Dispatch every operation of `diff` against collection `list_id`
    ///
    /// Never fails as a whole: individual failures are logged and returned
    /// in the report.
    #[tracing::instrument(skip(self, diff), fields(operations = diff.operation_count()))]
    pub async fn dispatch<R: SyncRecord>(
        &self,
        list_id: &ListId,
        diff: &RecordDiff<R>,
    ) -> DispatchReport {
        let mut report = DispatchReport::empty(list_id.clone());
        if diff.is_empty() {
            return report;
        }

        let start = Instant::now();
        let mut operations: Vec<BoxFuture<'_, Outcome>> = Vec::with_capacity(diff.operation_count());

        for record in &diff.added {
            operations.push(Box::pin(async move {
                let result = match record.to_document() {
                    Ok(document) => self.bounded(self.backing.create_item(list_id, document)).await,
                    Err(e) => Err(e.into()),
                };
                (record.id().clone(), RemoteOperation::Create, result)
            }));
        }

        for change in &diff.changed {
            operations.push(Box::pin(async move {
                let record_id = change.after.id().clone();
                let result = match RecordPatch::between(&change.before, &change.after) {
                    Ok(patch) if patch.is_empty() => {
                        debug!(record_id = %record_id, "Serialized forms identical, patch skipped");
                        Ok(())
                    }
                    Ok(patch) => self.bounded(self.backing.patch_item(&record_id, &patch)).await,
                    Err(e) => Err(e.into()),
                };
                (record_id, RemoteOperation::Patch, result)
            }));
        }

        for record in &diff.removed {
            operations.push(Box::pin(async move {
                let record_id = record.id().clone();
                let result = self.bounded(self.backing.delete_item(&record_id)).await;
                (record_id, RemoteOperation::Delete, result)
            }));
        }

        for (record_id, operation, result) in join_all(operations).await {
            match result {
                Ok(()) => report.record_success(operation),
                Err(e) => {
                    warn!(
                        list_id = %list_id,
                        record_id = %record_id,
                        %operation,
                        error = %format!("{e:#}"),
                        "Remote write failed; local state kept"
                    );
                    report.failures.push(OperationFailure {
                        record_id,
                        operation,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            list_id = %list_id,
            created = report.created,
            patched = report.patched,
            deleted = report.deleted,
            failed = report.failures.len(),
            duration_ms = report.duration_ms,
            "Dispatch completed"
        );

        report
    }

    /// Run one remote call under the per-operation timeout
    async fn bounded(
        &self,
        call: impl Future<Output = anyhow::Result<()>>,
    ) -> anyhow::Result<()> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!(
                "timed out after {}ms",
                self.operation_timeout.as_millis()
            )),
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operation_timeout", &self.operation_timeout)
            .finish_non_exhaustive()
    }
}
