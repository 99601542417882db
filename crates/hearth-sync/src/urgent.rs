//! Urgent task view
//!
//! A derived, read-only aggregation of tasks across every loaded task
//! collection. A task is urgent if it is marked [`Urgency::High`] or if its
//! due date falls on or before `today + window_days` (overdue tasks
//! included). Completion status is not considered.
//!
//! ## Ordering
//!
//! 1. Tasks with a due date come first, earliest date first
//! 2. Ties, and tasks without a due date, are ordered by urgency rank
//!    (high, medium, low, unspecified)
//!
//! The sort is stable; equal tasks keep collection order (collections by
//! list id, tasks in collection order).
//!
//! The view is never stored as a collection. It is recomputed from the task
//! collections and published through a [`watch`] channel that only wakes
//! receivers when the computed view actually differs.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tokio::sync::watch;
use tracing::debug;

use hearth_core::domain::{ListId, RecordId, Task, Urgency};

/// Default look-ahead for due dates, in days
pub const DEFAULT_WINDOW_DAYS: u32 = 5;

// ============================================================================
// View types
// ============================================================================

/// A task in the urgent view, tagged with the collection it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgentTask {
    pub task: Task,
    pub source_list_id: ListId,
    pub source_list_name: String,
}

/// Ordered, read-only urgent task view
///
/// There is no way to commit an `UrgentView`; edits go through
/// [`Household::commit_from_urgent`](crate::Household::commit_from_urgent),
/// which writes to the source collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrgentView {
    tasks: Vec<UrgentTask>,
}

impl UrgentView {
    pub fn tasks(&self) -> &[UrgentTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UrgentTask> {
        self.tasks.iter()
    }

    /// Look up an entry by task id
    pub fn get(&self, record_id: &RecordId) -> Option<&UrgentTask> {
        self.tasks.iter().find(|entry| &entry.task.id == record_id)
    }
}

// ============================================================================
// Computation
// ============================================================================

/// Inclusion rules of the urgent view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgentRules {
    /// Due dates up to `today + window_days` (inclusive) qualify
    pub window_days: u32,
    /// Reserved id of the view itself; a task collection with this id is
    /// never aggregated
    pub reserved: ListId,
}

impl Default for UrgentRules {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_WINDOW_DAYS,
            reserved: ListId::urgent(),
        }
    }
}

impl UrgentRules {
    /// Last due date that still counts as urgent
    fn horizon(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.window_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn is_urgent(&self, task: &Task, today: NaiveDate) -> bool {
        task.urgency == Some(Urgency::High)
            || task.due_date.is_some_and(|due| due <= self.horizon(today))
    }
}

/// One task collection offered to the aggregation
#[derive(Debug, Clone, Copy)]
pub struct UrgentSource<'a> {
    pub list_id: &'a ListId,
    pub list_name: &'a str,
    pub tasks: &'a [Task],
}

fn urgent_order(a: &Task, b: &Task) -> Ordering {
    let by_rank = || Urgency::rank(a.urgency).cmp(&Urgency::rank(b.urgency));
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(by_rank),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => by_rank(),
    }
}

/// Compute the urgent view over `sources` as of `today`
pub fn compute<'a, I>(sources: I, today: NaiveDate, rules: &UrgentRules) -> UrgentView
where
    I: IntoIterator<Item = UrgentSource<'a>>,
{
    let mut tasks: Vec<UrgentTask> = sources
        .into_iter()
        .filter(|source| source.list_id != &rules.reserved)
        .flat_map(move |source| {
            source
                .tasks
                .iter()
                .filter(move |task| rules.is_urgent(task, today))
                .map(move |task| UrgentTask {
                    task: task.clone(),
                    source_list_id: source.list_id.clone(),
                    source_list_name: source.list_name.to_string(),
                })
        })
        .collect();

    tasks.sort_by(|a, b| urgent_order(&a.task, &b.task));
    UrgentView { tasks }
}

// ============================================================================
// UrgentProjection
// ============================================================================

/// Publishes the latest urgent view to any number of observers
#[derive(Debug)]
pub struct UrgentProjection {
    rules: UrgentRules,
    sender: watch::Sender<Arc<UrgentView>>,
}

impl UrgentProjection {
    pub fn new(rules: UrgentRules) -> Self {
        let (sender, _) = watch::channel(Arc::new(UrgentView::default()));
        Self { rules, sender }
    }

    pub fn rules(&self) -> &UrgentRules {
        &self.rules
    }

    /// Observe the view; the receiver is notified only on real changes
    pub fn subscribe(&self) -> watch::Receiver<Arc<UrgentView>> {
        self.sender.subscribe()
    }

    /// The most recently published view
    pub fn current(&self) -> Arc<UrgentView> {
        Arc::clone(&self.sender.borrow())
    }

    /// Recompute from `sources` and publish if the result changed
    ///
    /// Returns true if observers were notified.
    pub fn refresh<'a, I>(&self, sources: I, today: NaiveDate) -> bool
    where
        I: IntoIterator<Item = UrgentSource<'a>>,
    {
        let view = compute(sources, today, &self.rules);
        let changed = self.sender.send_if_modified(|current| {
            if **current == view {
                false
            } else {
                *current = Arc::new(view);
                true
            }
        });

        if changed {
            debug!(count = self.current().len(), "Urgent view updated");
        }
        changed
    }
}
