//! Collection diff engine
//!
//! Computes the minimal set of remote operations that turns a previous
//! version of a collection into a next version. Records are matched by id
//! only; order inside the collections carries no meaning.
//!
//! ## Partition
//!
//! Every id in `previous ∪ next` lands in exactly one bucket:
//!
//! | previous | next | bucket      |
//! |----------|------|-------------|
//! | absent   | yes  | `added`     |
//! | yes      | absent | `removed` |
//! | yes      | yes, `content_eq` false | `changed` |
//! | yes      | yes, `content_eq` true  | `unchanged` |
//!
//! When one collection holds several records with the same id, the last one
//! wins.

use std::collections::{HashMap, HashSet};

use hearth_core::domain::{RecordId, SyncRecord};

/// Before/after pair of a record whose content changed
#[derive(Debug, Clone, PartialEq)]
pub struct RecordChange<R> {
    pub before: R,
    pub after: R,
}

/// Result of diffing two versions of a collection
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDiff<R> {
    /// Records only present in the next version, in `next` order
    pub added: Vec<R>,
    /// Records only present in the previous version, in `previous` order
    pub removed: Vec<R>,
    /// Records present in both whose content differs, in `next` order
    pub changed: Vec<RecordChange<R>>,
    /// Ids present in both with equal content
    pub unchanged: Vec<RecordId>,
}

impl<R> Default for RecordDiff<R> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
            unchanged: Vec::new(),
        }
    }
}

impl<R> RecordDiff<R> {
    /// True if the diff requires no remote operation
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Number of remote operations the diff translates into
    pub fn operation_count(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Index a collection by id, keeping the position of the last occurrence
fn index_last_wins<R: SyncRecord>(records: &[R]) -> HashMap<&RecordId, usize> {
    let mut index = HashMap::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        index.insert(record.id(), position);
    }
    index
}

/// Positions of the surviving (last) occurrence of each id, in order
fn surviving_positions<R: SyncRecord>(
    records: &[R],
    index: &HashMap<&RecordId, usize>,
) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(position, record)| index.get(record.id()) == Some(position))
        .map(|(position, _)| position)
        .collect()
}

/// Diff two versions of a collection
///
/// Pure function: neither input is modified and the result only depends on
/// the record ids and [`SyncRecord::content_eq`].
pub fn diff<R: SyncRecord>(previous: &[R], next: &[R]) -> RecordDiff<R> {
    let previous_index = index_last_wins(previous);
    let next_index = index_last_wins(next);

    let mut result = RecordDiff::default();
    let mut seen: HashSet<&RecordId> = HashSet::with_capacity(next_index.len());

    for position in surviving_positions(next, &next_index) {
        let after = &next[position];
        seen.insert(after.id());

        match previous_index.get(after.id()) {
            None => result.added.push(after.clone()),
            Some(&before_position) => {
                let before = &previous[before_position];
                if before.content_eq(after) {
                    result.unchanged.push(after.id().clone());
                } else {
                    result.changed.push(RecordChange {
                        before: before.clone(),
                        after: after.clone(),
                    });
                }
            }
        }
    }

    for position in surviving_positions(previous, &previous_index) {
        let before = &previous[position];
        if !seen.contains(before.id()) {
            result.removed.push(before.clone());
        }
    }

    result
}
