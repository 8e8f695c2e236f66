//! Resume cursor derived from a snapshot of work queue entries.
//!
//! The cursor is the exclusive lower bound for the next enumeration: only
//! recordings with a queue call id strictly greater than it are fetched.

use log::warn;
use std::collections::{BTreeSet, HashSet};

use crate::config::ResumePolicy;
use crate::recording::extract_queue_call_id;
use crate::work_queue::{QueueEntry, QueueStatus};

/// Where the next run starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    /// Exclusive lower bound for enumeration
    pub cursor: i64,
    /// Ids already confirmed DONE; never uploaded again
    pub done_ids: HashSet<i64>,
}

impl ResumePoint {
    pub fn is_done(&self, queue_call_id: i64) -> bool {
        self.done_ids.contains(&queue_call_id)
    }
}

/// Queue call id of an entry: structured column first, then the reference,
/// then the id encoded in the filename.
pub fn entry_queue_call_id(entry: &QueueEntry) -> Option<i64> {
    entry
        .queue_call_id
        .or_else(|| entry.reference.trim().parse().ok())
        .or_else(|| extract_queue_call_id(&entry.data))
}

/// Highest DONE id, or `floor` when nothing has been completed.
/// Entries without a usable id are ignored.
pub fn derive_cursor(entries: &[QueueEntry], floor: i64) -> i64 {
    entries
        .iter()
        .filter(|e| e.status == QueueStatus::Done)
        .filter_map(entry_queue_call_id)
        .fold(floor, i64::max)
}

/// Resume point over every entry of the queue, honouring `policy`
pub fn derive_resume_point(entries: &[QueueEntry], floor: i64, policy: ResumePolicy) -> ResumePoint {
    let mut done_ids = HashSet::new();
    let mut attempted = BTreeSet::new();

    for entry in entries {
        let Some(id) = identify(entry) else {
            continue;
        };
        if entry.status == QueueStatus::Done {
            done_ids.insert(id);
        } else {
            attempted.insert(id);
        }
    }

    let max_done = derive_cursor(entries, floor);
    let cursor = match policy {
        ResumePolicy::MaxDone => max_done,
        ResumePolicy::RetryFailed => attempted
            .iter()
            .find(|id| !done_ids.contains(*id))
            .map(|lowest| (lowest - 1).max(floor).min(max_done))
            .unwrap_or(max_done),
    };

    ResumePoint { cursor, done_ids }
}

fn identify(entry: &QueueEntry) -> Option<i64> {
    let id = entry_queue_call_id(entry);
    if id.is_none() {
        warn!(
            "[Cursor] Skipping entry {} with unusable reference '{}' (data '{}')",
            entry.id, entry.reference, entry.data
        );
    }
    id
}
