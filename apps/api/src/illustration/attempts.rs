//! Per-story generation-attempt table.
//!
//! Owned by the synchronizer; the presentation layer only reads snapshots.
//! Nothing here is persisted: after a restart "missing" is re-derived from
//! absent image references.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationAttempt {
    pub page_index: usize,
    pub status: AttemptStatus,
    /// Machine-readable kind of the last error, e.g. `rate_limited`.
    pub last_error: Option<String>,
    pub message: Option<String>,
}

type StoryAttempts = BTreeMap<usize, GenerationAttempt>;

#[derive(Default)]
pub struct AttemptTable {
    inner: Mutex<HashMap<Uuid, StoryAttempts>>,
}

impl AttemptTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, StoryAttempts>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, story_id: Uuid, page_index: usize, status: AttemptStatus) {
        let mut table = self.lock();
        let attempts = table.entry(story_id).or_default();
        let attempt = attempts.entry(page_index).or_insert(GenerationAttempt {
            page_index,
            status,
            last_error: None,
            message: None,
        });
        attempt.status = status;
    }

    /// Queues pages for this pass. Failed markers keep their error until retried.
    pub fn mark_pending(&self, story_id: Uuid, page_indices: &[usize]) {
        for &i in page_indices {
            self.set(story_id, i, AttemptStatus::Pending);
        }
    }

    pub fn begin(&self, story_id: Uuid, page_index: usize) {
        self.set(story_id, page_index, AttemptStatus::InFlight);
    }

    /// Success discards the attempt, which also clears any failed marker.
    pub fn succeed(&self, story_id: Uuid, page_index: usize) {
        let mut table = self.lock();
        if let Some(attempts) = table.get_mut(&story_id) {
            attempts.remove(&page_index);
            if attempts.is_empty() {
                table.remove(&story_id);
            }
        }
    }

    pub fn fail(&self, story_id: Uuid, page_index: usize, kind: &str, message: &str) {
        let mut table = self.lock();
        table.entry(story_id).or_default().insert(
            page_index,
            GenerationAttempt {
                page_index,
                status: AttemptStatus::Failed,
                last_error: Some(kind.to_string()),
                message: Some(message.to_string()),
            },
        );
    }

    /// Drops attempts left `Pending`/`InFlight` when a pass ends. Failed ones stay.
    pub fn finish_pass(&self, story_id: Uuid) {
        let mut table = self.lock();
        if let Some(attempts) = table.get_mut(&story_id) {
            attempts.retain(|_, a| a.status == AttemptStatus::Failed);
            if attempts.is_empty() {
                table.remove(&story_id);
            }
        }
    }

    pub fn failed_indices(&self, story_id: Uuid) -> BTreeSet<usize> {
        self.lock()
            .get(&story_id)
            .map(|attempts| {
                attempts
                    .values()
                    .filter(|a| a.status == AttemptStatus::Failed)
                    .map(|a| a.page_index)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn snapshot(&self, story_id: Uuid) -> Vec<GenerationAttempt> {
        self.lock()
            .get(&story_id)
            .map(|attempts| attempts.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn forget(&self, story_id: Uuid) {
        self.lock().remove(&story_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_survives_pass_end_and_success_clears_it() {
        let table = AttemptTable::new();
        let id = Uuid::new_v4();

        table.mark_pending(id, &[0, 1, 2]);
        table.begin(id, 0);
        table.succeed(id, 0);
        table.begin(id, 1);
        table.fail(id, 1, "provider_error", "boom");
        table.finish_pass(id);

        let snap = table.snapshot(id);
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].page_index, 1);
        assert_eq!(snap[0].status, AttemptStatus::Failed);
        assert_eq!(snap[0].last_error.as_deref(), Some("provider_error"));
        assert_eq!(table.failed_indices(id), BTreeSet::from([1]));

        table.begin(id, 1);
        assert!(table.failed_indices(id).is_empty());
        table.succeed(id, 1);
        assert!(table.snapshot(id).is_empty());
    }

    #[test]
    fn test_stories_are_isolated() {
        let table = AttemptTable::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        table.fail(a, 0, "x", "y");
        assert!(table.snapshot(b).is_empty());
        table.forget(a);
        assert!(table.snapshot(a).is_empty());
    }
}
