// Job Registry - live jobs keyed by run id

use crate::domain::{JobEntry, RunId};
use crate::error::{AppError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Maps run ids to live process groups
///
/// One entry per run id, removed exactly once (on exit).
#[derive(Default)]
pub struct JobRegistry {
    entries: Mutex<HashMap<RunId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<RunId, JobEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a started job
    ///
    /// # Errors
    /// - AppError::Conflict if the run id is already registered
    pub fn create(&self, entry: JobEntry) -> Result<RunId> {
        let mut entries = self.entries();
        if entries.contains_key(&entry.run_id) {
            return Err(AppError::Conflict(format!(
                "run {} already registered",
                entry.run_id
            )));
        }

        let run_id = entry.run_id.clone();
        debug!(run_id = %run_id, pgid = entry.pgid, "Job registered");
        entries.insert(run_id.clone(), entry);
        Ok(run_id)
    }

    pub fn get(&self, run_id: &RunId) -> Option<JobEntry> {
        self.entries().get(run_id).cloned()
    }

    pub fn contains(&self, run_id: &RunId) -> bool {
        self.entries().contains_key(run_id)
    }

    /// Remove an entry; a missing entry is a no-op (returns false)
    pub fn remove(&self, run_id: &RunId) -> bool {
        let removed = self.entries().remove(run_id).is_some();
        if removed {
            debug!(run_id = %run_id, "Job removed from registry");
        }
        removed
    }

    /// Live jobs, oldest first
    pub fn list(&self) -> Vec<JobEntry> {
        let mut jobs: Vec<JobEntry> = self.entries().values().cloned().collect();
        jobs.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.run_id.as_str().cmp(b.run_id.as_str()))
        });
        jobs
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::id_provider::SequenceIdProvider;
    use std::sync::Arc;

    fn entry(seed: u8, created_at: i64) -> JobEntry {
        JobEntry {
            run_id: SequenceIdProvider::id_for_seed(seed),
            target: "command:true".to_string(),
            pgid: 100 + seed as i32,
            created_at,
        }
    }

    #[test]
    fn test_create_and_get() {
        let registry = JobRegistry::new();
        let run_id = registry.create(entry(1, 10)).unwrap();

        let found = registry.get(&run_id).unwrap();
        assert_eq!(found.pgid, 101);
        assert!(registry.contains(&run_id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_create_duplicate_is_conflict() {
        let registry = JobRegistry::new();
        registry.create(entry(1, 10)).unwrap();

        let result = registry.create(entry(1, 20));
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(registry.get(&entry(1, 0).run_id).unwrap().created_at, 10);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let registry = JobRegistry::new();
        let run_id = registry.create(entry(1, 10)).unwrap();

        assert!(registry.remove(&run_id));
        assert!(!registry.remove(&run_id));
        assert!(registry.get(&run_id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_sorted_by_creation() {
        let registry = JobRegistry::new();
        registry.create(entry(3, 30)).unwrap();
        registry.create(entry(1, 10)).unwrap();
        registry.create(entry(2, 20)).unwrap();

        let order: Vec<i64> = registry.list().iter().map(|e| e.created_at).collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_and_remove() {
        let registry = Arc::new(JobRegistry::new());
        let mut handles = vec![];

        for seed in 0..64u8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let run_id = registry.create(entry(seed, seed as i64)).unwrap();
                if seed % 2 == 0 {
                    assert!(registry.remove(&run_id));
                    assert!(!registry.remove(&run_id));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 32);
    }
}
