use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::providers::ProviderOutcome;

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub project_dir: PathBuf,
    pub outcome: ProviderOutcome,
    pub fetched_at: Instant,
}

impl CacheEntry {
    /// Fresh while `now - fetched_at <= max_age`.
    pub fn is_fresh_at(&self, max_age: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) <= max_age
    }
}

/// Last known provider outcome per project directory.
///
/// Entries are replaced wholesale on every write. Freshness is decided by each
/// reader, so one stored entry can be fresh for a lenient caller and stale for a
/// strict one. The lock only covers map operations.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<PathBuf, CacheEntry>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, project_dir: &Path, outcome: ProviderOutcome) {
        self.set_at(project_dir, outcome, Instant::now());
    }

    pub fn set_at(&self, project_dir: &Path, outcome: ProviderOutcome, fetched_at: Instant) {
        let entry = CacheEntry {
            project_dir: project_dir.to_path_buf(),
            outcome,
            fetched_at,
        };
        self.lock_entries().insert(project_dir.to_path_buf(), entry);
    }

    pub fn get(&self, project_dir: &Path, max_age: Duration) -> Option<ProviderOutcome> {
        self.get_at(project_dir, max_age, Instant::now())
    }

    pub fn get_at(
        &self,
        project_dir: &Path,
        max_age: Duration,
        now: Instant,
    ) -> Option<ProviderOutcome> {
        let entries = self.lock_entries();
        let entry = entries.get(project_dir)?;
        entry
            .is_fresh_at(max_age, now)
            .then(|| entry.outcome.clone())
    }

    pub fn fetched_at(&self, project_dir: &Path) -> Option<Instant> {
        self.lock_entries()
            .get(project_dir)
            .map(|entry| entry.fetched_at)
    }

    pub fn invalidate(&self, project_dir: &Path) -> bool {
        self.lock_entries().remove(project_dir).is_some()
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // The map only holds owned values, so a panic mid-insert cannot leave it torn.
    fn lock_entries(&self) -> MutexGuard<'_, HashMap<PathBuf, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
