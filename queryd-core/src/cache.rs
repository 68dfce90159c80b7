//! Evidence Cache (spec §4.3, C3): a TTL map keyed by project root.
//!
//! Grounded on the `parking_lot::RwLock`-guarded shared-map idiom used
//! throughout `vtcode-bash-runner` for state shared across async tasks:
//! many concurrent readers, one writer at a time, the lock never held
//! across I/O.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::types::{CachedEvidence, EvidenceRecord};

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
}

#[derive(Default)]
pub struct EvidenceCache {
    entries: RwLock<HashMap<PathBuf, CachedEvidence>>,
}

impl EvidenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(record, true)` if present and fresh; reading past TTL
    /// returns `(_, false)` without mutating the map.
    pub fn get(&self, project: &Path) -> Option<EvidenceRecord> {
        let guard = self.entries.read();
        let cached = guard.get(project)?;
        if cached.is_fresh(Instant::now()) {
            Some(cached.record.clone())
        } else {
            None
        }
    }

    /// Last-write-wins.
    pub fn set(
        &self,
        project: &Path,
        record: EvidenceRecord,
        file_count: usize,
        fingerprint: u64,
        ttl: Duration,
    ) {
        let cached = CachedEvidence {
            record,
            created_at: Instant::now(),
            file_count,
            fingerprint,
            ttl,
        };
        self.entries.write().insert(project.to_path_buf(), cached);
    }

    pub fn invalidate(&self, project: &Path) {
        self.entries.write().remove(project);
    }

    pub fn stats(&self, ttl_for_report: Duration) -> (CacheStats, Duration) {
        let guard = self.entries.read();
        let now = Instant::now();
        let mut stats = CacheStats {
            total: guard.len(),
            ..Default::default()
        };
        for cached in guard.values() {
            if cached.is_fresh(now) {
                stats.valid += 1;
            } else {
                stats.expired += 1;
            }
        }
        (stats, ttl_for_report)
    }
}

/// A stable hash of the evidence record's shape, used only by upper layers
/// to decide cache equivalence (spec §4.3: "opaque bytes").
pub fn fingerprint(operations: &[String], file_count: usize) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    operations.hash(&mut hasher);
    file_count.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_on_empty_cache() {
        let cache = EvidenceCache::new();
        assert!(cache.get(Path::new("/proj")).is_none());
    }

    #[test]
    fn set_then_get_within_ttl_returns_value() {
        let cache = EvidenceCache::new();
        cache.set(
            Path::new("/proj"),
            EvidenceRecord::default(),
            3,
            42,
            Duration::from_secs(60),
        );
        assert!(cache.get(Path::new("/proj")).is_some());
    }

    #[test]
    fn expired_entry_reads_as_absent() {
        let cache = EvidenceCache::new();
        cache.set(
            Path::new("/proj"),
            EvidenceRecord::default(),
            3,
            42,
            Duration::from_millis(0),
        );
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(Path::new("/proj")).is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = EvidenceCache::new();
        cache.set(
            Path::new("/proj"),
            EvidenceRecord::default(),
            3,
            42,
            Duration::from_secs(60),
        );
        cache.invalidate(Path::new("/proj"));
        assert!(cache.get(Path::new("/proj")).is_none());
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let ops = vec!["git_status".to_string(), "list_files".to_string()];
        assert_eq!(fingerprint(&ops, 5), fingerprint(&ops, 5));
    }
}
