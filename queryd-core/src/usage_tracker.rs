//! Usage Tracker (spec §4.4, C4): per-project frequency, time-of-day, and
//! access-count statistics used to drive adaptive caching and operation
//! prediction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Timelike;
use parking_lot::RwLock;

use crate::types::{Query, UsagePattern};

#[derive(Debug, Clone, Default)]
pub struct UsageStats {
    pub tracked_projects: usize,
    pub total_accesses: u64,
}

#[derive(Default)]
pub struct UsageTracker {
    patterns: RwLock<HashMap<PathBuf, UsagePattern>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, query: &Query, operations: &[String], duration: Duration) {
        let mut guard = self.patterns.write();
        let pattern = guard.entry(query.project_root.clone()).or_default();

        for op in operations {
            *pattern.operation_counts.entry(op.clone()).or_insert(0) += 1;
        }

        let hour = local_hour(query.created_at);
        *pattern.hour_of_day_counts.entry(hour).or_insert(0) += 1;

        pattern.access_count += 1;
        pattern.last_access = Some(SystemTime::now());

        pattern.avg_response_time = if pattern.access_count == 1 {
            duration
        } else {
            symmetric_ema(pattern.avg_response_time, duration)
        };
    }

    pub fn record_query_type(&self, project: &Path, query_type: &str) {
        let mut guard = self.patterns.write();
        let pattern = guard.entry(project.to_path_buf()).or_default();
        *pattern.query_type_counts.entry(query_type.to_string()).or_insert(0) += 1;
    }

    /// Operations whose per-project count is >= 2, else `["filesystem_search"]`.
    pub fn predict_operations(&self, project: &Path) -> Vec<String> {
        let guard = self.patterns.read();
        let Some(pattern) = guard.get(project) else {
            return vec!["filesystem_search".to_string()];
        };
        let predicted: Vec<String> = pattern
            .operation_counts
            .iter()
            .filter(|(_, count)| **count >= 2)
            .map(|(op, _)| op.clone())
            .collect();
        if predicted.is_empty() {
            vec!["filesystem_search".to_string()]
        } else {
            predicted
        }
    }

    /// `access_count >= 3 AND now - last_access < 1h`.
    pub fn should_precache(&self, project: &Path) -> bool {
        let guard = self.patterns.read();
        let Some(pattern) = guard.get(project) else {
            return false;
        };
        let Some(last_access) = pattern.last_access else {
            return false;
        };
        let recent = SystemTime::now()
            .duration_since(last_access)
            .unwrap_or(Duration::MAX)
            < Duration::from_secs(3600);
        pattern.access_count >= 3 && recent
    }

    /// Tiered by access_count: >=10 -> 15min, >=5 -> 10min, else 5min.
    pub fn adaptive_ttl(&self, project: &Path) -> Duration {
        let guard = self.patterns.read();
        let access_count = guard.get(project).map(|p| p.access_count).unwrap_or(0);
        if access_count >= 10 {
            Duration::from_secs(15 * 60)
        } else if access_count >= 5 {
            Duration::from_secs(10 * 60)
        } else {
            Duration::from_secs(5 * 60)
        }
    }

    pub fn pattern_for(&self, project: &Path) -> Option<UsagePattern> {
        self.patterns.read().get(project).cloned()
    }

    pub fn stats(&self) -> UsageStats {
        let guard = self.patterns.read();
        UsageStats {
            tracked_projects: guard.len(),
            total_accesses: guard.values().map(|p| p.access_count).sum(),
        }
    }
}

fn local_hour(when: SystemTime) -> u8 {
    let datetime: chrono::DateTime<chrono::Local> = when.into();
    datetime.hour() as u8
}

fn symmetric_ema(previous: Duration, new: Duration) -> Duration {
    (previous + new) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_query(project: &str) -> Query {
        Query::new("q", "list files", PathBuf::from(project))
    }

    #[test]
    fn predict_operations_defaults_to_filesystem_search() {
        let tracker = UsageTracker::new();
        let ops = tracker.predict_operations(Path::new("/proj"));
        assert_eq!(ops, vec!["filesystem_search".to_string()]);
    }

    #[test]
    fn predict_operations_after_two_identical_records() {
        let tracker = UsageTracker::new();
        let query = sample_query("/proj");
        tracker.record(&query, &["git_status".to_string()], Duration::from_millis(10));
        tracker.record(&query, &["git_status".to_string()], Duration::from_millis(10));
        let mut ops = tracker.predict_operations(Path::new("/proj"));
        ops.sort();
        assert_eq!(ops, vec!["git_status".to_string()]);
    }

    #[test]
    fn should_precache_requires_three_recent_accesses() {
        let tracker = UsageTracker::new();
        let query = sample_query("/proj");
        for _ in 0..2 {
            tracker.record(&query, &[], Duration::from_millis(1));
        }
        assert!(!tracker.should_precache(Path::new("/proj")));
        tracker.record(&query, &[], Duration::from_millis(1));
        assert!(tracker.should_precache(Path::new("/proj")));
    }

    #[test]
    fn adaptive_ttl_tiers_by_access_count() {
        let tracker = UsageTracker::new();
        let query = sample_query("/proj");
        assert_eq!(tracker.adaptive_ttl(Path::new("/proj")), Duration::from_secs(300));
        for _ in 0..5 {
            tracker.record(&query, &[], Duration::from_millis(1));
        }
        assert_eq!(tracker.adaptive_ttl(Path::new("/proj")), Duration::from_secs(600));
        for _ in 0..5 {
            tracker.record(&query, &[], Duration::from_millis(1));
        }
        assert_eq!(tracker.adaptive_ttl(Path::new("/proj")), Duration::from_secs(900));
    }

    #[test]
    fn symmetric_ema_averages_durations() {
        let result = symmetric_ema(Duration::from_millis(100), Duration::from_millis(200));
        assert_eq!(result, Duration::from_millis(150));
    }
}
