//! Filesystem Change Watcher (spec §4.5, C5).
//!
//! Dispatches events on a private thread (`notify`'s own watcher thread);
//! watch-set mutations take an exclusive lock. On a relevant event, the
//! longest watched-root prefix is invalidated in the [`crate::cache::EvidenceCache`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::cache::EvidenceCache;

pub struct FileWatcher {
    watched_roots: RwLock<Vec<PathBuf>>,
    primary_extension: String,
}

impl FileWatcher {
    pub fn new(primary_extension: impl Into<String>) -> Self {
        Self {
            watched_roots: RwLock::new(Vec::new()),
            primary_extension: primary_extension.into(),
        }
    }

    pub fn watch(&self, root: impl Into<PathBuf>) {
        self.watched_roots.write().push(root.into());
    }

    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.watched_roots.read().clone()
    }

    /// The longest watched-root prefix of `path`, if any.
    fn matching_root(&self, path: &Path) -> Option<PathBuf> {
        self.watched_roots
            .read()
            .iter()
            .filter(|root| path.starts_with(root.as_path()))
            .max_by_key(|root| root.as_os_str().len())
            .cloned()
    }

    /// Spawn the native watcher and a task that invalidates `cache` on every
    /// relevant event. Returns the live `notify::Watcher` handle; dropping it
    /// stops the watch.
    pub fn spawn(
        self: Arc<Self>,
        cache: Arc<EvidenceCache>,
    ) -> notify::Result<RecommendedWatcher> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                let _ = tx.send(event);
            }
        })?;

        for root in self.watched_roots() {
            watcher.watch(&root, RecursiveMode::Recursive)?;
        }

        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                this.handle_event(&event, &cache);
            }
        });

        Ok(watcher)
    }

    fn handle_event(&self, event: &Event, cache: &EvidenceCache) {
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }

        for path in &event.paths {
            if !queryd_commons::is_relevant_change(path, &self.primary_extension) {
                continue;
            }
            if let Some(root) = self.matching_root(path) {
                cache.invalidate(&root);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind};

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn irrelevant_event_does_not_invalidate() {
        let watcher = FileWatcher::new("go");
        watcher.watch("/proj");
        let cache = EvidenceCache::new();
        cache.set(
            Path::new("/proj"),
            Default::default(),
            0,
            0,
            std::time::Duration::from_secs(60),
        );
        watcher.handle_event(&event(EventKind::Modify(ModifyKind::Any), "/proj/README.md"), &cache);
        assert!(cache.get(Path::new("/proj")).is_some());
    }

    #[test]
    fn relevant_event_invalidates_longest_matching_root() {
        let watcher = FileWatcher::new("go");
        watcher.watch("/proj");
        watcher.watch("/proj/sub");
        let cache = EvidenceCache::new();
        cache.set(
            Path::new("/proj/sub"),
            Default::default(),
            0,
            0,
            std::time::Duration::from_secs(60),
        );
        watcher.handle_event(
            &event(EventKind::Create(CreateKind::File), "/proj/sub/main.go"),
            &cache,
        );
        assert!(cache.get(Path::new("/proj/sub")).is_none());
    }

    #[test]
    fn marker_basename_is_relevant_even_without_extension() {
        let watcher = FileWatcher::new("go");
        watcher.watch("/proj");
        let cache = EvidenceCache::new();
        cache.set(
            Path::new("/proj"),
            Default::default(),
            0,
            0,
            std::time::Duration::from_secs(60),
        );
        watcher.handle_event(&event(EventKind::Modify(ModifyKind::Any), "/proj/go.mod"), &cache);
        assert!(cache.get(Path::new("/proj")).is_none());
    }
}
