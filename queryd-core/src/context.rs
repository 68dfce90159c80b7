//! Parallel Context Gatherer (spec §4.7, C7).
//!
//! C7 spawns one independent child task per data source and joins them
//! through per-child `oneshot` result channels, each bounded by the shared
//! gather deadline, so the final `GatheredContext` reflects whichever
//! sources completed in time instead of blocking on the slowest. Grounded on
//! `vtcode-core/src/agent/runloop/unified/*`'s fan-out-then-join pattern.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use queryd_commons::WorkspacePaths;

use crate::cache::{self, EvidenceCache};
use crate::capabilities::VectorDb;
use crate::mcp::McpExecutor;
use crate::registry::CommandRegistry;
use crate::types::SearchHit;

/// The narrow slice of classifier output the gatherer needs to decide which
/// sources are applicable (spec §4.7 "Scheduling model").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatherIntent {
    Explain,
    Generate,
    Search,
    SystemStatus,
    Other,
}

#[derive(Debug, Clone)]
pub struct GatherPlan {
    pub project_root: PathBuf,
    pub query_id: String,
    pub query_text: String,
    pub intent: GatherIntent,
    pub deadline: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct GatheredContext {
    pub project_info: String,
    pub relevant_files: Vec<String>,
    pub system_info: String,
    pub code_examples: Vec<SearchHit>,
}

/// Architectural files consulted for `IntentExplain` queries (spec §4.7).
const ARCHITECTURAL_FILES: &[&str] = &["README.md", "Cargo.toml", "src/main.rs", "src/lib.rs"];

pub struct ContextGatherer {
    registry: Arc<CommandRegistry>,
    cache: Arc<EvidenceCache>,
    per_command_timeout: Duration,
    vector: Option<Arc<dyn VectorDb>>,
    workspace: Arc<dyn WorkspacePaths>,
}

impl ContextGatherer {
    pub fn new(
        registry: Arc<CommandRegistry>,
        cache: Arc<EvidenceCache>,
        per_command_timeout: Duration,
        vector: Option<Arc<dyn VectorDb>>,
        workspace: Arc<dyn WorkspacePaths>,
    ) -> Self {
        Self {
            registry,
            cache,
            per_command_timeout,
            vector,
            workspace,
        }
    }

    /// Fan out one `tokio::spawn` child task per data source, each reporting
    /// back over a single-capacity `oneshot` channel bounded by
    /// `plan.deadline`; a source that doesn't answer in time degrades to its
    /// default instead of holding up the others, and none of them can panic
    /// the caller.
    pub async fn gather(&self, plan: &GatherPlan) -> GatheredContext {
        let lowered = plan.query_text.to_lowercase();
        let deadline = plan.deadline;

        let want_system =
            plan.intent == GatherIntent::SystemStatus || contains_any(&lowered, &["cpu", "memory", "usage", "status"]);
        let want_examples = plan.intent == GatherIntent::Generate
            || plan.intent == GatherIntent::Explain
            || contains_any(&lowered, &["example", "pattern", "similar"]);
        let explain = plan.intent == GatherIntent::Explain;
        let keywords = extract_keywords(&lowered);

        let project_info = spawn_bounded(deadline, {
            let registry = self.registry.clone();
            let cache = self.cache.clone();
            let workspace = self.workspace.clone();
            let timeout = self.per_command_timeout;
            let query_id = plan.query_id.clone();
            let project_root = plan.project_root.clone();
            async move {
                let executor = McpExecutor::new(&registry, timeout, workspace);
                project_info_source(&executor, &cache, &query_id, &project_root).await
            }
        });

        let system_info = spawn_bounded(deadline, {
            let registry = self.registry.clone();
            let workspace = self.workspace.clone();
            let timeout = self.per_command_timeout;
            let query_id = plan.query_id.clone();
            let project_root = plan.project_root.clone();
            async move {
                let executor = McpExecutor::new(&registry, timeout, workspace);
                system_info_source(&executor, want_system, &query_id, &project_root).await
            }
        });

        let code_examples = spawn_bounded(deadline, {
            let vector = self.vector.clone();
            let query_text = plan.query_text.clone();
            async move { examples_source(vector.as_deref(), want_examples, &query_text).await }
        });

        let relevant_files = spawn_blocking_bounded(deadline, {
            let project_root = plan.project_root.clone();
            let keywords = keywords.clone();
            move || relevant_files_source(explain, &project_root, &keywords)
        });

        let (project_info, system_info, code_examples, relevant_files) =
            tokio::join!(project_info, system_info, code_examples, relevant_files);

        GatheredContext {
            project_info: project_info.unwrap_or_default(),
            relevant_files: relevant_files.unwrap_or_default(),
            system_info: system_info.unwrap_or_default(),
            code_examples: code_examples.unwrap_or_default(),
        }
    }
}

/// Spawn `fut` as an independent child task and join it through a
/// single-capacity `oneshot` channel, bounded by `deadline`.
async fn spawn_bounded<T>(deadline: Duration, fut: impl std::future::Future<Output = T> + Send + 'static) -> Option<T>
where
    T: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let _ = tx.send(fut.await);
    });
    tokio::time::timeout(deadline, rx).await.ok()?.ok()
}

/// Same contract as [`spawn_bounded`] but for the synchronous filesystem
/// walk, which must run on a blocking thread rather than the async
/// executor (spec §4.7: every source, including the file search, is bounded
/// by the gather deadline).
async fn spawn_blocking_bounded<T>(deadline: Duration, work: impl FnOnce() -> T + Send + 'static) -> Option<T>
where
    T: Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    tokio::time::timeout(deadline, handle).await.ok()?.ok()
}

async fn system_info_source(
    executor: &McpExecutor<'_>,
    want_system: bool,
    query_id: &str,
    project_root: &std::path::Path,
) -> String {
    if !want_system {
        return String::new();
    }
    let record = executor.analyze_and_execute(query_id, "memory status", project_root).await;
    record
        .data
        .get("memory_usage")
        .and_then(|v| v.get("info"))
        .and_then(|v| v.as_str())
        .unwrap_or("system info unavailable")
        .to_string()
}

async fn examples_source(
    vector: Option<&dyn VectorDb>,
    want_examples: bool,
    query_text: &str,
) -> Vec<SearchHit> {
    if !want_examples {
        return Vec::new();
    }
    match vector {
        Some(vector) => vector.search(query_text, 5).await.unwrap_or_default(),
        None => Vec::new(),
    }
}

async fn project_info_source(
    executor: &McpExecutor<'_>,
    cache: &EvidenceCache,
    query_id: &str,
    project_root: &std::path::Path,
) -> String {
    if let Some(record) = cache.get(project_root) {
        return summarize_structure(&record);
    }

    let record = executor
        .analyze_and_execute(query_id, "project structure layout", project_root)
        .await;
    let fingerprint = cache::fingerprint(&record.operations, record.operations.len());
    let summary = summarize_structure(&record);
    cache.set(project_root, record, 0, fingerprint, Duration::from_secs(300));
    summary
}

fn summarize_structure(record: &crate::types::EvidenceRecord) -> String {
    record
        .data
        .get("project_structure")
        .and_then(|v| v.get("info").or_else(|| v.get("preview")))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn relevant_files_source(explain: bool, project_root: &std::path::Path, keywords: &[String]) -> Vec<String> {
    if explain {
        return ARCHITECTURAL_FILES
            .iter()
            .map(|f| project_root.join(f))
            .filter(|p| p.exists())
            .map(|p| p.display().to_string())
            .collect();
    }

    if keywords.is_empty() {
        return Vec::new();
    }

    walkdir::WalkDir::new(project_root)
        .max_depth(6)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            keywords.iter().any(|kw| name.contains(kw.as_str()))
        })
        .take(20)
        .map(|entry| entry.path().display().to_string())
        .collect()
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

const STOPWORDS: &[&str] = &["the", "and", "for", "with", "that", "this", "from"];

fn extract_keywords(lowered: &str) -> Vec<String> {
    lowered
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}
