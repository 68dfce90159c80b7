//! The data model shared across the query-processing pipeline (spec §3).

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime};

use queryd_commons::Usage;
use serde::{Deserialize, Serialize};

/// An immutable user request. Created by the CLI, consumed by the
/// [`crate::router::Router`]; never mutated after creation.
#[derive(Debug, Clone)]
pub struct Query {
    pub id: String,
    pub text: String,
    pub language: Option<String>,
    pub project_root: std::path::PathBuf,
    pub environment: HashMap<String, String>,
    pub created_at: SystemTime,
}

impl Query {
    pub fn new(id: impl Into<String>, text: impl Into<String>, project_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            language: None,
            project_root: project_root.into(),
            environment: HashMap::new(),
            created_at: SystemTime::now(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn lowercase_text(&self) -> String {
        self.text.to_lowercase()
    }
}

/// The three cost classes a query can be assigned to (spec §6, GLOSSARY).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Simple,
    Medium,
    Complex,
}

/// A plan describing how a tier processor should satisfy a query, produced
/// alongside the tier verdict itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingStrategy {
    pub strategy_type: String,
    pub operations: Vec<String>,
    pub use_vector: bool,
    pub use_llm: bool,
    pub cache_key: String,
}

/// Verdict produced by the intent classifier (C6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tier: Tier,
    pub confidence: f64,
    pub matched_patterns: Vec<String>,
    pub estimated_cost: f64,
    pub estimated_latency: Duration,
    pub required_operations: Vec<String>,
    pub skip_llm: bool,
    pub strategy: ProcessingStrategy,
    pub reasoning: String,
}

/// Safety classification for a registered probe (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyLevel {
    Safe,
    Moderate,
    Dangerous,
    Restricted,
}

/// Category tag used to group probes by what they inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Filesystem,
    System,
    Git,
    Process,
    Network,
    Database,
}

/// A declarative, read-only-after-startup probe definition (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,
    pub binary: String,
    pub args: Vec<String>,
    pub safety: SafetyLevel,
    pub category: Category,
    pub triggers: Vec<String>,
}

/// One entry in the MCP executor's compact execution history (spec §4.2 step 5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub query_id: String,
    pub command_names: Vec<String>,
    pub success: bool,
    pub duration: Duration,
    pub timestamp: SystemTime,
}

/// Result of one MCP execution pass (spec §4.2 / §3 invariant).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub operations: Vec<String>,
    pub data: HashMap<String, serde_json::Value>,
    pub success: bool,
    pub errors: HashMap<String, String>,
    pub duration: Duration,
}

impl EvidenceRecord {
    /// Invariant check (spec §3): `operations` must equal the key set of
    /// `data` once each `<op>_error` key is normalized back to `<op>` — a
    /// failed probe records its evidence under `<op>_error` (see
    /// `mcp::executor::analyze_and_execute`) rather than under a bare `<op>`
    /// key, but it still counts as the operation having run.
    pub fn is_well_formed(&self) -> bool {
        let data_ops: std::collections::HashSet<&str> = self
            .data
            .keys()
            .map(|k| k.strip_suffix("_error").unwrap_or(k.as_str()))
            .collect();
        let op_set: std::collections::HashSet<&str> =
            self.operations.iter().map(|s| s.as_str()).collect();
        data_ops == op_set
    }
}

/// Cached evidence plus the bookkeeping needed to decide freshness and
/// equivalence (spec §3, C3).
#[derive(Debug, Clone)]
pub struct CachedEvidence {
    pub record: EvidenceRecord,
    pub created_at: Instant,
    pub file_count: usize,
    pub fingerprint: u64,
    pub ttl: Duration,
}

impl CachedEvidence {
    pub fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) <= self.ttl
    }
}

/// Per-project usage statistics accumulated by the Usage Tracker (C4).
#[derive(Debug, Clone, Default)]
pub struct UsagePattern {
    pub query_type_counts: HashMap<String, u64>,
    pub operation_counts: HashMap<String, u64>,
    pub hour_of_day_counts: HashMap<u8, u64>,
    pub last_access: Option<SystemTime>,
    pub access_count: u64,
    pub avg_response_time: Duration,
}

/// A learned pattern maintained by the Learning Engine (C11).
#[derive(Debug, Clone)]
pub struct LearnedPattern {
    pub key: String,
    pub primary_intent: String,
    pub success_rate: f64,
    pub avg_duration: Duration,
    pub optimal_ops: Vec<String>,
    pub context_needs: Vec<String>,
    pub usage_count: u64,
    pub last_used: SystemTime,
    pub confidence: f64,
}

/// The shape of a response, distinguishing content types for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    System,
    Search,
    Explanation,
    Code,
    Error,
}

/// A single vector-search hit (spec §6, `VectorDb::search`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub file: String,
    pub line: u32,
    pub score: f64,
    pub context: String,
}

/// Response content: free text plus optional structured extras.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseContent {
    pub text: String,
    pub code: Option<String>,
    pub search_hits: Vec<SearchHit>,
}

/// Metadata describing how a response was produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub generation_time: Duration,
    pub confidence: f64,
    pub tools: Vec<String>,
    pub reasoning: String,
    pub sources: Vec<String>,
}

/// Returned to the caller of [`crate::router::Router::process_query`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: String,
    pub query_id: String,
    pub response_type: ResponseType,
    pub content: ResponseContent,
    pub agent_used: String,
    pub provider: String,
    pub token_usage: Usage,
    pub cost: f64,
    pub metadata: ResponseMetadata,
}

impl Response {
    pub fn error(query_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: format!("resp-{}", uuid_like()),
            query_id: query_id.into(),
            response_type: ResponseType::Error,
            content: ResponseContent {
                text: text.into(),
                code: None,
                search_hits: Vec::new(),
            },
            agent_used: "router".to_string(),
            provider: String::new(),
            token_usage: Usage::zero(),
            cost: 0.0,
            metadata: ResponseMetadata::default(),
        }
    }
}

/// A process-local, monotonically-increasing id generator. Not a real UUID
/// (no extra dependency is needed for internal response ids).
fn uuid_like() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("{:x}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_record_well_formed_when_keys_match() {
        let mut record = EvidenceRecord::default();
        record.operations.push("git_status".to_string());
        record
            .data
            .insert("git_status".to_string(), serde_json::json!({"ok": true}));
        assert!(record.is_well_formed());
    }

    #[test]
    fn evidence_record_well_formed_with_error_key() {
        let mut record = EvidenceRecord::default();
        record.operations.push("git_status".to_string());
        record
            .errors
            .insert("git_status".to_string(), "timeout".to_string());
        record
            .data
            .insert("git_status_error".to_string(), serde_json::json!("timeout"));
        assert!(record.is_well_formed());
    }

    #[test]
    fn evidence_record_not_well_formed_on_mismatch() {
        let mut record = EvidenceRecord::default();
        record.operations.push("git_status".to_string());
        record
            .data
            .insert("other_op".to_string(), serde_json::json!({}));
        assert!(!record.is_well_formed());
    }

    #[test]
    fn cached_evidence_freshness() {
        let now = Instant::now();
        let cached = CachedEvidence {
            record: EvidenceRecord::default(),
            created_at: now,
            file_count: 0,
            fingerprint: 0,
            ttl: Duration::from_secs(60),
        };
        assert!(cached.is_fresh(now));
        assert!(cached.is_fresh(now + Duration::from_secs(59)));
        assert!(!cached.is_fresh(now + Duration::from_secs(61)));
    }
}
