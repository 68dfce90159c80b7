//! Tier 2 — MCP + Vector (spec §4.9): a grep-style filesystem search fanned
//! out in parallel with a vector search, no LLM call.

use std::sync::Arc;
use std::time::Duration;

use queryd_commons::Usage;

use crate::cache::{self, EvidenceCache};
use crate::capabilities::VectorDb;
use crate::types::{ClassificationResult, EvidenceRecord, Query, Response, ResponseType, SearchHit};

use super::text_response;

const STOPWORDS: &[&str] = &["the", "and", "for", "with", "that", "this", "from", "how", "many"];

pub struct Tier2Processor {
    cache: Arc<EvidenceCache>,
    fanout_deadline: Duration,
    vector: Option<Arc<dyn VectorDb>>,
}

impl Tier2Processor {
    pub fn new(cache: Arc<EvidenceCache>, fanout_deadline: Duration, vector: Option<Arc<dyn VectorDb>>) -> Self {
        Self {
            cache,
            fanout_deadline,
            vector,
        }
    }

    pub async fn process(&self, query: &Query, classification: &ClassificationResult) -> Response {
        if let Some(cached) = self.cache.get(&query.project_root) {
            if let Some(text) = cached.data.get("tier2_text").and_then(|v| v.as_str()) {
                return self.finish(query, classification, text.to_string(), Vec::new());
            }
        }

        let terms = search_terms(&query.text);
        let project_root = query.project_root.clone();
        let grep_terms = terms.clone();
        let fs_task = tokio::spawn(async move { grep_search(&project_root, &grep_terms) });

        let vector_task: tokio::task::JoinHandle<Vec<SearchHit>> = {
            let vector = self.vector.clone();
            let query_text = query.text.clone();
            tokio::spawn(async move {
                match vector {
                    Some(vector) => vector.search(&query_text, 10).await.unwrap_or_default(),
                    None => Vec::new(),
                }
            })
        };

        let deadline = self.fanout_deadline;
        let fs_hits = tokio::time::timeout(deadline, fs_task)
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or_default();
        let vector_hits = tokio::time::timeout(deadline, vector_task)
            .await
            .ok()
            .and_then(|r| r.ok())
            .unwrap_or_default();

        let text = format!(
            "## Filesystem Search\n{}\n\n## Semantic Search\n{}",
            format_fs_hits(&fs_hits),
            format_vector_hits(&vector_hits),
        );

        let mut record = EvidenceRecord::default();
        record.success = true;
        record
            .data
            .insert("tier2_text".to_string(), serde_json::json!(text.clone()));
        let fingerprint = cache::fingerprint(&["tier2_text".to_string()], fs_hits.len());
        self.cache
            .set(&query.project_root, record, 0, fingerprint, Duration::from_secs(300));

        self.finish(query, classification, text, vector_hits)
    }

    fn finish(
        &self,
        query: &Query,
        classification: &ClassificationResult,
        text: String,
        search_hits: Vec<SearchHit>,
    ) -> Response {
        let mut response = text_response(
            &query.id,
            ResponseType::Search,
            text,
            "mcp_vector",
            "hybrid",
            Usage::zero(),
            0.0005,
            classification.required_operations.clone(),
        );
        response.content.search_hits = search_hits;
        response
    }
}

fn search_terms(query_text: &str) -> Vec<String> {
    query_text
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

fn grep_search(project_root: &std::path::Path, terms: &[String]) -> Vec<(String, usize, String)> {
    if terms.is_empty() {
        return Vec::new();
    }

    let mut hits = Vec::new();
    for entry in walkdir::WalkDir::new(project_root)
        .max_depth(8)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Ok(contents) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (idx, line) in contents.lines().enumerate() {
            let lowered = line.to_lowercase();
            if terms.iter().any(|t| lowered.contains(t.as_str())) {
                hits.push((entry.path().display().to_string(), idx + 1, line.trim().to_string()));
                if hits.len() >= 20 {
                    return hits;
                }
            }
        }
    }
    hits
}

fn format_fs_hits(hits: &[(String, usize, String)]) -> String {
    if hits.is_empty() {
        return "(no matches)".to_string();
    }
    hits.iter()
        .map(|(file, line, text)| format!("{file}:{line}: {text}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_vector_hits(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "(no matches)".to_string();
    }
    hits.iter()
        .map(|hit| format!("{}:{} (score {:.2}) {}", hit.file, hit.line, hit.score, hit.context))
        .collect::<Vec<_>>()
        .join("\n")
}
