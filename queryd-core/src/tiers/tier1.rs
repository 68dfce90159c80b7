//! Tier 1 — direct MCP (spec §4.9): cache-first, no vector search, no LLM.

use std::sync::Arc;
use std::time::Duration;

use queryd_commons::{Usage, WorkspacePaths};

use crate::cache::{self, EvidenceCache};
use crate::mcp::McpExecutor;
use crate::registry::CommandRegistry;
use crate::types::{ClassificationResult, Query, Response, ResponseType};

use super::text_response;

pub struct Tier1Processor<'a> {
    registry: &'a CommandRegistry,
    cache: Arc<EvidenceCache>,
    per_command_timeout: Duration,
    workspace: Arc<dyn WorkspacePaths>,
}

impl<'a> Tier1Processor<'a> {
    pub fn new(
        registry: &'a CommandRegistry,
        cache: Arc<EvidenceCache>,
        per_command_timeout: Duration,
        workspace: Arc<dyn WorkspacePaths>,
    ) -> Self {
        Self {
            registry,
            cache,
            per_command_timeout,
            workspace,
        }
    }

    pub async fn process(&self, query: &Query, classification: &ClassificationResult) -> Response {
        if let Some(cached) = self.cache.get(&query.project_root) {
            let text = self.format_operations(&classification.required_operations, &cached);
            return text_response(
                &query.id,
                ResponseType::System,
                text,
                "mcp_direct",
                "filesystem",
                Usage::zero(),
                0.0,
                classification.required_operations.clone(),
            );
        }

        let executor = McpExecutor::new(self.registry, self.per_command_timeout, self.workspace.clone());
        let record = executor
            .analyze_and_execute(&query.id, &query.text, &query.project_root)
            .await;

        let fingerprint = cache::fingerprint(&record.operations, record.operations.len());
        let text = self.format_operations(&classification.required_operations, &record);
        self.cache.set(
            &query.project_root,
            record,
            0,
            fingerprint,
            Duration::from_secs(600),
        );

        text_response(
            &query.id,
            ResponseType::System,
            text,
            "mcp_direct",
            "filesystem",
            Usage::zero(),
            0.0,
            classification.required_operations.clone(),
        )
    }

    fn format_operations(&self, operations: &[String], record: &crate::types::EvidenceRecord) -> String {
        let mut lines = Vec::new();
        for op in operations {
            match op.as_str() {
                "filesystem_list" => {
                    if let Some(value) = record.data.get("list_files") {
                        let count = value.get("file_count").and_then(|v| v.as_u64()).unwrap_or(0);
                        lines.push(format!("Found {count} files"));
                    }
                }
                "filesystem_tree" => {
                    if let Some(value) = record.data.get("project_structure") {
                        lines.push(value.get("info").and_then(|v| v.as_str()).unwrap_or("").to_string());
                    }
                }
                "system_info" => {
                    if let Some(value) = record.data.get("memory_usage") {
                        lines.push(value.get("info").and_then(|v| v.as_str()).unwrap_or("").to_string());
                    }
                }
                "filesystem_read" => {
                    if let Some(value) = record.data.get("list_files") {
                        lines.push(value.get("preview").and_then(|v| v.as_str()).unwrap_or("").to_string());
                    }
                }
                other => {
                    if let Some(value) = record.data.get(other) {
                        lines.push(value.to_string());
                    }
                }
            }
        }
        if lines.is_empty() {
            "No local evidence matched this query.".to_string()
        } else {
            lines.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn repeated_query_within_ttl_is_byte_equal() {
        let registry = CommandRegistry::with_seed_catalog().unwrap();
        let cache = Arc::new(EvidenceCache::new());
        let workspace = Arc::new(queryd_commons::StaticWorkspacePaths::new(std::env::current_dir().unwrap()));
        let processor = Tier1Processor::new(&registry, cache, Duration::from_secs(5), workspace);
        let query = Query::new("q1", "list files", PathBuf::from(std::env::current_dir().unwrap()));
        let classification = crate::classifier::IntentClassifier::new().classify(&query);

        let first = processor.process(&query, &classification).await;
        let second = processor.process(&query, &classification).await;
        assert_eq!(first.content.text, second.content.text);
        assert_eq!(first.cost, 0.0);
        assert_eq!(first.token_usage.total_tokens, 0);
    }
}
