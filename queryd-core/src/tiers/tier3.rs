//! Tier 3 — Full LLM (spec §4.9): rich context gathering, adaptive prompt,
//! provider fallback, "key files referenced" / "system context" appendices.

use std::fmt::Write as _;
use std::sync::Arc;

use queryd_commons::{ErrorFormatter, Usage};

use crate::capabilities::{GenerateRequest, Llm};
use crate::context::{ContextGatherer, GatherIntent, GatherPlan};
use crate::prompt::{PromptBuilder, QualityRequirements};
use crate::types::{ClassificationResult, Query, Response, ResponseType};

use super::text_response;

pub struct Tier3Processor {
    gatherer: ContextGatherer,
    providers: Vec<Arc<dyn Llm>>,
    error_formatter: Arc<dyn ErrorFormatter>,
}

impl Tier3Processor {
    pub fn new(gatherer: ContextGatherer, providers: Vec<Arc<dyn Llm>>, error_formatter: Arc<dyn ErrorFormatter>) -> Self {
        Self {
            gatherer,
            providers,
            error_formatter,
        }
    }

    pub async fn process(
        &self,
        query: &Query,
        classification: &ClassificationResult,
        gather_deadline: std::time::Duration,
    ) -> Response {
        let intent = infer_intent(&query.lowercase_text());
        let plan = GatherPlan {
            project_root: query.project_root.clone(),
            query_id: query.id.clone(),
            query_text: query.text.clone(),
            intent,
            deadline: gather_deadline,
        };
        let gathered = self.gatherer.gather(&plan).await;

        let quality = QualityRequirements {
            require_examples: intent == GatherIntent::Generate,
            require_context: true,
        };
        let prompt = PromptBuilder::build(query, intent, &gathered, &quality);

        let full_prompt = format!(
            "{}\n\n{}\n\nContext:\n{}\n\nExamples:\n{}",
            prompt.system, prompt.user, prompt.context, prompt.examples
        );

        let request = GenerateRequest {
            prompt: full_prompt,
            max_tokens: 2048,
            temperature: 0.2,
        };

        let mut last_error = None;
        for provider in &self.providers {
            match provider.generate(request.clone()).await {
                Ok(generated) => {
                    let mut text = generated.text;
                    if !gathered.relevant_files.is_empty() {
                        let _ = write!(
                            text,
                            "\n\n---\nKey files referenced:\n{}",
                            gathered.relevant_files.join("\n")
                        );
                    }
                    if !gathered.system_info.is_empty() {
                        let _ = write!(text, "\n\nSystem context:\n{}", gathered.system_info);
                    }

                    let mut response = text_response(
                        &query.id,
                        ResponseType::Explanation,
                        text,
                        "intelligent_processor",
                        provider.provider_name(),
                        generated.usage,
                        generated.cost,
                        classification.required_operations.clone(),
                    );
                    response.metadata.tools.push("llm_generation".to_string());
                    return response;
                }
                Err(err) => {
                    last_error = Some(err);
                }
            }
        }

        let message = last_error
            .map(|err| anyhow::anyhow!("all providers failed: {err}"))
            .unwrap_or_else(|| anyhow::anyhow!("all providers failed: no LLM provider configured"));
        let mut response = Response::error(&query.id, self.error_formatter.format_error(&message));
        response.metadata.tools = classification.required_operations.clone();
        response.token_usage = Usage::zero();
        response
    }
}

fn infer_intent(lowered: &str) -> GatherIntent {
    if lowered.contains("explain") || lowered.contains("describe") || lowered.contains("architecture") {
        GatherIntent::Explain
    } else if lowered.contains("create") || lowered.contains("generate") || lowered.contains("implement") {
        GatherIntent::Generate
    } else if lowered.contains("find") || lowered.contains("search") || lowered.contains("locate") || lowered.contains("where is") {
        GatherIntent::Search
    } else if lowered.contains("memory") || lowered.contains("cpu") || lowered.contains("status") {
        GatherIntent::SystemStatus
    } else {
        GatherIntent::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EvidenceCache;
    use crate::capabilities::GenerateResponse;
    use crate::registry::CommandRegistry;
    use queryd_commons::{DisplayErrorFormatter, StaticWorkspacePaths, WorkspacePaths};
    use std::path::PathBuf;

    fn workspace() -> Arc<dyn WorkspacePaths> {
        Arc::new(StaticWorkspacePaths::new(std::env::current_dir().unwrap()))
    }

    struct FailingProvider;

    #[async_trait::async_trait]
    impl Llm for FailingProvider {
        fn provider_name(&self) -> &str {
            "flaky"
        }
        async fn generate(&self, _request: GenerateRequest) -> anyhow::Result<GenerateResponse> {
            anyhow::bail!("provider unavailable")
        }
    }

    struct WorkingProvider;

    #[async_trait::async_trait]
    impl Llm for WorkingProvider {
        fn provider_name(&self) -> &str {
            "backup"
        }
        async fn generate(&self, _request: GenerateRequest) -> anyhow::Result<GenerateResponse> {
            Ok(GenerateResponse {
                text: "The flow starts in main.rs".repeat(10),
                usage: Usage::new(500, 200),
                cost: 0.02,
            })
        }
    }

    #[tokio::test]
    async fn falls_back_to_next_provider_on_failure() {
        let registry = Arc::new(CommandRegistry::with_seed_catalog().unwrap());
        let cache = Arc::new(EvidenceCache::new());
        let gatherer = ContextGatherer::new(registry, cache, std::time::Duration::from_secs(2), None, workspace());
        let processor = Tier3Processor::new(
            gatherer,
            vec![Arc::new(FailingProvider), Arc::new(WorkingProvider)],
            Arc::new(DisplayErrorFormatter),
        );
        let query = Query::new(
            "q1",
            "explain the flow of this application",
            PathBuf::from(std::env::current_dir().unwrap()),
        );
        let classification = crate::classifier::IntentClassifier::new().classify(&query);
        let response = processor
            .process(&query, &classification, std::time::Duration::from_secs(2))
            .await;
        assert_eq!(response.provider, "backup");
        assert!(response.content.text.len() > 200);
        assert!(response.metadata.tools.contains(&"llm_generation".to_string()));
    }

    #[tokio::test]
    async fn error_response_when_every_provider_fails() {
        let registry = Arc::new(CommandRegistry::with_seed_catalog().unwrap());
        let cache = Arc::new(EvidenceCache::new());
        let gatherer = ContextGatherer::new(registry, cache, std::time::Duration::from_secs(2), None, workspace());
        let processor = Tier3Processor::new(gatherer, vec![Arc::new(FailingProvider)], Arc::new(DisplayErrorFormatter));
        let query = Query::new("q2", "explain this", PathBuf::from(std::env::current_dir().unwrap()));
        let classification = crate::classifier::IntentClassifier::new().classify(&query);
        let response = processor
            .process(&query, &classification, std::time::Duration::from_secs(2))
            .await;
        assert_eq!(response.response_type, ResponseType::Error);
        assert!(response.content.text.contains("all providers failed"));
    }
}
