//! Router / ManagerAgent (spec §4.10, C10): the single entry point that
//! classifies a query, dispatches to the matching tier processor, and
//! recovers from any runtime fault.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use futures::FutureExt;
use parking_lot::RwLock;
use queryd_commons::{DisplayErrorFormatter, ErrorFormatter, NoopTelemetry, StaticWorkspacePaths, TelemetrySink, WorkspacePaths};

use crate::cache::EvidenceCache;
use crate::capabilities::{Llm, Logger, NoopLogger, VectorDb};
use crate::classifier::IntentClassifier;
use crate::config::RouterConfig;
use crate::context::ContextGatherer;
use crate::learning::LearningEngine;
use crate::registry::{self, CommandRegistry};
use crate::tiers::tier1::Tier1Processor;
use crate::tiers::tier2::Tier2Processor;
use crate::tiers::tier3::Tier3Processor;
use crate::types::{ClassificationResult, Query, Response, ResponseType, Tier};
use crate::usage_tracker::UsageTracker;

/// One query's outcome, recorded through [`Router`]'s telemetry sink (spec
/// §4.10 step 5). Distinct from [`Metrics`], which only tracks aggregates.
#[derive(Debug, Clone)]
pub struct QueryEvent {
    pub query_id: String,
    pub tier: Tier,
    pub succeeded: bool,
    pub duration: Duration,
    pub cost: f64,
}

/// Aggregate counters the CLI can print (spec §4.10 step 5; the spec names
/// the fields but not a concrete type).
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pub query_count: u64,
    pub success_rate: f64,
    pub avg_duration: Duration,
    pub avg_confidence: f64,
    pub cumulative_tokens: u64,
    pub cumulative_cost: f64,
    pub last_used: Option<SystemTime>,
    pub error_count: u64,
}

impl Metrics {
    fn record(&mut self, succeeded: bool, duration: Duration, confidence: f64, tokens: u32, cost: f64) {
        self.query_count += 1;
        let outcome = if succeeded { 1.0 } else { 0.0 };
        self.success_rate = ema(self.success_rate, outcome, self.query_count);
        self.avg_duration = if self.query_count == 1 {
            duration
        } else {
            (self.avg_duration + duration) / 2
        };
        self.avg_confidence = ema(self.avg_confidence, confidence, self.query_count);
        self.cumulative_tokens += tokens as u64;
        self.cumulative_cost += cost;
        self.last_used = Some(SystemTime::now());
        if !succeeded {
            self.error_count += 1;
        }
    }
}

fn ema(previous: f64, new: f64, count: u64) -> f64 {
    if count <= 1 {
        new
    } else {
        previous + (new - previous) / count as f64
    }
}

pub struct Router {
    registry: Arc<CommandRegistry>,
    cache: Arc<EvidenceCache>,
    usage_tracker: UsageTracker,
    learning: LearningEngine,
    classifier: IntentClassifier,
    config: RouterConfig,
    vector: Option<Arc<dyn VectorDb>>,
    providers: Vec<Arc<dyn Llm>>,
    logger: Arc<dyn Logger>,
    workspace: Arc<dyn WorkspacePaths>,
    error_formatter: Arc<dyn ErrorFormatter>,
    telemetry: Arc<dyn TelemetrySink<QueryEvent>>,
    metrics: RwLock<Metrics>,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self::with_capabilities(config, None, Vec::new(), Arc::new(NoopLogger))
    }

    pub fn with_capabilities(
        config: RouterConfig,
        vector: Option<Arc<dyn VectorDb>>,
        providers: Vec<Arc<dyn Llm>>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let workspace_root = std::env::current_dir().unwrap_or_default();
        Self::with_workspace(
            config,
            vector,
            providers,
            logger,
            Arc::new(StaticWorkspacePaths::new(workspace_root)),
        )
    }

    pub fn with_workspace(
        config: RouterConfig,
        vector: Option<Arc<dyn VectorDb>>,
        providers: Vec<Arc<dyn Llm>>,
        logger: Arc<dyn Logger>,
        workspace: Arc<dyn WorkspacePaths>,
    ) -> Self {
        let registry = Arc::new(CommandRegistry::with_seed_catalog().expect("seed catalog always validates"));
        Self {
            registry,
            cache: Arc::new(EvidenceCache::new()),
            usage_tracker: UsageTracker::new(),
            learning: LearningEngine::new(),
            classifier: IntentClassifier::new(),
            config,
            vector,
            providers,
            logger,
            workspace,
            error_formatter: Arc::new(DisplayErrorFormatter),
            telemetry: Arc::new(NoopTelemetry),
            metrics: RwLock::new(Metrics::default()),
        }
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.read().clone()
    }

    pub fn cache_stats(&self, ttl: Duration) -> crate::cache::CacheStats {
        self.cache.stats(ttl).0
    }

    /// The only required method of the programmatic surface (spec §6).
    pub async fn process_query(&self, query: Query) -> Response {
        let started = Instant::now();

        if query.text.trim().is_empty() {
            let response = Response::error(&query.id, self.error_formatter.format_error(&anyhow::anyhow!("empty query")));
            self.finish(&query, &response, started.elapsed(), 0.0, Tier::Simple);
            return response;
        }

        if let Some(binary) = registry::contains_denied_command(&query.text) {
            let response = Response::error(
                &query.id,
                self.error_formatter
                    .format_error(&anyhow::anyhow!("`{binary}` is blocked for safety")),
            );
            self.finish(&query, &response, started.elapsed(), 0.0, Tier::Simple);
            return response;
        }

        let classification = self.classifier.classify(&query);
        let intent_label = classification.matched_patterns.first().cloned().unwrap_or_default();

        let result = self.dispatch(&query, &classification).await;

        let response = match result {
            Ok(response) => response,
            Err(panic_message) => {
                self.logger.error(
                    "router",
                    "tier processor panicked; attempting fallback",
                    &anyhow::anyhow!(panic_message),
                    Default::default(),
                );
                self.fallback(&query).await
            }
        };

        let succeeded = response.response_type != ResponseType::Error;
        self.usage_tracker
            .record(&query, &classification.required_operations, started.elapsed());
        self.learning
            .record_success(&intent_label, &query, started.elapsed(), succeeded);

        self.finish(&query, &response, started.elapsed(), classification.confidence, classification.tier);
        response
    }

    async fn dispatch(
        &self,
        query: &Query,
        classification: &ClassificationResult,
    ) -> Result<Response, String> {
        let future = async {
            match classification.tier {
                Tier::Simple => {
                    Tier1Processor::new(
                        &self.registry,
                        self.cache.clone(),
                        self.config.per_command_timeout(),
                        self.workspace.clone(),
                    )
                    .process(query, classification)
                    .await
                }
                Tier::Medium => {
                    Tier2Processor::new(self.cache.clone(), self.config.tier2_fanout_deadline(), self.vector.clone())
                        .process(query, classification)
                        .await
                }
                Tier::Complex => {
                    let gatherer = ContextGatherer::new(
                        self.registry.clone(),
                        self.cache.clone(),
                        self.config.per_command_timeout(),
                        self.vector.clone(),
                        self.workspace.clone(),
                    );
                    Tier3Processor::new(gatherer, self.providers.clone(), self.error_formatter.clone())
                        .process(query, classification, self.config.gather_deadline())
                        .await
                }
            }
        };

        AssertUnwindSafe(future).catch_unwind().await.map_err(|payload| {
            payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string())
        })
    }

    /// Fallback order on processor failure (spec §4.10 step 4): try the
    /// configured fallback tiers in order, first success wins.
    async fn fallback(&self, query: &Query) -> Response {
        let classification = self.classifier.classify(query);
        for agent in &self.config.provider_fallback_order {
            let attempt = match agent.as_str() {
                "search" => Some(
                    Tier2Processor::new(
                        self.cache.clone(),
                        self.config.tier2_fanout_deadline(),
                        self.vector.clone(),
                    )
                    .process(query, &classification)
                    .await,
                ),
                "context_search" => Some(
                    Tier1Processor::new(
                        &self.registry,
                        self.cache.clone(),
                        self.config.per_command_timeout(),
                        self.workspace.clone(),
                    )
                    .process(query, &classification)
                    .await,
                ),
                _ => None,
            };
            if let Some(response) = attempt {
                if response.response_type != ResponseType::Error {
                    return response;
                }
            }
        }
        Response::error(
            &query.id,
            self.error_formatter
                .format_error(&anyhow::anyhow!("router recovered from an internal fault and no fallback succeeded")),
        )
    }

    fn finish(&self, query: &Query, response: &Response, duration: Duration, confidence: f64, tier: Tier) {
        let succeeded = response.response_type != ResponseType::Error;
        self.metrics.write().record(
            succeeded,
            duration,
            confidence,
            response.token_usage.total_tokens,
            response.cost,
        );
        let _ = self.telemetry.record(&QueryEvent {
            query_id: query.id.clone(),
            tier,
            succeeded,
            duration,
            cost: response.cost,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn empty_query_is_an_error_response_without_crashing() {
        let router = Router::new(RouterConfig::default());
        let query = Query::new("q1", "   ", PathBuf::from(std::env::current_dir().unwrap()));
        let response = router.process_query(query).await;
        assert_eq!(response.response_type, ResponseType::Error);
    }

    #[tokio::test]
    async fn simple_query_costs_nothing() {
        let router = Router::new(RouterConfig::default());
        let query = Query::new("q2", "list files", PathBuf::from(std::env::current_dir().unwrap()));
        let response = router.process_query(query).await;
        assert_eq!(response.cost, 0.0);
        assert_eq!(response.token_usage.total_tokens, 0);
    }

    #[tokio::test]
    async fn metrics_accumulate_across_queries() {
        let router = Router::new(RouterConfig::default());
        for _ in 0..3 {
            let query = Query::new("q", "list files", PathBuf::from(std::env::current_dir().unwrap()));
            router.process_query(query).await;
        }
        assert_eq!(router.metrics().query_count, 3);
    }

    #[tokio::test]
    async fn unsafe_raw_query_is_never_executed_as_a_command() {
        let router = Router::new(RouterConfig::default());
        let query = Query::new("q3", "rm -rf /", PathBuf::from(std::env::current_dir().unwrap()));
        let response = router.process_query(query).await;
        // A deny-listed binary named in the raw query text is rejected
        // before classification or dispatch ever runs, so `rm` is never
        // even considered as a probe candidate.
        assert_eq!(response.response_type, ResponseType::Error);
        assert!(response.content.text.contains("blocked for safety"));
    }
}
