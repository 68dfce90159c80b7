//! Capability interfaces the core pipeline consumes (spec §6). Concrete
//! implementations (a real embedding/vector-index client, provider-specific
//! LLM clients, a structured-log subscriber) are external collaborators and
//! out of scope for this crate.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use queryd_commons::Usage;

use crate::types::SearchHit;

/// Stateless, idempotent vector similarity search over the project.
#[async_trait]
pub trait VectorDb: Send + Sync {
    async fn search(&self, query_text: &str, limit: usize) -> Result<Vec<SearchHit>>;
}

/// A request to an LLM provider.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// A provider's response, including the usage/cost it reports.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub usage: Usage,
    pub cost: f64,
}

/// Generates text from a prompt. May fail transiently; the caller applies
/// the configured provider fallback order (spec §4.9 Tier 3).
#[async_trait]
pub trait Llm: Send + Sync {
    fn provider_name(&self) -> &str;

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;
}

/// Structured-event sink. A no-op logger is always an acceptable
/// implementation (spec §6): callers must never null-check before using it.
pub trait Logger: Send + Sync {
    fn info(&self, component: &str, message: &str, fields: HashMap<String, String>);
    fn error(&self, component: &str, message: &str, err: &anyhow::Error, fields: HashMap<String, String>);
}

/// Drops every event. Used as the default when no logger is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn info(&self, _component: &str, _message: &str, _fields: HashMap<String, String>) {}
    fn error(
        &self,
        _component: &str,
        _message: &str,
        _err: &anyhow::Error,
        _fields: HashMap<String, String>,
    ) {
    }
}

/// Forwards every event to the `tracing` subscriber installed by the CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, component: &str, message: &str, fields: HashMap<String, String>) {
        tracing::info!(component, message, ?fields);
    }

    fn error(
        &self,
        component: &str,
        message: &str,
        err: &anyhow::Error,
        fields: HashMap<String, String>,
    ) {
        tracing::error!(component, message, error = %err, ?fields);
    }
}
