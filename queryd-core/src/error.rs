//! Error taxonomy (spec §7). Local recovery is the default at every leaf;
//! these variants surface only when no tier can produce content, or at
//! startup before any query has been processed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryDError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("classification failed: {0}")]
    ClassificationFailure(String),

    #[error("command `{command}` is blocked for safety: {reason}")]
    CommandSafetyViolation { command: String, reason: String },

    #[error("probe `{name}` failed: {source}")]
    ProbeFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("probe `{name}` timed out after {elapsed_ms}ms")]
    ProbeTimeout { name: String, elapsed_ms: u64 },

    #[error("vector backend error: {0}")]
    VectorBackendError(String),

    #[error("LLM generation failed across all providers: {0}")]
    LlmFailure(String),

    #[error("router recovered from an internal fault: {0}")]
    RouterPanic(String),
}
