//! Layered configuration for the router: built-in defaults, overridden by an
//! optional `queryd.toml`, overridden by recognised environment variables
//! (spec §6). Grounded on the layering idea in `vtcode-config`'s loader,
//! scaled down to the handful of knobs this pipeline actually needs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::QueryDError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Extension (without the dot) that marks a file as project-relevant
    /// for cache invalidation (spec §4.5). Default `"go"`, matching the
    /// spec's example.
    pub primary_source_extension: String,
    pub per_command_timeout_secs: u64,
    pub gather_deadline_secs: u64,
    pub tier2_fanout_deadline_secs: u64,
    pub llm_deadline_secs: u64,
    pub default_cache_ttl_secs: u64,
    pub tier1_cache_ttl_secs: u64,
    pub tier2_cache_ttl_secs: u64,
    pub provider_fallback_order: Vec<String>,
    pub validation_mode: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            primary_source_extension: "go".to_string(),
            per_command_timeout_secs: 10,
            gather_deadline_secs: 30,
            tier2_fanout_deadline_secs: 5,
            llm_deadline_secs: 30,
            default_cache_ttl_secs: 300,
            tier1_cache_ttl_secs: 600,
            tier2_cache_ttl_secs: 300,
            provider_fallback_order: vec!["search".to_string(), "context_search".to_string()],
            validation_mode: false,
        }
    }
}

impl RouterConfig {
    pub fn per_command_timeout(&self) -> Duration {
        Duration::from_secs(self.per_command_timeout_secs)
    }

    pub fn gather_deadline(&self) -> Duration {
        Duration::from_secs(self.gather_deadline_secs)
    }

    pub fn tier2_fanout_deadline(&self) -> Duration {
        Duration::from_secs(self.tier2_fanout_deadline_secs)
    }

    pub fn llm_deadline(&self) -> Duration {
        Duration::from_secs(self.llm_deadline_secs)
    }

    /// Parse a `queryd.toml` document, falling back to defaults for any
    /// missing field.
    pub fn from_toml_str(contents: &str) -> Result<Self, QueryDError> {
        toml::from_str(contents).map_err(|err| QueryDError::Config(err.to_string()))
    }

    /// Load defaults, then an optional config file, then environment
    /// overrides. `VALIDATION_MODE=1` turns on per-query analytics capture
    /// (spec §6 CLI surface, `validate` subcommand).
    pub fn load(config_path: Option<&std::path::Path>) -> Result<Self, QueryDError> {
        let mut config = match config_path {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(contents) => Self::from_toml_str(&contents)?,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
                Err(err) => {
                    return Err(QueryDError::Config(format!(
                        "failed to read {}: {err}",
                        path.display()
                    )));
                }
            },
            None => Self::default(),
        };

        if let Ok(value) = std::env::var("VALIDATION_MODE") {
            config.validation_mode = value == "1" || value.eq_ignore_ascii_case("true");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_timeouts() {
        let config = RouterConfig::default();
        assert_eq!(config.per_command_timeout().as_secs(), 10);
        assert_eq!(config.gather_deadline().as_secs(), 30);
        assert_eq!(config.tier2_fanout_deadline().as_secs(), 5);
        assert_eq!(config.llm_deadline().as_secs(), 30);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = RouterConfig::from_toml_str("primary_source_extension = \"rs\"").unwrap();
        assert_eq!(config.primary_source_extension, "rs");
        assert_eq!(config.per_command_timeout_secs, 10);
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let config = RouterConfig::load(Some(std::path::Path::new("/nonexistent/queryd.toml")))
            .expect("missing file should not be fatal");
        assert_eq!(config.primary_source_extension, "go");
    }
}
