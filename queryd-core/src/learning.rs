//! Learning Engine (spec §4.11, C11): advisory pattern statistics the
//! Router may consult but is never required to follow.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use crate::types::{LearnedPattern, ProcessingStrategy, Query};

#[derive(Default)]
pub struct LearningEngine {
    patterns: RwLock<HashMap<String, LearnedPattern>>,
}

impl LearningEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build `intent||keyword_1||keyword_2||keyword_3` from the top-3
    /// keywords (>= 4 chars) in the query text.
    pub fn pattern_key(intent: &str, query: &Query) -> String {
        let mut keywords: Vec<&str> = query
            .text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
            .filter(|w| w.len() >= 4)
            .collect();
        keywords.truncate(3);
        let mut parts = vec![intent];
        parts.extend(keywords);
        parts.join("||")
    }

    /// Called on every successful query; updates usage_count, last_used,
    /// the EMA of duration, and the running mean of success_rate.
    pub fn record_success(&self, intent: &str, query: &Query, duration: Duration, succeeded: bool) {
        let key = Self::pattern_key(intent, query);
        let mut guard = self.patterns.write();
        let pattern = guard.entry(key.clone()).or_insert_with(|| LearnedPattern {
            key: key.clone(),
            primary_intent: intent.to_string(),
            success_rate: 1.0,
            avg_duration: duration,
            optimal_ops: Vec::new(),
            context_needs: Vec::new(),
            usage_count: 0,
            last_used: SystemTime::now(),
            confidence: 0.5,
        });

        pattern.usage_count += 1;
        pattern.last_used = SystemTime::now();
        pattern.avg_duration = if pattern.usage_count == 1 {
            duration
        } else {
            (pattern.avg_duration + duration) / 2
        };
        let outcome = if succeeded { 1.0 } else { 0.0 };
        pattern.success_rate = pattern.success_rate + (outcome - pattern.success_rate) / pattern.usage_count as f64;
        pattern.confidence = (0.5 + 0.1 * pattern.usage_count as f64).min(0.95);
    }

    pub fn remember_plan(&self, intent: &str, query: &Query, operations: Vec<String>, context_needs: Vec<String>) {
        let key = Self::pattern_key(intent, query);
        let mut guard = self.patterns.write();
        if let Some(pattern) = guard.get_mut(&key) {
            pattern.optimal_ops = operations;
            pattern.context_needs = context_needs;
        }
    }

    /// Returns a pre-seeded plan only once confidence exceeds 0.7.
    pub fn optimal_plan(&self, intent: &str, query: &Query) -> Option<ProcessingStrategy> {
        let key = Self::pattern_key(intent, query);
        let guard = self.patterns.read();
        let pattern = guard.get(&key)?;
        if pattern.confidence <= 0.7 || pattern.optimal_ops.is_empty() {
            return None;
        }
        Some(ProcessingStrategy {
            strategy_type: "learned".to_string(),
            operations: pattern.optimal_ops.clone(),
            use_vector: !pattern.context_needs.is_empty(),
            use_llm: false,
            cache_key: format!("learned:{key}"),
        })
    }

    pub fn pattern(&self, intent: &str, query: &Query) -> Option<LearnedPattern> {
        self.patterns.read().get(&Self::pattern_key(intent, query)).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn q(text: &str) -> Query {
        Query::new("q", text, PathBuf::from("/proj"))
    }

    #[test]
    fn pattern_key_uses_top_three_long_keywords() {
        let query = q("explain the authentication flow implementation details");
        let key = LearningEngine::pattern_key("explain", &query);
        assert_eq!(key, "explain||explain||authentication||flow");
    }

    #[test]
    fn confidence_grows_with_usage_and_caps_at_095() {
        let engine = LearningEngine::new();
        let query = q("explain the authentication flow");
        for _ in 0..20 {
            engine.record_success("explain", &query, Duration::from_millis(10), true);
        }
        let pattern = engine.pattern("explain", &query).unwrap();
        assert!(pattern.confidence <= 0.95);
    }

    #[test]
    fn optimal_plan_absent_below_confidence_threshold() {
        let engine = LearningEngine::new();
        let query = q("explain the authentication flow");
        engine.record_success("explain", &query, Duration::from_millis(10), true);
        assert!(engine.optimal_plan("explain", &query).is_none());
    }

    #[test]
    fn optimal_plan_present_above_threshold_with_remembered_ops() {
        let engine = LearningEngine::new();
        let query = q("explain the authentication flow");
        for _ in 0..5 {
            engine.record_success("explain", &query, Duration::from_millis(10), true);
        }
        engine.remember_plan("explain", &query, vec!["git_status".to_string()], vec![]);
        assert!(engine.optimal_plan("explain", &query).is_some());
    }
}
