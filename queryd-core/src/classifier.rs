//! Intent Classifier (spec §4.6, C6): a strict three-tier decision tree
//! evaluated in a fixed order, never ambiguous (spec §8 invariant 1).
//!
//! Grounded on the regex-driven matching idiom used throughout the
//! teacher's config/pattern code (e.g. `vtcode-commons::at_pattern`):
//! patterns are compiled once, at construction, and reused per query.

use std::time::Duration;

use regex::Regex;

use crate::types::{ClassificationResult, ProcessingStrategy, Query, Tier};

struct PatternSet {
    name: &'static str,
    regexes: Vec<Regex>,
    substrings: Vec<&'static str>,
}

impl PatternSet {
    fn matches(&self, lowered: &str) -> bool {
        self.regexes.iter().any(|re| re.is_match(lowered))
            || self.substrings.iter().any(|s| lowered.contains(s))
    }
}

pub struct IntentClassifier {
    complex: Vec<PatternSet>,
    simple: Vec<PatternSet>,
    medium: Vec<PatternSet>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        Self {
            complex: complex_patterns(),
            simple: simple_patterns(),
            medium: medium_patterns(),
        }
    }

    /// Evaluate the decision tree in order: Complex, then Simple, then
    /// Medium, defaulting to Medium with confidence 0.5. Exactly one tier is
    /// returned and `confidence > 0`.
    pub fn classify(&self, query: &Query) -> ClassificationResult {
        let lowered = query.lowercase_text();

        if let Some(pattern) = self.complex.iter().find(|p| p.matches(&lowered)) {
            return self.build_complex(query, &lowered, pattern.name);
        }
        if let Some(pattern) = self.simple.iter().find(|p| p.matches(&lowered)) {
            return build_simple(pattern.name);
        }
        if let Some(pattern) = self.medium.iter().find(|p| p.matches(&lowered)) {
            return build_medium(pattern.name, 0.75);
        }

        build_medium("default", 0.5)
    }

    fn build_complex(&self, _query: &Query, lowered: &str, pattern_name: &'static str) -> ClassificationResult {
        let estimated_tokens = queryd_commons::estimate_tokens(lowered) as f64;
        let mut cost = (estimated_tokens / 1000.0) * 0.01 + (500.0 / 1000.0) * 0.03;
        let mut latency = Duration::from_millis(1500);

        if lowered.contains("analyze") || lowered.contains("review") {
            cost += 0.0005;
            latency += Duration::from_millis(1000);
        }
        if lowered.contains("architecture") || lowered.contains("design") {
            latency += Duration::from_millis(500);
        }

        ClassificationResult {
            tier: Tier::Complex,
            confidence: 0.9,
            matched_patterns: vec![pattern_name.to_string()],
            estimated_cost: cost,
            estimated_latency: latency,
            required_operations: vec!["project_structure".to_string(), "relevant_files".to_string()],
            skip_llm: false,
            strategy: ProcessingStrategy {
                strategy_type: "llm_synthesis".to_string(),
                operations: vec!["project_structure".to_string(), "relevant_files".to_string()],
                use_vector: true,
                use_llm: true,
                cache_key: format!("t3:{pattern_name}"),
            },
            reasoning: format!("matched complex pattern `{pattern_name}`"),
        }
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Map the matched simple-tier pattern to the MCP operation Tier 1 should
/// look for evidence of (spec §8.4: `metadata.tools` must equal what
/// actually ran, so this can't be a constant).
fn simple_operation_for(pattern_name: &str) -> &'static str {
    match pattern_name {
        "single_word_status" => "system_info",
        "directory_ops" => "filesystem_tree",
        "direct_file_read" => "filesystem_read",
        _ => "filesystem_list",
    }
}

fn build_simple(pattern_name: &'static str) -> ClassificationResult {
    let operation = simple_operation_for(pattern_name);
    ClassificationResult {
        tier: Tier::Simple,
        confidence: 0.95,
        matched_patterns: vec![pattern_name.to_string()],
        estimated_cost: 0.0,
        estimated_latency: Duration::from_millis(50),
        required_operations: vec![operation.to_string()],
        skip_llm: true,
        strategy: ProcessingStrategy {
            strategy_type: "direct_mcp".to_string(),
            operations: vec![operation.to_string()],
            use_vector: false,
            use_llm: false,
            cache_key: format!("t1:{pattern_name}"),
        },
        reasoning: format!("matched simple pattern `{pattern_name}`"),
    }
}

fn build_medium(pattern_name: &'static str, confidence: f64) -> ClassificationResult {
    ClassificationResult {
        tier: Tier::Medium,
        confidence,
        matched_patterns: vec![pattern_name.to_string()],
        estimated_cost: 0.0005,
        estimated_latency: Duration::from_millis(800),
        required_operations: vec!["filesystem_search".to_string(), "vector_search".to_string()],
        skip_llm: true,
        strategy: ProcessingStrategy {
            strategy_type: "mcp_vector".to_string(),
            operations: vec!["filesystem_search".to_string(), "vector_search".to_string()],
            use_vector: true,
            use_llm: false,
            cache_key: format!("t2:{pattern_name}"),
        },
        reasoning: format!("matched medium pattern `{pattern_name}` (or fell through to the default tier)"),
    }
}

fn complex_patterns() -> Vec<PatternSet> {
    vec![
        PatternSet {
            name: "verb_explain_analyze",
            regexes: vec![],
            substrings: vec![
                "explain", "describe", "analyze", "review", "optimize", "refactor",
            ],
        },
        PatternSet {
            name: "verb_create_generate",
            regexes: vec![],
            substrings: vec!["create", "generate", "write", "implement", "build"],
        },
        PatternSet {
            name: "architecture_design",
            regexes: vec![],
            substrings: vec!["architecture", "design", "flow", "structure"],
        },
        PatternSet {
            name: "multi_step_marker",
            regexes: vec![],
            substrings: vec![" and ", " then ", " also "],
        },
    ]
}

fn simple_patterns() -> Vec<PatternSet> {
    vec![
        PatternSet {
            name: "imperative_prefix",
            regexes: vec![Regex::new(r"^(list|show|display|get|read|cat|open|ls) ").unwrap()],
            substrings: vec![],
        },
        PatternSet {
            name: "directory_ops",
            regexes: vec![Regex::new(r"\bdirector(y|ies)\b").unwrap()],
            substrings: vec![],
        },
        PatternSet {
            name: "single_word_status",
            regexes: vec![Regex::new(r"^(memory|status|cpu)$").unwrap()],
            substrings: vec![],
        },
        PatternSet {
            name: "direct_file_read",
            regexes: vec![Regex::new(r"\.\w{1,6}\b").unwrap()],
            substrings: vec![],
        },
    ]
}

fn medium_patterns() -> Vec<PatternSet> {
    vec![
        PatternSet {
            name: "search_prefix",
            regexes: vec![Regex::new(r"^(find|search|locate|where is) ").unwrap()],
            substrings: vec![],
        },
        PatternSet {
            name: "show_all",
            regexes: vec![],
            substrings: vec!["show all", "all functions", "all methods", "all structs"],
        },
        PatternSet {
            name: "count_query",
            regexes: vec![Regex::new(r"\bhow many\b|\bcount\b|\bnumber of\b").unwrap()],
            substrings: vec![],
        },
        PatternSet {
            name: "containing_that",
            regexes: vec![],
            substrings: vec!["functions that", "files containing"],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn q(text: &str) -> Query {
        Query::new("q1", text, PathBuf::from("/proj"))
    }

    #[test]
    fn list_files_is_simple_and_free() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify(&q("list files"));
        assert_eq!(result.tier, Tier::Simple);
        assert_eq!(result.estimated_cost, 0.0);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn find_authentication_code_is_medium() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify(&q("find authentication code"));
        assert_eq!(result.tier, Tier::Medium);
        assert!(result.estimated_cost <= 0.001);
    }

    #[test]
    fn explain_flow_is_complex() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify(&q("explain the flow of this application"));
        assert_eq!(result.tier, Tier::Complex);
        assert!(result.estimated_cost > 0.0);
    }

    #[test]
    fn multi_step_marker_forces_complex() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify(&q("create a REST handler and add tests"));
        assert_eq!(result.tier, Tier::Complex);
        assert!(result.estimated_cost > 0.0);
    }

    #[test]
    fn unmatched_query_defaults_to_medium_with_half_confidence() {
        let classifier = IntentClassifier::new();
        let result = classifier.classify(&q("rm -rf /"));
        assert_eq!(result.tier, Tier::Medium);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn simple_tier_operation_matches_the_pattern_that_fired() {
        let classifier = IntentClassifier::new();

        let status = classifier.classify(&q("memory"));
        assert_eq!(status.required_operations, vec!["system_info".to_string()]);

        let file_read = classifier.classify(&q("check main.rs"));
        assert_eq!(file_read.required_operations, vec!["filesystem_read".to_string()]);

        let listing = classifier.classify(&q("list files"));
        assert_eq!(listing.required_operations, vec!["filesystem_list".to_string()]);
    }

    #[test]
    fn every_classification_has_nonzero_confidence() {
        let classifier = IntentClassifier::new();
        for text in ["", "list files", "find x", "explain y", "zzz"] {
            let result = classifier.classify(&q(text));
            assert!(result.confidence > 0.0, "failed for {text:?}");
        }
    }
}
