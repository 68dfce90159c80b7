//! Per-query analytics capture for `validate start|report|search` (spec §6).
//! Writes JSON-Lines under `<workspace>/analytics/`, one file per UTC day.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use queryd_core::{Query, Response};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct QueryRecord {
    query_id: String,
    text: String,
    response_type: String,
    cost: f64,
    total_tokens: u32,
    duration_ms: u128,
    recorded_at: String,
}

pub fn analytics_dir(workspace: &Path) -> PathBuf {
    workspace.join("analytics")
}

pub fn ensure_analytics_dir(workspace: &Path) -> Result<PathBuf> {
    let dir = analytics_dir(workspace);
    std::fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    Ok(dir)
}

fn queries_file(workspace: &Path) -> PathBuf {
    analytics_dir(workspace).join(format!("queries_{}.jsonl", Utc::now().format("%Y-%m-%d")))
}

pub fn record_query(workspace: &Path, query: &Query, response: &Response, elapsed: Duration) -> Result<()> {
    ensure_analytics_dir(workspace)?;
    let record = QueryRecord {
        query_id: query.id.clone(),
        text: query.text.clone(),
        response_type: format!("{:?}", response.response_type),
        cost: response.cost,
        total_tokens: response.token_usage.total_tokens,
        duration_ms: elapsed.as_millis(),
        recorded_at: Utc::now().to_rfc3339(),
    };

    let mut line = serde_json::to_string(&record)?;
    line.push('\n');

    use std::io::Write;
    let path = queries_file(workspace);
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

fn read_today(workspace: &Path) -> Result<Vec<QueryRecord>> {
    let path = queries_file(workspace);
    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub total_queries: usize,
    pub total_cost: f64,
    pub error_count: usize,
    pub avg_duration_ms: f64,
}

pub fn build_report(workspace: &Path) -> Result<ValidationReport> {
    let records = read_today(workspace)?;
    let total_queries = records.len();
    let total_cost: f64 = records.iter().map(|r| r.cost).sum();
    let error_count = records.iter().filter(|r| r.response_type == "Error").count();
    let avg_duration_ms = if total_queries == 0 {
        0.0
    } else {
        records.iter().map(|r| r.duration_ms as f64).sum::<f64>() / total_queries as f64
    };

    let report = ValidationReport {
        total_queries,
        total_cost,
        error_count,
        avg_duration_ms,
    };

    let path = analytics_dir(workspace).join(format!("validation_report_{}.json", Utc::now().format("%Y-%m-%d")));
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(report)
}

pub fn search(workspace: &Path, term: &str) -> Result<Vec<String>> {
    let records = read_today(workspace)?;
    let needle = term.to_lowercase();
    Ok(records
        .into_iter()
        .filter(|r| r.text.to_lowercase().contains(&needle))
        .map(|r| format!("{} [{}] {:.4}", r.query_id, r.response_type, r.cost))
        .collect())
}
