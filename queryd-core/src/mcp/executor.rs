//! Runs registered probes under a per-command timeout and normalizes their
//! output into a single [`EvidenceRecord`] (spec §4.2).
//!
//! Grounded on `vtcode-bash-runner::executor`/`runner`: commands are run as
//! an argument vector (`tokio::process::Command::new(binary).args(args)`),
//! never through a shell, matching spec §9's mandate against shell
//! interpolation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use queryd_commons::WorkspacePaths;
use serde_json::json;
use tokio::process::Command;

use crate::registry::{self, CommandRegistry};
use crate::types::{Category, CommandDefinition, EvidenceRecord, ExecutionHistoryEntry};

pub struct McpExecutor<'a> {
    registry: &'a CommandRegistry,
    per_command_timeout: Duration,
    workspace: Arc<dyn WorkspacePaths>,
    history: parking_lot::RwLock<Vec<ExecutionHistoryEntry>>,
}

impl<'a> McpExecutor<'a> {
    pub fn new(registry: &'a CommandRegistry, per_command_timeout: Duration, workspace: Arc<dyn WorkspacePaths>) -> Self {
        Self {
            registry,
            per_command_timeout,
            workspace,
            history: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn history(&self) -> Vec<ExecutionHistoryEntry> {
        self.history.read().clone()
    }

    /// Select the definitions whose triggers match the query text, validate
    /// them as a set, execute them under timeout, and assemble an evidence
    /// record. Never panics: a command failure degrades only that key.
    pub async fn analyze_and_execute(
        &self,
        query_id: &str,
        query_text: &str,
        working_dir: &Path,
    ) -> EvidenceRecord {
        let started = Instant::now();

        if let Err(err) = registry::validate_working_dir(self.workspace.as_ref(), working_dir) {
            let mut record = EvidenceRecord::default();
            record.success = false;
            record.duration = started.elapsed();
            record.errors.insert("workspace_guard".to_string(), err.to_string());
            self.record_history(query_id, &[], false, record.duration);
            return record;
        }

        let lowered = query_text.to_lowercase();
        let selected = self.select_definitions(&lowered);

        if let Some(offender) = selected.iter().find(|d| registry::validate(d).is_err()) {
            let mut record = EvidenceRecord::default();
            record.success = false;
            record.duration = started.elapsed();
            record
                .errors
                .insert(offender.name.clone(), "blocked by safety validator".to_string());
            self.record_history(query_id, &[], false, record.duration);
            return record;
        }

        let mut record = EvidenceRecord::default();
        let mut any_success = false;

        for command in &selected {
            record.operations.push(command.name.clone());
            match tokio::time::timeout(
                self.per_command_timeout,
                run_command(command, working_dir),
            )
            .await
            {
                Ok(Ok(output)) => {
                    any_success = true;
                    record
                        .data
                        .insert(command.name.clone(), normalize(command.category, &output));
                }
                Ok(Err(err)) => {
                    record.errors.insert(command.name.clone(), err.to_string());
                    record
                        .data
                        .insert(format!("{}_error", command.name), json!(err.to_string()));
                }
                Err(_elapsed) => {
                    let message = format!(
                        "timed out after {}ms",
                        self.per_command_timeout.as_millis()
                    );
                    record.errors.insert(command.name.clone(), message.clone());
                    record
                        .data
                        .insert(format!("{}_error", command.name), json!(message));
                }
            }
        }

        record.success = selected.is_empty() || any_success;
        record.duration = started.elapsed();

        let names: Vec<String> = selected.iter().map(|d| d.name.clone()).collect();
        self.record_history(query_id, &names, record.success, record.duration);
        record
    }

    fn select_definitions(&self, lowered_query: &str) -> Vec<&'a CommandDefinition> {
        let mut seen = HashSet::new();
        self.registry
            .list()
            .filter(|def| def.triggers.iter().any(|trigger| lowered_query.contains(trigger.as_str())))
            .filter(|def| seen.insert(def.name.clone()))
            .collect()
    }

    fn record_history(&self, query_id: &str, names: &[String], success: bool, duration: Duration) {
        self.history.write().push(ExecutionHistoryEntry {
            query_id: query_id.to_string(),
            command_names: names.to_vec(),
            success,
            duration,
            timestamp: SystemTime::now(),
        });
    }
}

struct RawOutput {
    stdout: String,
    #[allow(dead_code)]
    stderr: String,
}

async fn run_command(def: &CommandDefinition, working_dir: &Path) -> anyhow::Result<RawOutput> {
    let output = Command::new(&def.binary)
        .args(&def.args)
        .current_dir(working_dir)
        .kill_on_drop(true)
        .output()
        .await?;

    if !output.status.success() {
        anyhow::bail!(
            "`{}` exited with {:?}",
            def.binary,
            output.status.code()
        );
    }

    Ok(RawOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Canonical per-category output shape (spec §4.2 "Output normalization").
fn normalize(category: Category, output: &RawOutput) -> serde_json::Value {
    match category {
        Category::Filesystem => {
            let files: Vec<serde_json::Value> = output
                .stdout
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|line| {
                    let path = Path::new(line.trim());
                    json!({
                        "path": line.trim(),
                        "size": 0,
                        "ext": path.extension().and_then(|e| e.to_str()).unwrap_or(""),
                    })
                })
                .collect();
            json!({
                "files": files,
                "file_count": output.stdout.lines().filter(|l| !l.trim().is_empty()).count(),
                "preview": output.stdout.lines().take(5).collect::<Vec<_>>().join("\n"),
            })
        }
        Category::System | Category::Process | Category::Network | Category::Database => {
            json!({
                "info": output.stdout.trim(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            })
        }
        Category::Git => {
            json!({ "info": output.stdout.trim() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queryd_commons::StaticWorkspacePaths;

    fn registry() -> CommandRegistry {
        CommandRegistry::with_seed_catalog().unwrap()
    }

    fn workspace(root: &Path) -> Arc<dyn WorkspacePaths> {
        Arc::new(StaticWorkspacePaths::new(root.to_path_buf()))
    }

    #[tokio::test]
    async fn unmatched_query_produces_empty_successful_record() {
        let reg = registry();
        let dir = std::env::current_dir().unwrap();
        let executor = McpExecutor::new(&reg, Duration::from_secs(1), workspace(&dir));
        let record = executor.analyze_and_execute("q1", "tell me a joke", &dir).await;
        assert!(record.operations.is_empty());
        assert!(record.success);
    }

    #[tokio::test]
    async fn matched_query_executes_and_records_history() {
        let reg = registry();
        let dir = std::env::current_dir().unwrap();
        let executor = McpExecutor::new(&reg, Duration::from_secs(5), workspace(&dir));
        let record = executor.analyze_and_execute("q2", "git status please", &dir).await;
        assert!(record.operations.contains(&"git_status".to_string()));
        assert_eq!(executor.history().len(), 1);
    }

    #[tokio::test]
    async fn working_dir_outside_workspace_is_rejected_before_any_probe_runs() {
        let reg = registry();
        let dir = std::env::current_dir().unwrap();
        let executor = McpExecutor::new(&reg, Duration::from_secs(1), workspace(&dir));
        let record = executor.analyze_and_execute("q3", "git status", Path::new("/")).await;
        assert!(!record.success);
        assert!(record.errors.contains_key("workspace_guard"));
    }

    #[test]
    fn evidence_invariant_holds_after_normalization() {
        let output = RawOutput {
            stdout: "src/main.rs\nsrc/lib.rs\n".to_string(),
            stderr: String::new(),
        };
        let value = normalize(Category::Filesystem, &output);
        assert_eq!(value["file_count"], json!(2));
    }
}
