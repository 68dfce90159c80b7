//! Command Registry & Safety Validator (spec §4.1, C1).
//!
//! Grounded on `vtcode-bash-runner::policy::CommandPolicy`'s deny/allow
//! idiom: validation is a pure function of a [`CommandDefinition`], no I/O,
//! and the deny-list always wins over the allow-list.

use std::collections::HashMap;
use std::path::Path;

use queryd_commons::WorkspacePaths;

use crate::error::QueryDError;
use crate::types::{Category, CommandDefinition, SafetyLevel};

const DENY_LIST: &[&str] = &[
    "rm", "rmdir", "mv", "cp", "chmod", "chown", "sudo", "su", "kill", "killall",
];

const ALLOW_LIST: &[&str] = &[
    "find", "ls", "cat", "grep", "wc", "du", "ps", "git", "tree", "head", "tail", "pwd", "whoami",
];

/// Validate a command definition against the deny/allow policy. Pure; no I/O.
pub fn validate(def: &CommandDefinition) -> Result<(), QueryDError> {
    if def.safety == SafetyLevel::Restricted {
        return Err(QueryDError::CommandSafetyViolation {
            command: def.name.clone(),
            reason: "command is marked Restricted".to_string(),
        });
    }

    if DENY_LIST.contains(&def.binary.as_str()) {
        return Err(QueryDError::CommandSafetyViolation {
            command: def.binary.clone(),
            reason: "binary is blocked for safety".to_string(),
        });
    }

    if !ALLOW_LIST.contains(&def.binary.as_str()) {
        return Err(QueryDError::CommandSafetyViolation {
            command: def.binary.clone(),
            reason: "binary is not on the allow-list".to_string(),
        });
    }

    Ok(())
}

/// Scan raw query text for a deny-listed binary name used as a whole word
/// (spec §8 scenario 6: a raw query like `"rm -rf /"` must never reach the
/// shell, even indirectly through a probe trigger match).
pub fn contains_denied_command(query_text: &str) -> Option<&'static str> {
    query_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .find_map(|word| DENY_LIST.iter().find(|&&denied| denied.eq_ignore_ascii_case(word)).copied())
}

/// Reject a probe working directory that resolves outside the configured
/// workspace root. Grounded on `vtcode-bash-runner::policy::WorkspaceGuardPolicy`,
/// which performs the same canonicalize-and-`starts_with` check before a
/// bash tool call is allowed to run.
pub fn validate_working_dir(workspace: &dyn WorkspacePaths, working_dir: &Path) -> Result<(), QueryDError> {
    queryd_commons::ensure_within_workspace(workspace, working_dir)
        .map(|_| ())
        .map_err(|err| QueryDError::CommandSafetyViolation {
            command: "workspace_guard".to_string(),
            reason: err.to_string(),
        })
}

/// Declarative, read-only-after-startup catalog of registered probes.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    definitions: HashMap<String, CommandDefinition>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, rejecting it up front if it fails validation.
    pub fn register(&mut self, def: CommandDefinition) -> Result<(), QueryDError> {
        validate(&def)?;
        self.definitions.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&CommandDefinition> {
        self.definitions.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &CommandDefinition> {
        self.definitions.values()
    }

    pub fn list_by_category(&self, category: Category) -> impl Iterator<Item = &CommandDefinition> {
        self.definitions.values().filter(move |d| d.category == category)
    }

    /// Definitions whose trigger set contains the given lower-cased word.
    pub fn find_by_trigger(&self, word: &str) -> Vec<&CommandDefinition> {
        let word = word.to_lowercase();
        self.definitions
            .values()
            .filter(|d| d.triggers.iter().any(|t| t == &word))
            .collect()
    }

    /// The minimum seed catalog named in spec §4.1.
    pub fn with_seed_catalog() -> Result<Self, QueryDError> {
        let mut registry = Self::new();
        for def in seed_definitions() {
            registry.register(def)?;
        }
        Ok(registry)
    }
}

fn def(
    name: &str,
    binary: &str,
    args: &[&str],
    safety: SafetyLevel,
    category: Category,
    triggers: &[&str],
) -> CommandDefinition {
    CommandDefinition {
        name: name.to_string(),
        binary: binary.to_string(),
        args: args.iter().map(|s| s.to_string()).collect(),
        safety,
        category,
        triggers: triggers.iter().map(|s| s.to_lowercase()).collect(),
    }
}

fn seed_definitions() -> Vec<CommandDefinition> {
    vec![
        def(
            "list_files",
            "find",
            &[".", "-type", "f"],
            SafetyLevel::Safe,
            Category::Filesystem,
            &["list", "files", "ls"],
        ),
        def(
            "file_count",
            "find",
            &[".", "-type", "f", "-printf", "."],
            SafetyLevel::Safe,
            Category::Filesystem,
            &["count", "how many", "number"],
        ),
        def(
            "project_structure",
            "tree",
            &["-L", "3"],
            SafetyLevel::Safe,
            Category::Filesystem,
            &["structure", "tree", "layout", "architecture", "directory", "directories"],
        ),
        def(
            "memory_usage",
            "ps",
            &["-eo", "pid,comm,%mem"],
            SafetyLevel::Safe,
            Category::System,
            &["memory", "mem"],
        ),
        def(
            "disk_usage",
            "du",
            &["-sh", "."],
            SafetyLevel::Safe,
            Category::System,
            &["disk", "usage", "space"],
        ),
        def(
            "git_status",
            "git",
            &["status", "--short"],
            SafetyLevel::Safe,
            Category::Git,
            &["git", "status"],
        ),
        def(
            "git_log",
            "git",
            &["log", "--oneline", "-20"],
            SafetyLevel::Safe,
            Category::Git,
            &["git", "log", "history", "commits"],
        ),
        def(
            "running_processes",
            "ps",
            &["-ef"],
            SafetyLevel::Moderate,
            Category::Process,
            &["process", "processes", "running"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_list_wins_over_allow_list() {
        // `git` would otherwise be allowed; a deny-listed binary is always
        // rejected regardless of what else might be true about it.
        let d = def("rm_dangerous", "rm", &["-rf", "."], SafetyLevel::Safe, Category::Filesystem, &["rm"]);
        assert!(validate(&d).is_err());
    }

    #[test]
    fn restricted_level_is_always_rejected() {
        let d = def("whoami_probe", "whoami", &[], SafetyLevel::Restricted, Category::System, &["whoami"]);
        assert!(validate(&d).is_err());
    }

    #[test]
    fn binary_outside_allow_list_is_rejected() {
        let d = def("curl_probe", "curl", &["http://example.com"], SafetyLevel::Safe, Category::Network, &["fetch"]);
        assert!(validate(&d).is_err());
    }

    #[test]
    fn seed_catalog_registers_without_error() {
        let registry = CommandRegistry::with_seed_catalog().unwrap();
        assert!(registry.get("list_files").is_some());
        assert!(registry.get("git_status").is_some());
        assert_eq!(registry.list().count(), 8);
    }

    #[test]
    fn working_dir_inside_workspace_root_is_accepted() {
        let workspace = queryd_commons::StaticWorkspacePaths::new(std::env::current_dir().unwrap());
        assert!(validate_working_dir(&workspace, &std::env::current_dir().unwrap()).is_ok());
    }

    #[test]
    fn working_dir_outside_workspace_root_is_rejected() {
        let workspace = queryd_commons::StaticWorkspacePaths::new(std::env::current_dir().unwrap());
        assert!(validate_working_dir(&workspace, Path::new("/")).is_err());
    }

    #[test]
    fn contains_denied_command_catches_whole_word_matches() {
        assert_eq!(contains_denied_command("rm -rf /"), Some("rm"));
        assert_eq!(contains_denied_command("please sudo reboot"), Some("sudo"));
        assert_eq!(contains_denied_command("list files"), None);
        assert_eq!(contains_denied_command("please confirm the changes"), None);
    }

    #[test]
    fn find_by_trigger_is_case_insensitive() {
        let registry = CommandRegistry::with_seed_catalog().unwrap();
        let hits = registry.find_by_trigger("GIT");
        assert!(hits.iter().any(|d| d.name == "git_status"));
    }
}
