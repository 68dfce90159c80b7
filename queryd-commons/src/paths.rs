//! Workspace path helpers shared by the command registry, the MCP executor,
//! and the filesystem change watcher.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

/// Identifies the root directory a query is scoped to. Implemented by the
/// CLI's concrete project/workspace type; the core pipeline only depends on
/// this trait so it can run against a fake root in tests.
pub trait WorkspacePaths: Send + Sync {
    fn workspace_root(&self) -> &Path;
}

/// A fixed workspace root, useful for tests and for the CLI's default case
/// of "the current directory is the project root".
#[derive(Debug, Clone)]
pub struct StaticWorkspacePaths {
    root: PathBuf,
}

impl StaticWorkspacePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl WorkspacePaths for StaticWorkspacePaths {
    fn workspace_root(&self) -> &Path {
        &self.root
    }
}

/// Canonicalize `candidate` and reject it if it resolves outside
/// `workspace`'s root. Falls back to the uncanonicalized paths when either
/// side doesn't exist yet, so this still rejects an obvious `..` escape
/// against a workspace root that hasn't been created.
pub fn ensure_within_workspace(workspace: &dyn WorkspacePaths, candidate: &Path) -> Result<PathBuf> {
    let root = std::fs::canonicalize(workspace.workspace_root())
        .unwrap_or_else(|_| workspace.workspace_root().to_path_buf());
    let resolved = std::fs::canonicalize(candidate).unwrap_or_else(|_| candidate.to_path_buf());

    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        bail!(
            "path '{}' escapes workspace root '{}'",
            resolved.display(),
            root.display()
        );
    }
}

/// Default basenames considered relevant to a project regardless of
/// extension (spec §4.5).
const RELEVANT_BASENAMES: &[&str] = &["go.mod", "go.sum", ".gitignore", "Dockerfile"];

/// Decide whether a changed path is relevant to cache invalidation: its
/// extension matches `primary_extension` (e.g. `"go"`) or its basename is
/// one of the fixed set of project marker files.
pub fn is_relevant_change(path: &Path, primary_extension: &str) -> bool {
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if ext.eq_ignore_ascii_case(primary_extension) {
            return true;
        }
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| RELEVANT_BASENAMES.iter().any(|marker| *marker == name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_primary_extension() {
        assert!(is_relevant_change(Path::new("src/main.go"), "go"));
        assert!(!is_relevant_change(Path::new("src/main.rs"), "go"));
    }

    #[test]
    fn matches_marker_basenames() {
        assert!(is_relevant_change(Path::new("go.mod"), "go"));
        assert!(is_relevant_change(Path::new("/proj/.gitignore"), "go"));
        assert!(!is_relevant_change(Path::new("README.md"), "go"));
    }

    #[test]
    fn ensure_within_workspace_accepts_the_root_itself() {
        let root = std::env::current_dir().unwrap();
        let workspace = StaticWorkspacePaths::new(root.clone());
        assert!(ensure_within_workspace(&workspace, &root).is_ok());
    }

    #[test]
    fn ensure_within_workspace_rejects_an_unrelated_directory() {
        let workspace = StaticWorkspacePaths::new(std::env::current_dir().unwrap());
        assert!(ensure_within_workspace(&workspace, Path::new("/")).is_err());
    }
}
