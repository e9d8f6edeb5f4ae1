//! Workspace discovery and structure
//!
//! A workspace is a directory holding a `.stagegate/` marker directory, the
//! gate configuration (`gates/*.yaml`) and the project aggregates
//! (`projects/*.yaml`) the engine evaluates.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::gates::defaults::DefaultGates;

/// Name of the marker directory at the workspace root
pub const MARKER_DIR: &str = ".stagegate";

/// Represents a stagegate workspace
#[derive(Debug)]
pub struct Workspace {
    /// Root directory of the workspace (parent of .stagegate/)
    root: PathBuf,
}

impl Workspace {
    /// Find workspace root by walking up from the current directory
    pub fn discover() -> Result<Self, WorkspaceError> {
        let current =
            std::env::current_dir().map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find workspace root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, WorkspaceError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        loop {
            if current.join(MARKER_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(WorkspaceError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Open the workspace at an explicit root, or discover one from the current directory
    pub fn open(root: Option<&Path>) -> Result<Self, WorkspaceError> {
        match root {
            Some(path) => Self::discover_from(path),
            None => Self::discover(),
        }
    }

    /// Create a new workspace at the given path, seeded with the default gates
    pub fn init(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(MARKER_DIR).exists() {
            return Err(WorkspaceError::AlreadyExists(root));
        }

        Self::init_force(&root)
    }

    /// Initialize even if .stagegate/ exists; default gate files are rewritten
    pub fn init_force(path: &Path) -> Result<Self, WorkspaceError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let workspace = Self { root };

        for dir in [workspace.marker_dir(), workspace.gates_dir(), workspace.projects_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| WorkspaceError::IoError(e.to_string()))?;
        }

        std::fs::write(workspace.marker_dir().join("config.yaml"), Self::default_config())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        DefaultGates::write_to(&workspace.gates_dir())
            .map_err(|e| WorkspaceError::IoError(e.to_string()))?;

        Ok(workspace)
    }

    fn default_config() -> &'static str {
        r#"# stagegate workspace configuration

# Name recorded on lock releases and relocks (default: $STAGEGATE_ACTOR or $USER)
# actor: ""

# tracing filter when STAGEGATE_LOG is not set (e.g. "stagegate=debug")
# log_filter: warn

# Default output format (auto, yaml, json)
# default_format: auto

# Fall back to the built-in gate set when gates/ is empty
# use_default_gates: true
"#
    }

    /// Get the workspace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .stagegate marker directory
    pub fn marker_dir(&self) -> PathBuf {
        self.root.join(MARKER_DIR)
    }

    /// Directory holding gate definitions
    pub fn gates_dir(&self) -> PathBuf {
        self.root.join("gates")
    }

    /// Directory holding project aggregates
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }

    /// Path of the SQLite state store
    pub fn state_db_path(&self) -> PathBuf {
        self.marker_dir().join("state.db")
    }
}

/// Errors that can occur during workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("not a stagegate workspace (searched from {searched_from:?}). Run 'stagegate init' to create one.")]
    NotFound { searched_from: PathBuf },

    #[error("stagegate workspace already exists at {0:?}")]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let ws = Workspace::init(tmp.path()).unwrap();

        assert!(ws.marker_dir().join("config.yaml").exists());
        assert!(ws.gates_dir().is_dir());
        assert!(ws.projects_dir().is_dir());
        assert!(ws.gates_dir().join("discovery_complete.yaml").exists());
        assert!(ws.gates_dir().join("qc_passed.yaml").exists());
    }

    #[test]
    fn test_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let err = Workspace::init(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::AlreadyExists(_)));
    }

    #[test]
    fn test_discover_from_nested_dir() {
        let tmp = tempdir().unwrap();
        Workspace::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("projects/archive/2024");
        std::fs::create_dir_all(&subdir).unwrap();

        let ws = Workspace::discover_from(&subdir).unwrap();
        assert_eq!(
            ws.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Workspace::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }
}
