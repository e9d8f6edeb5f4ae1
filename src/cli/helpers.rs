//! Shared helper functions for CLI commands
//!
//! This module holds the engine setup every command needs (workspace,
//! configuration, gate catalog, state store) plus small formatting helpers.

use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::EntityId;
use crate::core::loader::{load_entity, yaml_files};
use crate::core::{Config, StateStore, Workspace};
use crate::entities::{ProjectAggregate, Stage};
use crate::gates::{CustomCheckRegistry, GateCatalog, StageGateOrchestrator};

/// Everything a command needs to evaluate gates in a workspace
pub struct Engine {
    pub workspace: Workspace,
    pub config: Config,
    pub checks: CustomCheckRegistry,
    pub catalog: GateCatalog,
    pub store: StateStore,
}

impl Engine {
    pub fn open(global: &GlobalOpts) -> Result<Self> {
        let workspace = open_workspace(global)?;
        let config = Config::load(Some(&workspace));
        let checks = CustomCheckRegistry::with_builtin_checks();
        let catalog = load_catalog(&workspace, &config, &checks)?;
        let store = StateStore::open(&workspace).into_diagnostic()?;

        Ok(Self {
            workspace,
            config,
            checks,
            catalog,
            store,
        })
    }

    pub fn orchestrator(&self) -> StageGateOrchestrator<'_> {
        StageGateOrchestrator::new(&self.catalog, &self.checks, &self.store)
    }

    /// Load a project aggregate by id (file stem in projects/) or by file path
    pub fn load_project(&self, id_or_path: &str) -> Result<ProjectAggregate> {
        let path = Path::new(id_or_path);
        if path.is_file() {
            let content = fs::read_to_string(path).into_diagnostic()?;
            return serde_yml::from_str(&content)
                .map_err(|e| miette::miette!("Failed to parse {}: {}", path.display(), e));
        }

        match load_entity::<ProjectAggregate>(&self.workspace.projects_dir(), id_or_path)? {
            Some((path, project)) => {
                debug!(path = %path.display(), project_id = %project.id, "loaded project");
                Ok(project)
            }
            None => Err(miette::miette!("Project not found: {}", id_or_path)),
        }
    }

    /// Explicit stage, or the project's recorded stage
    pub fn stage_or_current(&self, stage: Option<Stage>, project_id: &str) -> Result<Stage> {
        match stage {
            Some(stage) => Ok(stage),
            None => self
                .orchestrator()
                .current_stage(project_id)
                .into_diagnostic(),
        }
    }

    /// Output format with `auto` resolved against the configured default
    pub fn format(&self, global: &GlobalOpts) -> OutputFormat {
        global.format.or_config(self.config.default_format.as_deref())
    }
}

pub fn open_workspace(global: &GlobalOpts) -> Result<Workspace> {
    Workspace::open(global.project.as_deref()).map_err(|e| miette::miette!("{}", e))
}

/// Gate files from gates/, falling back to the built-in set when there are none
pub fn load_catalog(
    workspace: &Workspace,
    config: &Config,
    checks: &CustomCheckRegistry,
) -> Result<GateCatalog> {
    let dir = workspace.gates_dir();
    if !yaml_files(&dir).is_empty() {
        return GateCatalog::load_dir(&dir, checks).into_diagnostic();
    }

    if config.use_default_gates() {
        debug!("no gate files found, using built-in gates");
        GateCatalog::defaults(checks).into_diagnostic()
    } else {
        GateCatalog::from_gates(Vec::new(), checks).into_diagnostic()
    }
}

/// Print a value as YAML or JSON
pub fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
        }
        _ => {
            print!("{}", serde_yml::to_string(value).into_diagnostic()?);
        }
    }
    Ok(())
}

/// Format an EntityId for display, truncating if too long
///
/// IDs longer than 16 characters are truncated to 13 chars with "..." suffix.
pub fn format_short_id(id: &EntityId) -> String {
    let s = id.to_string();
    if s.len() > 16 {
        format!("{}...", &s[..13])
    } else {
        s
    }
}

/// Truncate a string to max_len characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::EntityPrefix;

    #[test]
    fn test_format_short_id() {
        let id = EntityId::new(EntityPrefix::Task);
        let formatted = format_short_id(&id);
        // TASK- plus a 26 char ULID, so it is truncated
        assert!(formatted.len() <= 16);
        assert!(formatted.starts_with("TASK-"));
        assert!(formatted.ends_with("..."));
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hi", 2), "hi");
        assert_eq!(truncate_str("Delivered & Closed ✓", 10), "Deliver...");
    }
}
