//! Configuration management with layered hierarchy

use serde::Deserialize;
use std::path::PathBuf;

use crate::core::workspace::Workspace;

/// stagegate configuration with layered hierarchy
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name recorded on administrative lock operations
    pub actor: Option<String>,

    /// tracing filter directive used when STAGEGATE_LOG is unset
    pub log_filter: Option<String>,

    /// Default output format
    pub default_format: Option<String>,

    /// Fall back to the built-in gate set when the workspace has no gate files
    pub use_default_gates: Option<bool>,
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(workspace: Option<&Workspace>) -> Self {
        let mut config = Config::default();

        // 1. Built-in defaults (already in Default impl)

        // 2. Global user config (~/.config/stagegate/config.yaml)
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global) = Self::read_file(&global_path) {
                config.merge(global);
            }
        }

        // 3. Workspace config (.stagegate/config.yaml)
        if let Some(ws) = workspace {
            if let Some(local) = Self::read_file(&ws.marker_dir().join("config.yaml")) {
                config.merge(local);
            }
        }

        // 4. Environment variables
        if let Ok(actor) = std::env::var("STAGEGATE_ACTOR") {
            config.actor = Some(actor);
        }
        if let Ok(filter) = std::env::var("STAGEGATE_LOG") {
            config.log_filter = Some(filter);
        }

        config
    }

    fn read_file(path: &std::path::Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        let contents = std::fs::read_to_string(path).ok()?;
        let has_settings = contents
            .lines()
            .map(str::trim)
            .any(|l| !l.is_empty() && !l.starts_with('#'));
        if !has_settings {
            return None;
        }
        match serde_yml::from_str::<Config>(&contents) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config file");
                None
            }
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "stagegate")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        if other.actor.is_some() {
            self.actor = other.actor;
        }
        if other.log_filter.is_some() {
            self.log_filter = other.log_filter;
        }
        if other.default_format.is_some() {
            self.default_format = other.default_format;
        }
        if other.use_default_gates.is_some() {
            self.use_default_gates = other.use_default_gates;
        }
    }

    /// Get the actor name, falling back to the login name
    pub fn actor(&self) -> String {
        if let Some(ref actor) = self.actor {
            return actor.clone();
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string())
    }

    /// Filter directive for the log subscriber
    pub fn log_filter(&self) -> String {
        self.log_filter.clone().unwrap_or_else(|| "warn".to_string())
    }

    /// Whether the embedded default gates are used for an empty gates/ dir
    pub fn use_default_gates(&self) -> bool {
        self.use_default_gates.unwrap_or(true)
    }
}
