//! Default gate configuration compiled into the binary

use std::fs;
use std::path::{Path, PathBuf};

use rust_embed::Embed;

use crate::entities::Gate;
use crate::gates::error::CatalogError;

#[derive(Embed)]
#[folder = "defaults/gates/"]
struct EmbeddedGates;

/// Access to the built-in gate files
pub struct DefaultGates;

impl DefaultGates {
    /// File names of the built-in gates, sorted
    pub fn file_names() -> Vec<String> {
        let mut names: Vec<String> = EmbeddedGates::iter().map(|f| f.into_owned()).collect();
        names.sort();
        names
    }

    /// Raw YAML of one built-in gate file
    pub fn raw(file_name: &str) -> Option<String> {
        EmbeddedGates::get(file_name)
            .and_then(|file| String::from_utf8(file.data.into_owned()).ok())
    }

    /// Parse every built-in gate
    pub fn load() -> Result<Vec<Gate>, CatalogError> {
        let mut gates = Vec::new();
        for name in Self::file_names() {
            let content = Self::raw(&name).ok_or_else(|| CatalogError::Parse {
                path: PathBuf::from(&name),
                message: "embedded file is not valid UTF-8".to_string(),
            })?;
            let gate: Gate = serde_yml::from_str(&content).map_err(|e| CatalogError::Parse {
                path: PathBuf::from(&name),
                message: e.to_string(),
            })?;
            gates.push(gate);
        }
        Ok(gates)
    }

    /// Write the built-in gate files into `dir`, overwriting same-named files
    pub fn write_to(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        for name in Self::file_names() {
            if let Some(file) = EmbeddedGates::get(&name) {
                let path = dir.join(&name);
                fs::write(&path, file.data.as_ref())?;
                written.push(path);
            }
        }
        Ok(written)
    }
}
