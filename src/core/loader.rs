//! YAML record loading utilities
//!
//! Generic helpers for reading project aggregates (and any other
//! `DeserializeOwned` record) out of a workspace directory.

use miette::{IntoDiagnostic, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .map_or(false, |e| e == "yaml" || e == "yml")
}

/// List the YAML files directly inside a directory, sorted by file name
pub fn yaml_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| is_yaml(p))
        .collect();
    files.sort();
    files
}

/// Find a record file by ID (file stem equal to or starting with the ID)
pub fn find_entity_file(dir: &Path, id: &str) -> Option<PathBuf> {
    let files = yaml_files(dir);

    let stem = |p: &PathBuf| {
        p.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string()
    };

    files
        .iter()
        .find(|p| stem(p) == id)
        .or_else(|| files.iter().find(|p| stem(p).starts_with(id)))
        .cloned()
}

/// Load a single record by ID
///
/// Returns the path and record if found.
pub fn load_entity<T: DeserializeOwned + 'static>(dir: &Path, id: &str) -> Result<Option<(PathBuf, T)>> {
    if let Some(path) = find_entity_file(dir, id) {
        let content = fs::read_to_string(&path).into_diagnostic()?;
        let record: T = serde_yml::from_str(&content).into_diagnostic()?;
        return Ok(Some((path, record)));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_yaml_files_empty_dir() {
        let dir = tempdir().unwrap();
        assert!(yaml_files(dir.path()).is_empty());
    }

    #[test]
    fn test_yaml_files_nonexistent_dir() {
        assert!(yaml_files(Path::new("/nonexistent/path")).is_empty());
    }

    #[test]
    fn test_yaml_files_sorted_and_filtered() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.yml"), "id: two").unwrap();
        fs::write(dir.path().join("a.yaml"), "id: one").unwrap();
        fs::write(dir.path().join("notes.txt"), "id: ignored").unwrap();

        let files = yaml_files(dir.path());
        assert_eq!(files, vec![dir.path().join("a.yaml"), dir.path().join("b.yml")]);
    }

    #[test]
    fn test_load_entity_parses_record() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("P-1.yaml"), "id: P-1").unwrap();

        let (path, record): (PathBuf, serde_json::Value) =
            load_entity(dir.path(), "P-1").unwrap().unwrap();
        assert_eq!(path, dir.path().join("P-1.yaml"));
        assert_eq!(record["id"], "P-1");
    }

    #[test]
    fn test_find_entity_file_prefers_exact_match() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("TCS-2024-0010.yaml"), "id: TCS-2024-0010").unwrap();
        fs::write(dir.path().join("TCS-2024-001.yaml"), "id: TCS-2024-001").unwrap();

        let found = find_entity_file(dir.path(), "TCS-2024-001").unwrap();
        assert_eq!(found, dir.path().join("TCS-2024-001.yaml"));
    }

    #[test]
    fn test_find_entity_file_nonexistent() {
        assert!(find_entity_file(Path::new("/nonexistent/path"), "TCS-1").is_none());
    }
}
