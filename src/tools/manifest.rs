//! Tool directory scanning.
//!
//! A tool directory holds manifests either as `<name>/manifest.json` or as
//! top-level `<name>.json` files. Each manifest contributes one
//! [`CommandTool`] per entry.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{HostError, Result};

use super::command::CommandTool;
use super::registry::ToolRegistry;
use super::types::ToolManifest;

/// Manifest files under `dir`, sorted. A missing directory is an error.
pub fn discover_manifests(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(HostError::Config(format!(
            "Tool directory not found: {}",
            dir.display()
        )));
    }

    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut found = Vec::new();
    for pattern in [format!("{}/*/manifest.json", base), format!("{}/*.json", base)] {
        let paths = glob::glob(&pattern)
            .map_err(|e| HostError::Config(format!("Invalid tool glob '{}': {}", pattern, e)))?;
        for entry in paths {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Unreadable entry in tool directory"),
            }
        }
    }
    found.sort();
    found.dedup();
    Ok(found)
}

/// Parse one manifest file.
pub fn load_manifest(path: &Path) -> Result<ToolManifest> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| HostError::Config(format!("Invalid tool manifest {}: {}", path.display(), e)))
}

/// Register every valid tool found under `dir`. Returns how many were added.
///
/// Broken manifests and invalid tool names are skipped with a warning.
pub fn register_directory(registry: &mut ToolRegistry, dir: &Path) -> Result<usize> {
    let mut added = 0;
    for path in discover_manifests(dir)? {
        let manifest = match load_manifest(&path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping tool manifest");
                continue;
            }
        };
        let base_dir = path.parent().map(Path::to_path_buf);
        for def in manifest.tools {
            if !def.has_valid_name() {
                warn!(manifest = %manifest.name, tool = %def.name, "Skipping tool with invalid name");
                continue;
            }
            let mut tool = CommandTool::new(def, &manifest.name);
            if let Some(dir) = &base_dir {
                tool = tool.with_base_dir(dir.clone());
            }
            registry.register(Box::new(tool));
            added += 1;
        }
        debug!(manifest = %manifest.name, path = %path.display(), "Loaded tool manifest");
    }
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, body).unwrap();
    }

    #[test]
    fn test_discover_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("git/manifest.json"), "{}");
        write(&dir.path().join("sys.json"), "{}");
        write(&dir.path().join("notes.txt"), "ignored");
        write(&dir.path().join("deep/nested/manifest.json"), "{}");

        let found = discover_manifests(dir.path()).unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["git/manifest.json", "sys.json"]);
    }

    #[test]
    fn test_discover_missing_dir() {
        assert!(discover_manifests(Path::new("/nonexistent/mcphost-tools")).is_err());
    }

    #[test]
    fn test_register_directory_skips_bad_entries() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("good/manifest.json"),
            r#"{"name":"good","tools":[
                {"name":"hello","description":"Say hello","command":"echo hello"},
                {"name":"bad name","description":"x","command":"true"}
            ]}"#,
        );
        write(&dir.path().join("broken.json"), "{ nope");

        let mut registry = ToolRegistry::new();
        let added = register_directory(&mut registry, dir.path()).unwrap();
        assert_eq!(added, 1);
        assert_eq!(registry.names(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_registered_tool_runs_in_manifest_dir() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("files/data.txt"), "from manifest dir");
        write(
            &dir.path().join("files/manifest.json"),
            r#"{"name":"files","tools":[
                {"name":"cat_data","description":"Read data","command":"cat data.txt"}
            ]}"#,
        );

        let mut registry = ToolRegistry::new();
        register_directory(&mut registry, dir.path()).unwrap();
        let out = registry
            .execute("cat_data", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out, "from manifest dir");
    }
}
