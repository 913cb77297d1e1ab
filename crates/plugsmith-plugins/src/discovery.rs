//! Plugin descriptor discovery

use crate::graph::sort_by_dependency_order;
use crate::manifest::{Plugin, PLUGIN_FILE};
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::version;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Directory names never descended into
const SKIPPED_DIRS: [&str; 2] = ["testdata", "vendor"];

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

pub(crate) fn absolute(root: &Path) -> Result<PathBuf> {
    std::path::absolute(root).with_path(root)
}

/// Load every descriptor under `root` in walk order
pub fn walk(root: &Path) -> Result<Vec<Plugin>> {
    let root = absolute(root)?;
    let mut plugins = Vec::new();

    for entry in WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.clone());
            Error::io(path, e.into())
        })?;
        if entry.file_type().is_file() && entry.file_name() == PLUGIN_FILE {
            let plugin = Plugin::load(entry.path(), &root)?;
            debug!("Found plugin {}", plugin);
            plugins.push(plugin);
        }
    }

    Ok(plugins)
}

/// Load every descriptor under `root`, sorted by name and version, then by dependency order
pub fn find_all(root: &Path) -> Result<Vec<Plugin>> {
    let mut plugins = walk(root)?;
    plugins.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| version::compare(a.version(), b.version()))
    });
    sort_by_dependency_order(plugins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, dir: &str, name: &str, version: &str) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(".dockerignore"), "*\n").unwrap();
        fs::write(
            dir.join(PLUGIN_FILE),
            format!("name: {}\nplugin_version: {}\n", name, version),
        )
        .unwrap();
    }

    #[test]
    fn test_skips_hidden_testdata_and_vendor() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "acme/foo/v1.0.0", "buf.build/acme/foo", "v1.0.0");
        write(tmp.path(), ".hidden/foo/v1.0.0", "buf.build/h/foo", "v1.0.0");
        write(tmp.path(), "testdata/foo/v1.0.0", "buf.build/t/foo", "v1.0.0");
        write(tmp.path(), "acme/vendor/x/v1.0.0", "buf.build/v/foo", "v1.0.0");

        let plugins = walk(tmp.path()).unwrap();
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].relpath, "acme/foo/v1.0.0/buf.plugin.yaml");
    }

    #[test]
    fn test_find_all_sorts_by_semver() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "acme/foo/v1.10.0", "buf.build/acme/foo", "v1.10.0");
        write(tmp.path(), "acme/foo/v1.9.0", "buf.build/acme/foo", "v1.9.0");
        write(tmp.path(), "acme/bar/v2.0.0", "buf.build/acme/bar", "v2.0.0");

        let plugins = find_all(tmp.path()).unwrap();
        let ids: Vec<String> = plugins.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            ids,
            vec![
                "buf.build/acme/bar:v2.0.0",
                "buf.build/acme/foo:v1.9.0",
                "buf.build/acme/foo:v1.10.0",
            ]
        );
    }

    #[test]
    fn test_malformed_descriptor_aborts_walk() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("acme/foo/v1.0.0");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(PLUGIN_FILE), "name: [\n").unwrap();
        assert!(walk(tmp.path()).is_err());
    }
}
