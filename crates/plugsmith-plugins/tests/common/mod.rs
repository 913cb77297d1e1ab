//! Common test infrastructure for plugsmith-plugins
//!
//! Provides a builder that lays out a plugins tree on disk.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const REGISTRY: &str = "buf.build";

/// Fluent builder for a temporary plugins tree
pub struct PluginTree {
    dir: TempDir,
}

impl PluginTree {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Add `<owner>/<name>/<version>/` with a descriptor, `.dockerignore` and Dockerfile
    pub fn plugin(self, short: &str, version: &str, deps: &[&str]) -> Self {
        let dir = self.root().join(short).join(version);
        fs::create_dir_all(&dir).expect("create plugin dir");
        fs::write(dir.join(".dockerignore"), "*\n!Dockerfile\n").expect("write .dockerignore");
        fs::write(dir.join("Dockerfile"), "FROM scratch\n").expect("write Dockerfile");

        let mut yaml = format!(
            "version: v1\nname: {}/{}\nplugin_version: {}\n",
            REGISTRY, short, version
        );
        if !deps.is_empty() {
            yaml.push_str("deps:\n");
            for dep in deps {
                yaml.push_str(&format!("  - plugin: {}/{}\n", REGISTRY, dep));
            }
        }
        fs::write(dir.join("buf.plugin.yaml"), yaml).expect("write descriptor");
        self
    }

    /// Add an arbitrary file relative to the root
    pub fn file(self, relpath: &str, contents: &str) -> Self {
        let path = self.root().join(relpath);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, contents).expect("write file");
        self
    }

    pub fn path(&self, relpath: &str) -> PathBuf {
        self.root().join(relpath)
    }
}

/// `name:version` labels for assertions
pub fn ids(plugins: &[plugsmith_plugins::Plugin]) -> Vec<String> {
    plugins.iter().map(|p| p.to_string()).collect()
}
