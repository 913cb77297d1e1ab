//! Plugin descriptor model
//!
//! A plugin lives in `<root>/<owner>/<name>/<version>/buf.plugin.yaml`. The
//! descriptor's `name` is fully qualified (`registry/owner/name`) and its
//! `plugin_version` must match the directory that holds it.

use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::utils::relative_slash_path;
use plugsmith_core::version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Descriptor file name
pub const PLUGIN_FILE: &str = "buf.plugin.yaml";

/// File listing container-image exclusions, required beside every descriptor
pub const DOCKERIGNORE_FILE: &str = ".dockerignore";

/// Parsed `buf.plugin.yaml`
///
/// Unknown top-level keys are tolerated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Fully qualified name, `registry/owner/name`
    pub name: String,

    pub plugin_version: String,

    /// Descriptor schema version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spdx_license_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration_guide_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_languages: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deps: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_opts: Vec<String>,

    /// Registry-specific packaging settings, carried opaquely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<serde_yaml_ng::Value>,
}

/// A dependency one plugin has on another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Exact pin, `registry/owner/name:version`
    pub plugin: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub revision: u32,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl PluginConfig {
    /// Parse and validate descriptor bytes; `path` is used for error context
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        let config: PluginConfig = serde_yaml_ng::from_slice(bytes)
            .map_err(|e| Error::malformed_manifest(path, e.to_string()))?;

        if config.name.trim().is_empty() {
            return Err(Error::malformed_manifest(path, "missing name"));
        }
        if config.plugin_version.trim().is_empty() {
            return Err(Error::malformed_manifest(path, "missing plugin_version"));
        }
        if !version::is_valid(&config.plugin_version) {
            return Err(Error::invalid_version(&config.plugin_version));
        }
        PluginIdentity::parse(&config.name).map_err(|msg| Error::malformed_manifest(path, msg))?;
        for dep in &config.deps {
            if !dep.plugin.contains(':') {
                return Err(Error::malformed_manifest(
                    path,
                    format!("invalid plugin dependency: {}", dep.plugin),
                ));
            }
        }
        Ok(config)
    }
}

/// Plugin identity parsed from the fully qualified name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginIdentity {
    pub registry: String,
    pub owner: String,
    pub plugin: String,
}

impl PluginIdentity {
    fn parse(name: &str) -> std::result::Result<Self, String> {
        let parts: Vec<&str> = name.split('/').collect();
        match parts.as_slice() {
            [registry, owner, plugin]
                if !registry.is_empty() && !owner.is_empty() && !plugin.is_empty() =>
            {
                Ok(Self {
                    registry: registry.to_string(),
                    owner: owner.to_string(),
                    plugin: plugin.to_string(),
                })
            }
            _ => Err(format!(
                "plugin name {:?} must have the form registry/owner/name",
                name
            )),
        }
    }

    /// `owner/name`, the registry-independent form
    pub fn short_name(&self) -> String {
        format!("{}/{}", self.owner, self.plugin)
    }
}

impl fmt::Display for PluginIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.registry, self.owner, self.plugin)
    }
}

/// A plugin descriptor together with where it was found
#[derive(Debug, Clone, PartialEq)]
pub struct Plugin {
    pub config: PluginConfig,
    /// Absolute path of the descriptor
    pub path: PathBuf,
    /// Descriptor path relative to the walk root, with forward slashes
    pub relpath: String,
    pub identity: PluginIdentity,
}

impl Plugin {
    /// Load the descriptor at `path`, computing its path relative to `basedir`
    pub fn load(path: &Path, basedir: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_path(path)?;
        let config = PluginConfig::parse(&bytes, path)?;

        let dir = path
            .parent()
            .ok_or_else(|| Error::malformed_manifest(path, "descriptor has no parent directory"))?;
        let dir_name = dir.file_name().map(|n| n.to_string_lossy().into_owned());
        if dir_name.as_deref() != Some(config.plugin_version.as_str()) {
            return Err(Error::malformed_manifest(
                path,
                format!(
                    "plugin_version {} does not match directory {}",
                    config.plugin_version,
                    dir_name.unwrap_or_default()
                ),
            ));
        }
        if !dir.join(DOCKERIGNORE_FILE).is_file() {
            return Err(Error::malformed_manifest(
                path,
                format!("missing {} next to descriptor", DOCKERIGNORE_FILE),
            ));
        }

        let relpath = relative_slash_path(basedir, path)
            .ok_or_else(|| Error::malformed_manifest(path, "descriptor is outside the walk root"))?;
        let identity =
            PluginIdentity::parse(&config.name).map_err(|msg| Error::malformed_manifest(path, msg))?;

        Ok(Self {
            config,
            path: path.to_path_buf(),
            relpath,
            identity,
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn version(&self) -> &str {
        &self.config.plugin_version
    }

    /// Directory containing the descriptor
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    /// Sorted dependency pins; a nonzero revision is rejected
    pub fn dependency_pins(&self) -> Result<Vec<String>> {
        let mut pins = Vec::with_capacity(self.config.deps.len());
        for dep in &self.config.deps {
            if dep.revision != 0 {
                return Err(Error::unsupported_revision(self.to_string(), dep.revision));
            }
            pins.push(dep.plugin.clone());
        }
        pins.sort();
        Ok(pins)
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.identity, self.config.plugin_version)
    }
}
