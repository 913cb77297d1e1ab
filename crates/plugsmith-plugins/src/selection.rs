//! Narrowing a plugin set for a CI job
//!
//! Two modes exist. An explicit allow-list (`PLUGINS`) names plugins by
//! short name, optionally with `:version` or `:latest`. Otherwise the
//! changed-files signal from CI (`ANY_MODIFIED`, `ALL_MODIFIED_FILES`) picks
//! the plugins whose directories were touched.

use crate::manifest::Plugin;
use plugsmith_core::error::{Error, Result};
use plugsmith_core::version;
use std::collections::HashMap;
use tracing::info;

/// One allow-list pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludePlugin {
    name: String,
    version: Option<String>,
}

const LATEST: &str = "latest";

impl IncludePlugin {
    /// Whether the plugin `name`/`version` matches, given the latest version of that name
    pub fn matches(&self, name: &str, version: &str, latest: Option<&str>) -> bool {
        if !name.ends_with(&format!("/{}", self.name)) {
            return false;
        }
        match self.version.as_deref() {
            None => true,
            Some(LATEST) => latest == Some(version),
            Some(wanted) => wanted == version,
        }
    }
}

/// Parse a whitespace- or comma-separated allow-list
pub fn parse_allow_list(input: &str) -> Result<Vec<IncludePlugin>> {
    let mut includes = Vec::new();
    for field in input.split(|c: char| c.is_whitespace() || c == ',') {
        let field = field.trim();
        if field.is_empty() {
            continue;
        }
        match field.split_once(':') {
            Some((name, ver)) => {
                if ver != LATEST && !version::is_valid(ver) {
                    return Err(Error::invalid_version(ver));
                }
                includes.push(IncludePlugin {
                    name: name.to_string(),
                    version: Some(ver.to_string()),
                });
            }
            None => includes.push(IncludePlugin {
                name: field.to_string(),
                version: None,
            }),
        }
    }
    Ok(includes)
}

/// Highest version per plugin name
pub fn latest_versions_by_name(plugins: &[Plugin]) -> HashMap<String, String> {
    let mut latest: HashMap<String, String> = HashMap::new();
    for plugin in plugins {
        let newer = latest
            .get(plugin.name())
            .map(|current| version::compare(current, plugin.version()).is_lt())
            .unwrap_or(true);
        if newer {
            latest.insert(plugin.name().to_string(), plugin.version().to_string());
        }
    }
    latest
}

/// Keep the plugins matching the allow-list; `all` keeps everything
pub fn filter_by_allow_list(plugins: &[Plugin], input: &str) -> Result<Vec<Plugin>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    if input.eq_ignore_ascii_case("all") {
        return Ok(plugins.to_vec());
    }

    let includes = parse_allow_list(input)?;
    let latest = latest_versions_by_name(plugins);
    let filtered = plugins
        .iter()
        .filter(|plugin| {
            let latest = latest.get(plugin.name()).map(String::as_str);
            includes
                .iter()
                .any(|inc| inc.matches(plugin.name(), plugin.version(), latest))
        })
        .inspect(|plugin| info!("Including plugin: {}", plugin.relpath))
        .cloned()
        .collect();
    Ok(filtered)
}

/// Changed-files signal from a CI provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    /// `None` when the provider did not report
    pub any_modified: Option<bool>,
    pub files: Vec<String>,
}

impl ChangedFiles {
    /// Build from raw environment values; unset or empty `any_modified` means absent
    pub fn from_env(any_modified: Option<&str>, files: Option<&str>) -> Result<Self> {
        let any_modified = match any_modified.map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_bool(raw).ok_or_else(|| {
                Error::invalid_config(format!("ANY_MODIFIED must be a boolean, got {:?}", raw))
            })?),
        };
        let files = files
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Ok(Self {
            any_modified,
            files,
        })
    }

    fn include_all(&self) -> bool {
        self.files.iter().any(|file| {
            file == "Makefile"
                || (file.starts_with("tests/")
                    && (file.ends_with(".go") || file.ends_with(".bin.gz")))
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Directory whose changes affect plugins beneath it
fn changed_dir(file: &str) -> Option<String> {
    let (mut dir, _) = file.rsplit_once('/')?;
    if let Some((parent, last)) = dir.rsplit_once('/') {
        if last == "base" || last == "base-build" {
            dir = parent;
        }
    }
    if dir.is_empty() || dir == "." {
        None
    } else {
        Some(dir.to_string())
    }
}

/// Keep the plugins affected by the changed files
pub fn filter_by_changed_files(plugins: &[Plugin], changed: &ChangedFiles) -> Vec<Plugin> {
    match changed.any_modified {
        None => return plugins.to_vec(),
        Some(false) => return Vec::new(),
        Some(true) => {}
    }
    if changed.include_all() {
        return plugins.to_vec();
    }

    plugins
        .iter()
        .filter(|plugin| {
            let testdata = format!("tests/testdata/{}/{}/", plugin.name(), plugin.version());
            changed.files.iter().any(|file| {
                if file.starts_with(&testdata) {
                    return true;
                }
                changed_dir(file)
                    .map(|dir| plugin.relpath.starts_with(&format!("{}/", dir)))
                    .unwrap_or(false)
            })
        })
        .inspect(|plugin| info!("Including plugin: {}", plugin.relpath))
        .cloned()
        .collect()
}

/// How the working set is chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    AllowList(String),
    ChangedFiles(ChangedFiles),
    All,
}

impl Selection {
    /// A non-empty allow-list wins, then the changed-files signal, then everything
    pub fn from_inputs(
        plugins: Option<&str>,
        any_modified: Option<&str>,
        modified_files: Option<&str>,
    ) -> Result<Self> {
        if let Some(list) = plugins.filter(|s| !s.trim().is_empty()) {
            return Ok(Self::AllowList(list.to_string()));
        }
        let changed = ChangedFiles::from_env(any_modified, modified_files)?;
        if changed.any_modified.is_some() {
            return Ok(Self::ChangedFiles(changed));
        }
        Ok(Self::All)
    }

    pub fn apply(&self, plugins: &[Plugin]) -> Result<Vec<Plugin>> {
        match self {
            Self::AllowList(list) => filter_by_allow_list(plugins, list),
            Self::ChangedFiles(changed) => Ok(filter_by_changed_files(plugins, changed)),
            Self::All => Ok(plugins.to_vec()),
        }
    }
}
