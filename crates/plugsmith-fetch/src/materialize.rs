//! New plugin version directories by copy-and-rewrite
//!
//! `<plugin_dir>/<new>/` is created from `<plugin_dir>/<previous>/`. Known
//! build files get version strings, base images and dependency pins
//! rewritten; everything else is copied byte for byte. Any failure removes
//! the partially written directory.

use crate::baseimage::{from_image_token, split_image_tag, BaseImages};
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::version;
use plugsmith_plugins::{normalize_name, PluginConfig, PLUGIN_FILE};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

const BAZEL_IMAGE: &str = "gcr.io/bazel-public/bazel";
const DOCKERFILE_IMAGE: &str = "docker/dockerfile";
const SYNTAX_PREFIX: &str = "# syntax=docker/dockerfile:";

static BAZEL_DOWNLOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"bazelbuild/bazel/releases/download/[^/]+/bazel-[^-]+-linux")
        .expect("bazel download pattern is valid")
});

/// Removes the directory on drop unless disarmed
struct DirGuard {
    path: PathBuf,
    armed: bool,
}

impl DirGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_dir_all(&self.path) {
                warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// How a file is treated, chosen strictly by base name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Dockerfile,
    VersionText,
    Descriptor,
    Opaque,
}

fn file_kind(name: &str) -> FileKind {
    match name {
        "Dockerfile" | "Dockerfile.wasm" => FileKind::Dockerfile,
        "build.csproj" | "package.json" | "requirements.txt" => FileKind::VersionText,
        PLUGIN_FILE => FileKind::Descriptor,
        _ => FileKind::Opaque,
    }
}

/// Creates new version directories from previous ones
pub struct Materializer<'a> {
    images: &'a BaseImages,
    /// Latest known version per plugin, keyed without the registry segment
    latest_versions: HashMap<String, String>,
}

impl<'a> Materializer<'a> {
    /// `latest_versions` maps plugin names (with or without registry) to their latest version
    pub fn new(images: &'a BaseImages, latest_versions: &HashMap<String, String>) -> Self {
        Self {
            images,
            latest_versions: latest_versions
                .iter()
                .map(|(name, ver)| (normalize_name(name).to_string(), ver.clone()))
                .collect(),
        }
    }

    /// Record a newer latest version so later descriptors pin to it
    pub fn record_latest(&mut self, name: &str, version: &str) {
        self.latest_versions
            .insert(normalize_name(name).to_string(), version.to_string());
    }

    /// Create `<plugin_dir>/<new>` from `<plugin_dir>/<previous>`
    pub fn create_version(&self, plugin_dir: &Path, previous: &str, new: &str) -> Result<PathBuf> {
        let source = plugin_dir.join(previous);
        let target = plugin_dir.join(new);
        if target.exists() {
            return Err(Error::already_exists(&target));
        }
        fs::create_dir(&target).map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::already_exists(&target),
            _ => Error::io(&target, e),
        })?;
        let guard = DirGuard::new(target.clone());

        let mut entries: Vec<fs::DirEntry> = fs::read_dir(&source)
            .with_path(&source)?
            .collect::<std::io::Result<_>>()
            .with_path(&source)?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let from = entry.path();
            if entry.file_type().with_path(&from)?.is_dir() {
                return Err(Error::NestedDirectory { path: from });
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let to = target.join(&name);
            self.copy_file(&from, &to, file_kind(&name), previous, new)?;
        }

        debug!("Materialized {}", target.display());
        Ok(guard.disarm())
    }

    fn copy_file(&self, from: &Path, to: &Path, kind: FileKind, previous: &str, new: &str) -> Result<()> {
        let rewritten = match kind {
            FileKind::Opaque => {
                fs::copy(from, to).with_path(from)?;
                return Ok(());
            }
            FileKind::Dockerfile => {
                let text = fs::read_to_string(from).with_path(from)?;
                self.rewrite_dockerfile(&text, previous, new)
            }
            FileKind::VersionText => {
                let text = fs::read_to_string(from).with_path(from)?;
                replace_versions(&text, previous, new)
            }
            FileKind::Descriptor => {
                let text = fs::read_to_string(from).with_path(from)?;
                self.rewrite_descriptor(&text, to, previous, new)?
            }
        };

        fs::write(to, rewritten).with_path(to)?;
        let permissions = fs::metadata(from).with_path(from)?.permissions();
        fs::set_permissions(to, permissions).with_path(to)?;
        Ok(())
    }

    /// Rewrite versions, base images, the syntax directive and bazel downloads
    pub fn rewrite_dockerfile(&self, text: &str, previous: &str, new: &str) -> String {
        let prev_digits = version::digits(previous);
        let new_digits = version::digits(new);
        let bazel = self
            .images
            .image_version(BAZEL_IMAGE)
            .map(|v| format!("bazelbuild/bazel/releases/download/{0}/bazel-{0}-linux", v));
        let syntax = self.images.image_version(DOCKERFILE_IMAGE);

        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            let mut line = replace_digits(line, prev_digits, new_digits);

            if let Some(replacement) = &bazel {
                line = BAZEL_DOWNLOAD
                    .replace_all(&line, replacement.as_str())
                    .into_owned();
            }

            if line.starts_with(SYNTAX_PREFIX) {
                if let Some(tag) = syntax {
                    line = format!("{}{}", SYNTAX_PREFIX, tag);
                }
            } else if let Some(Some((offset, image))) = from_image_token(&line) {
                let (name, _) = split_image_tag(image);
                let latest = self.images.image_name_and_version(name);
                if !latest.is_empty() {
                    let end = offset + image.len();
                    line = format!("{}{}{}", &line[..offset], latest, &line[end..]);
                }
            }

            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// Repin dependencies to their latest versions and replace version text
    ///
    /// Pins are rewritten on the `plugin:` lines only, so key order and
    /// comments survive. Version text is replaced on every other line. The
    /// result must still parse and carry `new` as its `plugin_version`.
    pub fn rewrite_descriptor(&self, text: &str, path: &Path, previous: &str, new: &str) -> Result<String> {
        let config = PluginConfig::parse(text.as_bytes(), path)?;

        let mut repins: Vec<(String, String)> = Vec::new();
        for dep in &config.deps {
            let Some((name, pinned)) = dep.plugin.split_once(':') else {
                continue;
            };
            match self.latest_versions.get(normalize_name(name)) {
                Some(latest) if latest != pinned => {
                    debug!("Repinning {} to {}", dep.plugin, latest);
                    repins.push((dep.plugin.clone(), format!("{}:{}", name, latest)));
                }
                _ => {}
            }
        }

        let prev_digits = version::digits(previous);
        let new_digits = version::digits(new);
        let mut rewritten = String::with_capacity(text.len());
        for line in text.lines() {
            // Pins track their dependency's version, never this plugin's
            if plugin_value_start(line).is_some() {
                rewritten.push_str(&repin_line(line, &repins));
            } else {
                rewritten.push_str(&replace_digits(line, prev_digits, new_digits));
            }
            rewritten.push('\n');
        }

        let reparsed = PluginConfig::parse(rewritten.as_bytes(), path)?;
        if reparsed.plugin_version != new {
            return Err(Error::malformed_manifest(
                path,
                format!(
                    "plugin_version {} does not match new version {}",
                    reparsed.plugin_version, new
                ),
            ));
        }
        Ok(rewritten)
    }
}

fn replace_digits(line: &str, prev: &str, new: &str) -> String {
    if prev.is_empty() {
        line.to_string()
    } else {
        line.replace(prev, new)
    }
}

/// Replace the previous version's digits with the new ones on every line
fn replace_versions(text: &str, previous: &str, new: &str) -> String {
    let prev_digits = version::digits(previous);
    let new_digits = version::digits(new);
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        out.push_str(&replace_digits(line, prev_digits, new_digits));
        out.push('\n');
    }
    out
}

/// Offset just past `plugin:` when the line is a dependency pin
fn plugin_value_start(line: &str) -> Option<usize> {
    let idx = line.find("plugin:")?;
    line[..idx]
        .chars()
        .all(|c| c.is_whitespace() || c == '-')
        .then_some(idx + "plugin:".len())
}

/// Rewrite the value of a `plugin:` key when it equals one of the old pins
fn repin_line(line: &str, repins: &[(String, String)]) -> String {
    let Some(value_start) = plugin_value_start(line) else {
        return line.to_string();
    };
    let value = line[value_start..]
        .split(" #")
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    for (old, new) in repins {
        if value == old {
            return format!("{}{}", &line[..value_start], line[value_start..].replacen(old.as_str(), new, 1));
        }
    }
    line.to_string()
}
