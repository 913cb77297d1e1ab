//! Source descriptors (`source.yaml`)
//!
//! Each plugin directory (`<owner>/<name>/`) may carry a `source.yaml`
//! naming exactly one upstream origin. Decoding is strict: unknown keys
//! fail the load.

use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::version;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub const SOURCE_FILE: &str = "source.yaml";

const SKIPPED_DIRS: [&str; 3] = ["cmd", "internal", "tests"];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescriptor {
    source: RawSource,
    #[serde(default)]
    include_prerelease: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSource {
    #[serde(default)]
    disabled: bool,
    #[serde(default)]
    ignore_versions: Vec<String>,
    github: Option<GitHubCoords>,
    dart_flutter: Option<NamedCoords>,
    goproxy: Option<NamedCoords>,
    npm_registry: Option<NamedCoords>,
    maven: Option<MavenCoords>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GitHubCoords {
    owner: String,
    repository: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedCoords {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MavenCoords {
    group: String,
    name: String,
}

/// Upstream origin of a plugin's versions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Origin {
    GitHub { owner: String, repository: String },
    DartFlutter { name: String },
    GoProxy { name: String },
    NpmRegistry { name: String },
    Maven { group: String, name: String },
}

impl Origin {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::GitHub { .. } => "github",
            Self::DartFlutter { .. } => "dart_flutter",
            Self::GoProxy { .. } => "goproxy",
            Self::NpmRegistry { .. } => "npm_registry",
            Self::Maven { .. } => "maven",
        }
    }

    pub fn coordinates(&self) -> Vec<&str> {
        match self {
            Self::GitHub { owner, repository } => vec![owner.as_str(), repository.as_str()],
            Self::DartFlutter { name } | Self::GoProxy { name } | Self::NpmRegistry { name } => {
                vec![name.as_str()]
            }
            Self::Maven { group, name } => vec![group.as_str(), name.as_str()],
        }
    }

    /// Endpoints that only report a single latest version
    fn supports_ignore_versions(&self) -> bool {
        !matches!(self, Self::GoProxy { .. } | Self::NpmRegistry { .. })
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.coordinates().join("/"))
    }
}

/// A loaded `source.yaml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    pub path: PathBuf,
    pub disabled: bool,
    pub include_prerelease: bool,
    /// `v`-prefixed versions never to be offered
    pub ignore_versions: Vec<String>,
    pub origin: Origin,
}

impl SourceDescriptor {
    /// Parse descriptor bytes; `path` is kept for error context and plugin lookup
    pub fn parse(bytes: &[u8], path: &Path) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::malformed_source(path, "empty file"));
        }
        let raw: RawDescriptor = serde_yaml_ng::from_slice(bytes)
            .map_err(|e| Error::malformed_source(path, e.to_string()))?;
        let src = raw.source;

        let mut origins = Vec::new();
        if let Some(c) = src.github {
            origins.push(Origin::GitHub {
                owner: c.owner,
                repository: c.repository,
            });
        }
        if let Some(c) = src.dart_flutter {
            origins.push(Origin::DartFlutter { name: c.name });
        }
        if let Some(c) = src.goproxy {
            origins.push(Origin::GoProxy { name: c.name });
        }
        if let Some(c) = src.npm_registry {
            origins.push(Origin::NpmRegistry { name: c.name });
        }
        if let Some(c) = src.maven {
            origins.push(Origin::Maven {
                group: c.group,
                name: c.name,
            });
        }

        let origin = match origins.len() {
            1 => origins.remove(0),
            0 => return Err(Error::malformed_source(path, "no source configured")),
            n => {
                return Err(Error::malformed_source(
                    path,
                    format!("expected exactly one source, found {}", n),
                ))
            }
        };

        if !src.ignore_versions.is_empty() && !origin.supports_ignore_versions() {
            return Err(Error::malformed_source(
                path,
                format!("ignore_versions is not supported for {} sources", origin.kind()),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            disabled: src.disabled,
            include_prerelease: raw.include_prerelease,
            ignore_versions: src
                .ignore_versions
                .iter()
                .map(|v| version::ensure_prefix(v.trim()))
                .collect(),
            origin,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_path(path)?;
        Self::parse(&bytes, path)
    }

    /// Key shared by descriptors that resolve to the same upstream answer
    pub fn cache_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.origin.kind(),
            self.origin.coordinates().join("-"),
            self.include_prerelease
        )
    }

    /// Plugin directory governed by this descriptor (`<owner>/<name>`)
    pub fn plugin_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn is_ignored(&self, version: &str) -> bool {
        self.ignore_versions.iter().any(|v| v == version)
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

/// Load every `source.yaml` under `root`, sorted by path
pub fn gather(root: &Path) -> Result<Vec<SourceDescriptor>> {
    let mut descriptors = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            Error::io(path, e.into())
        })?;
        if entry.file_type().is_file() && entry.file_name() == SOURCE_FILE {
            descriptors.push(SourceDescriptor::load(entry.path())?);
        }
    }
    if descriptors.is_empty() {
        return Err(Error::SourceFileNotFound {
            path: root.to_path_buf(),
        });
    }
    descriptors.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(descriptors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> Result<SourceDescriptor> {
        SourceDescriptor::parse(yaml.as_bytes(), Path::new("acme/foo/source.yaml"))
    }

    #[test]
    fn test_parse_github() {
        let src = parse("source:\n  github:\n    owner: acme\n    repository: foo\n").unwrap();
        assert_eq!(
            src.origin,
            Origin::GitHub {
                owner: "acme".into(),
                repository: "foo".into()
            }
        );
        assert!(!src.disabled);
        assert_eq!(src.cache_key(), "github-acme-foo-false");
        assert_eq!(src.plugin_dir(), Path::new("acme/foo"));
    }

    #[test]
    fn test_parse_maven_with_flags() {
        let src = parse(
            "source:\n  disabled: true\n  ignore_versions: [\"1.2.0\", v1.3.0]\n  maven:\n    group: io.acme\n    name: foo\ninclude_prerelease: true\n",
        )
        .unwrap();
        assert!(src.disabled);
        assert!(src.include_prerelease);
        assert_eq!(src.ignore_versions, vec!["v1.2.0", "v1.3.0"]);
        assert!(src.is_ignored("v1.2.0"));
        assert_eq!(src.cache_key(), "maven-io.acme-foo-true");
    }

    #[test]
    fn test_unknown_fields_fail() {
        let err = parse("source:\n  goproxy:\n    name: x\n    extra: 1\n").unwrap_err();
        assert!(matches!(err, Error::MalformedSource { .. }));
        let err = parse("source:\n  goproxy:\n    name: x\nbogus: true\n").unwrap_err();
        assert!(matches!(err, Error::MalformedSource { .. }));
    }

    #[test]
    fn test_origin_count_is_exactly_one() {
        assert!(parse("source:\n  disabled: false\n").is_err());
        assert!(parse(
            "source:\n  goproxy:\n    name: x\n  npm_registry:\n    name: y\n"
        )
        .is_err());
        assert!(parse("   \n").is_err());
    }

    #[test]
    fn test_ignore_versions_rejected_for_single_version_endpoints() {
        let err = parse("source:\n  ignore_versions: [v1.0.0]\n  npm_registry:\n    name: x\n")
            .unwrap_err();
        assert!(err.to_string().contains("npm_registry"));
    }

    #[test]
    fn test_gather_skips_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let write = |rel: &str| {
            let path = tmp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "source:\n  goproxy:\n    name: example.com/x\n").unwrap();
        };
        write("zeta/foo/source.yaml");
        write("acme/foo/source.yaml");
        write("tests/foo/source.yaml");
        write("internal/foo/source.yaml");
        write(".hidden/foo/source.yaml");

        let found = gather(tmp.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].path.ends_with("acme/foo/source.yaml"));
        assert!(found[1].path.ends_with("zeta/foo/source.yaml"));
    }

    #[test]
    fn test_gather_empty_root() {
        let tmp = TempDir::new().unwrap();
        let err = gather(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::SourceFileNotFound { .. }));
    }
}
