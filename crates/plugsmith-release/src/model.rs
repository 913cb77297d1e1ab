//! Release manifest entries

use chrono::{DateTime, Utc};
use plugsmith_core::version;
use plugsmith_plugins::DependencyNode;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// How an entry changed relative to the previous release
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReleaseStatus {
    /// Carried over unchanged from the previous manifest
    #[default]
    Existing,
    /// Not present in the previous manifest
    New,
    /// Present before, but its image or descriptor changed
    Updated,
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Existing => write!(f, "existing"),
            Self::New => write!(f, "new"),
            Self::Updated => write!(f, "updated"),
        }
    }
}

/// One released `(name, version)` of a plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRelease {
    /// `owner/name`, without the registry
    pub name: String,

    /// Plugin version including the `v` prefix
    pub version: String,

    /// `sha256:<hex>` of the plugin archive
    pub zip_digest: String,

    /// `sha256:<hex>` of `buf.plugin.yaml`
    pub yaml_digest: String,

    /// Digest of the image config
    pub image_id: String,

    /// `ghcr.io/<org>/plugins-<owner>-<name>@sha256:<hex>`
    pub registry_image: String,

    /// Release the archive was first published in, e.g. `20221121.1`
    pub release_tag: String,

    /// Download URL of the archive
    pub url: String,

    #[serde(with = "timestamp")]
    pub last_updated: DateTime<Utc>,

    /// Direct dependency pins, sorted
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,

    #[serde(skip)]
    pub status: ReleaseStatus,
}

impl PluginRelease {
    /// `owner/name:version`
    pub fn key(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    /// Manifest order: by name, then by semver
    pub fn manifest_order(a: &Self, b: &Self) -> Ordering {
        a.name
            .cmp(&b.name)
            .then_with(|| version::compare(&a.version, &b.version))
    }
}

impl DependencyNode for PluginRelease {
    fn node_name(&self) -> &str {
        &self.name
    }

    fn node_version(&self) -> &str {
        &self.version
    }

    fn node_pins(&self) -> Vec<String> {
        self.dependencies.clone()
    }
}

/// The whole manifest document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginReleases {
    pub releases: Vec<PluginRelease>,
}

/// RFC 3339 timestamps in UTC, truncated to whole seconds
mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
