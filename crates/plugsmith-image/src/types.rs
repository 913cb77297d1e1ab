use serde::{Deserialize, Serialize};
use std::fmt;

/// Media types accepted when fetching a manifest by tag
pub const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.index.v1+json,\
application/vnd.docker.distribution.manifest.list.v2+json,\
application/vnd.oci.image.manifest.v1+json,\
application/vnd.docker.distribution.manifest.v2+json";

/// A published image resolved in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedImage {
    /// `<host>/<repository>@<manifest digest>`
    pub registry_image: String,
    /// Digest of the image config, stable across transports
    pub image_id: String,
}

impl fmt::Display for ResolvedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.registry_image, self.image_id)
    }
}

/// Image manifest or image index from an OCI registry
///
/// Both shapes decode into this struct; an index carries `manifests`,
/// an image manifest carries `config`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageManifest {
    #[serde(default)]
    pub schema_version: i32,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub config: Option<Descriptor>,
    #[serde(default)]
    pub layers: Vec<Descriptor>,
    #[serde(default)]
    pub manifests: Vec<IndexEntry>,
}

impl ImageManifest {
    pub fn is_index(&self) -> bool {
        !self.manifests.is_empty()
    }

    /// Entry of an index matching `os`/`architecture`
    pub fn platform_entry(&self, os: &str, architecture: &str) -> Option<&IndexEntry> {
        self.manifests.iter().find(|m| {
            m.platform
                .as_ref()
                .map(|p| p.os == os && p.architecture == architecture)
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
    pub digest: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(default)]
    pub media_type: String,
    pub digest: String,
    #[serde(default)]
    pub platform: Option<Platform>,
}

/// Platform information for multi-arch images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub architecture: String,
    #[serde(default)]
    pub variant: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_index_and_manifest() {
        let index: ImageManifest = serde_json::from_str(
            r#"{"schemaVersion":2,"mediaType":"application/vnd.oci.image.index.v1+json","manifests":[
                {"mediaType":"application/vnd.oci.image.manifest.v1+json","digest":"sha256:arm","platform":{"os":"linux","architecture":"arm64"}},
                {"mediaType":"application/vnd.oci.image.manifest.v1+json","digest":"sha256:amd","platform":{"os":"linux","architecture":"amd64"}}
            ]}"#,
        )
        .unwrap();
        assert!(index.is_index());
        assert_eq!(index.platform_entry("linux", "amd64").unwrap().digest, "sha256:amd");
        assert!(index.platform_entry("windows", "amd64").is_none());

        let manifest: ImageManifest = serde_json::from_str(
            r#"{"schemaVersion":2,"config":{"mediaType":"application/vnd.oci.image.config.v1+json","size":10,"digest":"sha256:cfg"},"layers":[]}"#,
        )
        .unwrap();
        assert!(!manifest.is_index());
        assert_eq!(manifest.config.unwrap().digest, "sha256:cfg");
    }
}
