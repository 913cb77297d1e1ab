//! Loading and emitting `plugin-releases.json`

use crate::model::{PluginRelease, PluginReleases};
use crate::signing;
use minisign::PublicKey;
use plugsmith_core::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

pub const PLUGIN_RELEASES_FILE: &str = "plugin-releases.json";
pub const PLUGIN_RELEASES_SIGNATURE_FILE: &str = "plugin-releases.json.minisig";

/// Decode a published manifest, keeping its on-disk order
///
/// With a public key configured the signature is mandatory and must match
/// the exact bytes. A `(name, version)` listed twice fails the load.
pub fn load_releases(
    bytes: &[u8],
    signature: Option<&[u8]>,
    public_key: Option<&PublicKey>,
) -> Result<Vec<PluginRelease>> {
    if let Some(public_key) = public_key {
        let signature = signature.ok_or_else(|| {
            Error::signature_mismatch(
                PLUGIN_RELEASES_FILE,
                format!("{} is missing", PLUGIN_RELEASES_SIGNATURE_FILE),
            )
        })?;
        signing::verify(public_key, PLUGIN_RELEASES_FILE, bytes, signature)?;
    }

    let manifest: PluginReleases = serde_json::from_slice(bytes)
        .map_err(|e| Error::malformed_manifest(Path::new(PLUGIN_RELEASES_FILE), e.to_string()))?;
    index_releases(&manifest.releases)?;
    Ok(manifest.releases)
}

/// Index entries by `(name, version)`, rejecting duplicates
pub fn index_releases(releases: &[PluginRelease]) -> Result<HashMap<(String, String), &PluginRelease>> {
    let mut index = HashMap::with_capacity(releases.len());
    for release in releases {
        let key = (release.name.clone(), release.version.clone());
        if index.insert(key, release).is_some() {
            return Err(Error::DuplicateInReleases {
                name: release.name.clone(),
                version: release.version.clone(),
            });
        }
    }
    Ok(index)
}

/// Encode the manifest sorted by name and semver, two-space indented
pub fn encode_releases(releases: &[PluginRelease]) -> Result<Vec<u8>> {
    let mut sorted = releases.to_vec();
    sorted.sort_by(PluginRelease::manifest_order);
    for release in &mut sorted {
        release.dependencies.sort();
    }
    let mut bytes = serde_json::to_vec_pretty(&PluginReleases { releases: sorted })
        .map_err(|e| Error::malformed_manifest(Path::new(PLUGIN_RELEASES_FILE), e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}
