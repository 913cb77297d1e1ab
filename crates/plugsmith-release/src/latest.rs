//! Latest non-community plugins plus everything they depend on

use crate::model::PluginRelease;
use plugsmith_core::error::{Error, Result};
use plugsmith_core::version;
use plugsmith_plugins::{normalize_name, sort_by_dependency_order};
use std::collections::{HashMap, HashSet};

/// Owners excluded from the latest set
const EXCLUDED_OWNERS: &[&str] = &["community"];

/// Deprecated plugins excluded from the latest set
const DEPRECATED: &[&str] = &[
    "bufbuild/connect-es",
    "bufbuild/connect-go",
    "bufbuild/connect-kotlin",
    "bufbuild/connect-query",
    "bufbuild/connect-swift",
    "bufbuild/connect-swift-mocks",
    "bufbuild/connect-web",
];

fn is_excluded(name: &str) -> Result<bool> {
    let (owner, _) = name
        .split_once('/')
        .ok_or_else(|| Error::malformed_manifest(name, "plugin name is not owner/name"))?;
    Ok(EXCLUDED_OWNERS.contains(&owner) || DEPRECATED.contains(&name))
}

/// `owner/name:version` of a dependency pin, without the registry
fn pin_key(pin: &str) -> String {
    match pin.split_once(':') {
        Some((name, version)) => format!("{}:{}", normalize_name(name), version),
        None => normalize_name(pin).to_string(),
    }
}

/// The latest release of every included plugin and the transitive closure of
/// their dependencies, in dependency order
///
/// Dependencies are kept even when their own name is excluded.
pub fn latest_plugins_and_dependencies(releases: &[PluginRelease]) -> Result<Vec<PluginRelease>> {
    let by_key: HashMap<String, &PluginRelease> =
        releases.iter().map(|r| (r.key(), r)).collect();

    let mut latest: HashMap<&str, &PluginRelease> = HashMap::new();
    for release in releases {
        if is_excluded(&release.name)? {
            continue;
        }
        latest
            .entry(release.name.as_str())
            .and_modify(|current| {
                if version::compare(&current.version, &release.version).is_lt() {
                    *current = release;
                }
            })
            .or_insert(release);
    }

    let mut included: HashSet<String> = HashSet::new();
    let mut pending: Vec<String> = latest.values().map(|r| r.key()).collect();
    while let Some(key) = pending.pop() {
        if !included.insert(key.clone()) {
            continue;
        }
        if let Some(release) = by_key.get(&key) {
            pending.extend(release.dependencies.iter().map(|d| pin_key(d)));
        }
    }

    let selected: Vec<PluginRelease> = releases
        .iter()
        .filter(|r| included.contains(&r.key()))
        .cloned()
        .collect();
    sort_by_dependency_order(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReleaseStatus;
    use chrono::Utc;

    fn release(name: &str, version: &str, deps: &[&str]) -> PluginRelease {
        PluginRelease {
            name: name.to_string(),
            version: version.to_string(),
            zip_digest: String::new(),
            yaml_digest: String::new(),
            image_id: String::new(),
            registry_image: String::new(),
            release_tag: "20240101.1".to_string(),
            url: String::new(),
            last_updated: Utc::now(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            status: ReleaseStatus::Existing,
        }
    }

    fn keys(releases: &[PluginRelease]) -> Vec<String> {
        releases.iter().map(PluginRelease::key).collect()
    }

    #[test]
    fn test_latest_with_transitive_dependencies() {
        let releases = vec![
            release("grpc/go", "v1.3.0", &["buf.build/protocolbuffers/go:v1.30.0"]),
            release("protocolbuffers/go", "v1.28.0", &[]),
            release("protocolbuffers/go", "v1.30.0", &[]),
            release("protocolbuffers/go", "v1.36.11", &[]),
            release("acme/base", "v1.0.0", &[]),
            release("acme/mid", "v1.0.0", &["buf.build/acme/base:v1.0.0"]),
            release("acme/top", "v2.0.0", &["buf.build/acme/mid:v1.0.0"]),
            release("acme/top", "v1.0.0", &[]),
        ];
        let result = latest_plugins_and_dependencies(&releases).unwrap();
        let keys = keys(&result);
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&"protocolbuffers/go:v1.30.0".to_string()));
        assert!(keys.contains(&"protocolbuffers/go:v1.36.11".to_string()));
        assert!(!keys.contains(&"protocolbuffers/go:v1.28.0".to_string()));
        assert!(!keys.contains(&"acme/top:v1.0.0".to_string()));

        let pos = |k: &str| keys.iter().position(|x| x == k).unwrap();
        assert!(pos("protocolbuffers/go:v1.30.0") < pos("grpc/go:v1.3.0"));
        assert!(pos("acme/base:v1.0.0") < pos("acme/mid:v1.0.0"));
        assert!(pos("acme/mid:v1.0.0") < pos("acme/top:v2.0.0"));
    }

    #[test]
    fn test_excludes_community_and_deprecated() {
        let releases = vec![
            release("community/foo", "v1.0.0", &[]),
            release("bufbuild/connect-go", "v1.0.0", &[]),
            release("bufbuild/es", "v1.0.0", &[]),
            release("connectrpc/go", "v1.0.0", &[]),
        ];
        let result = latest_plugins_and_dependencies(&releases).unwrap();
        assert_eq!(
            keys(&result),
            ["bufbuild/es:v1.0.0", "connectrpc/go:v1.0.0"]
        );
    }

    #[test]
    fn test_excluded_plugin_kept_as_dependency() {
        let releases = vec![
            release("community/base", "v1.0.0", &[]),
            release("acme/foo", "v1.0.0", &["buf.build/community/base:v1.0.0"]),
        ];
        let result = latest_plugins_and_dependencies(&releases).unwrap();
        assert_eq!(keys(&result), ["community/base:v1.0.0", "acme/foo:v1.0.0"]);
    }

    #[test]
    fn test_malformed_name() {
        let releases = vec![release("noslash", "v1.0.0", &[])];
        assert!(latest_plugins_and_dependencies(&releases).is_err());
    }
}
