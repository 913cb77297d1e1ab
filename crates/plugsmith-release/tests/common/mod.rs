//! Common test infrastructure for plugsmith-release
//!
//! Provides a plugins tree builder, a scripted build driver and helpers for
//! mocking the GitHub releases API.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use plugsmith_core::error::{IoResultExt, Result};
use plugsmith_core::http::HttpClient;
use plugsmith_core::types::{RetryPolicy, RetryStrategy, RuntimeConfig};
use plugsmith_core::utils::digest_file;
use plugsmith_core::CancellationToken;
use plugsmith_image::{BuildDriver, ResolvedImage};
use plugsmith_plugins::{find_all, Plugin};
use plugsmith_release::{GitHubClient, PluginRelease, ReleaseLinks, ReleaseStatus};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

pub const REPO_PATH: &str = "/repos/bufbuild/plugins";

/// Runtime config with every GitHub endpoint pointed at `base`
pub fn config(base: &str) -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.endpoints.github_api = base.to_string();
    config.endpoints.github_uploads = base.to_string();
    config
}

pub fn http_client() -> HttpClient {
    HttpClient::new(&RuntimeConfig::default(), "github", CancellationToken::new())
        .expect("build http client")
        .with_policy(RetryPolicy {
            max_attempts: 1,
            strategy: RetryStrategy::None,
            backoff_multiplier: 1.0,
            initial_delay_ms: 1,
            max_delay_ms: 1,
        })
}

pub fn github(base: &str) -> GitHubClient {
    GitHubClient::new(http_client(), &config(base))
}

/// Client whose policy retries transient failures three times
pub fn retrying_github(base: &str) -> GitHubClient {
    let http = http_client().with_policy(RetryPolicy {
        max_attempts: 3,
        strategy: RetryStrategy::FixedDelay,
        backoff_multiplier: 1.0,
        initial_delay_ms: 1,
        max_delay_ms: 1,
    });
    GitHubClient::new(http, &config(base))
}

pub fn links() -> ReleaseLinks {
    ReleaseLinks::from_config(&RuntimeConfig::default())
}

/// 2024-03-05 10:00:00 UTC
pub fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap()
}

/// A plugins tree on disk
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

    /// Add `<owner>/<name>/<version>/buf.plugin.yaml` with `deps` pins (`owner/name:version`)
    pub fn plugin(self, short: &str, version: &str, deps: &[&str]) -> Self {
        let dir = self.root().join(short).join(version);
        fs::create_dir_all(&dir).expect("create plugin dir");
        fs::write(dir.join(".dockerignore"), "*\n").expect("write .dockerignore");
        let mut yaml = format!(
            "version: v1\nname: buf.build/{}\nplugin_version: {}\n",
            short, version
        );
        if !deps.is_empty() {
            yaml.push_str("deps:\n");
            for dep in deps {
                yaml.push_str(&format!("  - plugin: buf.build/{}\n", dep));
            }
        }
        fs::write(dir.join("buf.plugin.yaml"), yaml).expect("write descriptor");
        self
    }

    pub fn plugins(&self) -> Vec<Plugin> {
        find_all(self.root()).expect("find plugins")
    }

    pub fn descriptor(&self, short: &str, version: &str) -> PathBuf {
        self.root().join(short).join(version).join("buf.plugin.yaml")
    }

    pub fn yaml_digest(&self, short: &str, version: &str) -> String {
        digest_file(&self.descriptor(short, version)).expect("digest descriptor")
    }
}

/// Build driver answering from a fixed table keyed by `owner/name:version`
#[derive(Default)]
pub struct ScriptedDriver {
    images: HashMap<String, ResolvedImage>,
    exports: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, key: &str, image_id: &str) -> Self {
        let (name, _) = key.split_once(':').expect("owner/name:version");
        self.images.insert(
            key.to_string(),
            ResolvedImage {
                registry_image: registry_image(name, image_id),
                image_id: image_id.to_string(),
            },
        );
        self
    }

    pub fn exports(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildDriver for ScriptedDriver {
    async fn resolve(&self, plugin: &Plugin) -> Result<Option<ResolvedImage>> {
        let key = format!(
            "{}/{}:{}",
            plugin.identity.owner,
            plugin.identity.plugin,
            plugin.version()
        );
        Ok(self.images.get(&key).cloned())
    }

    async fn export(&self, image: &ResolvedImage, dir: &Path) -> Result<PathBuf> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        let path = dir.join("image.tar");
        fs::write(&path, image.image_id.as_bytes()).with_path(&path)?;
        Ok(path)
    }
}

/// Registry reference used for `name` in tests
pub fn registry_image(name: &str, image_id: &str) -> String {
    format!(
        "ghcr.io/bufbuild/plugins-{}@sha256:{}",
        name.replace('/', "-"),
        image_id.trim_start_matches("sha256:")
    )
}

/// A manifest entry as an earlier release would have recorded it
pub fn previous_release(name: &str, version: &str, image_id: &str, yaml_digest: &str) -> PluginRelease {
    let zip = format!("{}-{}.zip", name.replace('/', "-"), version);
    PluginRelease {
        name: name.to_string(),
        version: version.to_string(),
        zip_digest: format!("sha256:{}", "0".repeat(64)),
        yaml_digest: yaml_digest.to_string(),
        image_id: image_id.to_string(),
        registry_image: registry_image(name, image_id),
        release_tag: "20240101.1".to_string(),
        url: links().asset_url("20240101.1", &zip),
        last_updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        dependencies: Vec::new(),
        status: ReleaseStatus::Existing,
    }
}

/// JSON for a release with `(id, name)` assets
pub fn release_json(id: u64, tag: &str, assets: &[(u64, &str)]) -> serde_json::Value {
    let assets: Vec<_> = assets
        .iter()
        .map(|(id, name)| json!({"id": id, "name": name, "size": 1}))
        .collect();
    json!({
        "id": id,
        "tag_name": tag,
        "name": tag,
        "draft": false,
        "assets": assets
    })
}

pub fn image_id(n: u8) -> String {
    format!("sha256:{}", format!("{:02x}", n).repeat(32))
}
