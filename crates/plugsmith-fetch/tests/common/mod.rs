//! Common test infrastructure for plugsmith-fetch
//!
//! Provides a repository layout builder, a canned version fetcher and an
//! upstream client pointed at a mock server.

#![allow(dead_code)]

use async_trait::async_trait;
use plugsmith_core::error::{Error, Result};
use plugsmith_core::http::HttpClient;
use plugsmith_core::types::{EndpointsConfig, RetryPolicy, RetryStrategy, RuntimeConfig};
use plugsmith_core::CancellationToken;
use plugsmith_fetch::{SourceDescriptor, UpstreamClient, VersionFetcher};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Fluent builder for a repository with `.github/docker` and a `plugins/` tree
pub struct RepoTree {
    dir: TempDir,
}

impl RepoTree {
    pub fn new() -> Self {
        let tree = Self {
            dir: TempDir::new().expect("create temp dir"),
        };
        fs::create_dir_all(tree.dir.path().join(".github/docker")).expect("create catalog dir");
        fs::create_dir_all(tree.dir.path().join("plugins")).expect("create plugins dir");
        tree
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn plugins(&self) -> PathBuf {
        self.root().join("plugins")
    }

    /// Track `image:tag` in the base-image catalog
    pub fn base_image(self, file: &str, image: &str) -> Self {
        let path = self.root().join(".github/docker").join(file);
        fs::write(path, format!("FROM {}\n", image)).expect("write base image");
        self
    }

    /// Add `plugins/<short>/<version>/` with a descriptor and Dockerfile
    pub fn plugin(self, short: &str, version: &str, dockerfile: &str, deps: &[&str]) -> Self {
        let dir = self.plugins().join(short).join(version);
        fs::create_dir_all(&dir).expect("create plugin dir");
        fs::write(dir.join(".dockerignore"), "*\n!Dockerfile\n").expect("write .dockerignore");
        fs::write(dir.join("Dockerfile"), dockerfile).expect("write Dockerfile");

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

    /// Add `plugins/<short>/source.yaml`
    pub fn source(self, short: &str, yaml: &str) -> Self {
        let dir = self.plugins().join(short);
        fs::create_dir_all(&dir).expect("create source dir");
        fs::write(dir.join("source.yaml"), yaml).expect("write source");
        self
    }

    pub fn read(&self, relpath: &str) -> String {
        fs::read_to_string(self.plugins().join(relpath)).expect("read file")
    }
}

/// Fetcher answering from a map keyed by `<owner>/<name>` of the plugin directory
pub struct CannedFetcher {
    versions: HashMap<String, Result<String>>,
    pub calls: AtomicUsize,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self {
            versions: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn version(mut self, short: &str, version: &str) -> Self {
        self.versions.insert(short.to_string(), Ok(version.to_string()));
        self
    }

    pub fn prerelease(mut self, short: &str, version: &str) -> Self {
        self.versions.insert(
            short.to_string(),
            Err(Error::SemverPrerelease {
                version: version.to_string(),
            }),
        );
        self
    }
}

#[async_trait]
impl VersionFetcher for CannedFetcher {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let dir = source.plugin_dir();
        let base = |p: Option<&Path>| {
            p.and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        };
        let key = format!("{}/{}", base(dir.parent()), base(Some(dir)));
        match self.versions.get(&key) {
            Some(Ok(v)) => Ok(v.clone()),
            Some(Err(Error::SemverPrerelease { version })) => Err(Error::SemverPrerelease {
                version: version.clone(),
            }),
            _ => Err(Error::no_versions(key)),
        }
    }
}

/// Retry policy with no waiting between attempts
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        strategy: RetryStrategy::FixedDelay,
        backoff_multiplier: 1.0,
        initial_delay_ms: 1,
        max_delay_ms: 1,
    }
}

/// Upstream client with every endpoint pointed at `base`
pub fn upstream_client(base: &str, max_attempts: u32) -> UpstreamClient {
    let config = RuntimeConfig::default();
    let http = HttpClient::new(&config, "upstream", CancellationToken::new())
        .expect("build http client")
        .with_policy(fast_policy(max_attempts));
    let endpoints = EndpointsConfig {
        github_api: base.to_string(),
        goproxy: base.to_string(),
        npm_registry: base.to_string(),
        pub_dev: base.to_string(),
        maven_search: base.to_string(),
        ..EndpointsConfig::default()
    };
    UpstreamClient::new(http, endpoints)
}

/// Parse a source descriptor from YAML
pub fn source(yaml: &str) -> SourceDescriptor {
    SourceDescriptor::parse(yaml.as_bytes(), Path::new("plugins/acme/foo/source.yaml"))
        .expect("parse source")
}
