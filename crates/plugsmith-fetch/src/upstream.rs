//! Upstream version clients
//!
//! One operation, [`VersionFetcher::fetch`], turns a source descriptor into a
//! single `v`-prefixed semantic version. [`UpstreamClient`] dispatches on the
//! origin kind; [`CachingFetcher`] makes repeated lookups of a shared
//! upstream free.

use crate::source::{Origin, SourceDescriptor};
use async_trait::async_trait;
use plugsmith_core::error::{Error, Result};
use plugsmith_core::http::{next_link, HttpClient};
use plugsmith_core::types::EndpointsConfig;
use plugsmith_core::version;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Resolves the latest upstream version of a source
#[async_trait]
pub trait VersionFetcher: Send + Sync {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String>;
}

/// HTTP implementation covering every origin kind
pub struct UpstreamClient {
    http: HttpClient,
    endpoints: EndpointsConfig,
    github_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubTag {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GoProxyLatest {
    #[serde(rename = "Version")]
    version: String,
}

#[derive(Debug, Deserialize)]
struct NpmPackage {
    #[serde(rename = "dist-tags")]
    dist_tags: NpmDistTags,
}

#[derive(Debug, Deserialize)]
struct NpmDistTags {
    latest: String,
}

#[derive(Debug, Deserialize)]
struct DartPackage {
    latest: DartVersion,
    #[serde(default)]
    versions: Vec<DartVersion>,
}

#[derive(Debug, Deserialize)]
struct DartVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
struct MavenSearch {
    response: MavenResponse,
}

#[derive(Debug, Deserialize)]
struct MavenResponse {
    #[serde(default)]
    docs: Vec<MavenDoc>,
}

#[derive(Debug, Deserialize)]
struct MavenDoc {
    v: String,
}

/// Escape a Go module path: uppercase letters become `!` plus lowercase
pub fn escape_module_path(path: &str) -> String {
    let mut escaped = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            escaped.push('!');
            escaped.push(c.to_ascii_lowercase());
        } else {
            escaped.push(c);
        }
    }
    escaped
}

impl UpstreamClient {
    pub fn new(http: HttpClient, endpoints: EndpointsConfig) -> Self {
        Self {
            http,
            endpoints,
            github_token: None,
        }
    }

    /// Authenticate GitHub API calls; empty tokens are ignored
    pub fn with_github_token(mut self, token: Option<String>) -> Self {
        self.github_token = token.filter(|t| !t.trim().is_empty());
        if self.github_token.is_some() {
            debug!("Using authenticated GitHub client");
        } else {
            debug!("Using unauthenticated GitHub client");
        }
        self
    }

    async fn fetch_raw(&self, source: &SourceDescriptor) -> Result<String> {
        match &source.origin {
            Origin::GitHub { owner, repository } => {
                self.fetch_github(owner, repository, source).await
            }
            Origin::DartFlutter { name } => self.fetch_dart_flutter(name, source).await,
            Origin::GoProxy { name } => self.fetch_go_proxy(name).await,
            Origin::NpmRegistry { name } => self.fetch_npm_registry(name).await,
            Origin::Maven { group, name } => self.fetch_maven(group, name, source).await,
        }
    }

    async fn fetch_github(
        &self,
        owner: &str,
        repository: &str,
        source: &SourceDescriptor,
    ) -> Result<String> {
        let base = self.endpoints.github_api.trim_end_matches('/');
        let mut url = format!("{}/repos/{}/{}/tags?per_page=100", base, owner, repository);
        let mut versions: Vec<String> = Vec::new();

        loop {
            debug!("Listing tags from: {}", url);
            let token = self.github_token.as_deref();
            let response = self
                .http
                .send(&url, |client| {
                    let request = client
                        .get(&url)
                        .header("Accept", "application/vnd.github+json");
                    match token {
                        Some(token) => request.bearer_auth(token),
                        None => request,
                    }
                })
                .await?;

            if !response.status().is_success() {
                return Err(Error::upstream(
                    &url,
                    format!("unexpected status {}", response.status()),
                ));
            }

            let next = response
                .headers()
                .get("link")
                .and_then(|h| h.to_str().ok())
                .and_then(|link| next_link(link, base));

            let tags: Vec<GitHubTag> = response
                .json()
                .await
                .map_err(|e| Error::upstream(&url, format!("invalid JSON: {}", e)))?;

            for tag in tags {
                let candidate = version::ensure_prefix(&tag.name);
                if !version::is_valid(&candidate) {
                    continue;
                }
                if version::is_prerelease(&candidate) && !source.include_prerelease {
                    continue;
                }
                if is_ignored(source, &candidate) {
                    continue;
                }
                versions.push(candidate);
            }

            match next {
                Some(next) => url = next,
                None => break,
            }
        }

        version::max(versions.iter().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::no_versions(format!("github {}/{}", owner, repository)))
    }

    async fn fetch_go_proxy(&self, module: &str) -> Result<String> {
        let url = format!(
            "{}/{}/@latest",
            self.endpoints.goproxy.trim_end_matches('/'),
            escape_module_path(module.trim_start_matches('/'))
        );
        let data: GoProxyLatest = self.http.get_json(&url, None).await?;
        Ok(data.version)
    }

    async fn fetch_npm_registry(&self, package: &str) -> Result<String> {
        let url = format!(
            "{}/{}",
            self.endpoints.npm_registry.trim_end_matches('/'),
            package.trim_start_matches('/')
        );
        let data: NpmPackage = self.http.get_json(&url, None).await?;
        Ok(data.dist_tags.latest)
    }

    async fn fetch_dart_flutter(&self, package: &str, source: &SourceDescriptor) -> Result<String> {
        let url = format!(
            "{}/api/packages/{}",
            self.endpoints.pub_dev.trim_end_matches('/'),
            package.trim_start_matches('/')
        );
        let data: DartPackage = self.http.get_json(&url, None).await?;
        if source.ignore_versions.is_empty() {
            return Ok(data.latest.version);
        }

        let candidates: Vec<String> = data
            .versions
            .iter()
            .map(|v| version::ensure_prefix(&v.version))
            .filter(|v| version::is_valid(v) && !version::is_prerelease(v))
            .filter(|v| !is_ignored(source, v))
            .collect();
        version::max(candidates.iter().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::no_versions(format!("dart_flutter {}", package)))
    }

    async fn fetch_maven(&self, group: &str, name: &str, source: &SourceDescriptor) -> Result<String> {
        let url = format!(
            "{}/solrsearch/select",
            self.endpoints.maven_search.trim_end_matches('/')
        );
        let query = format!("g:\"{}\" AND a:\"{}\"", group, name);
        let response = self
            .http
            .send(&url, |client| {
                client.get(&url).query(&[
                    ("q", query.as_str()),
                    ("core", "gav"),
                    ("rows", "200"),
                    ("wt", "json"),
                ])
            })
            .await?;
        if !response.status().is_success() {
            return Err(Error::upstream(
                &url,
                format!("unexpected status {}", response.status()),
            ));
        }
        let data: MavenSearch = response
            .json()
            .await
            .map_err(|e| Error::upstream(&url, format!("invalid JSON: {}", e)))?;

        let candidates: Vec<String> = data
            .response
            .docs
            .iter()
            .filter_map(|doc| version::canonical(&version::ensure_prefix(&doc.v)))
            .filter(|v| !version::is_prerelease(v))
            .filter(|v| !is_ignored(source, v))
            .collect();
        version::max(candidates.iter().map(String::as_str))
            .map(str::to_string)
            .ok_or_else(|| Error::no_versions(format!("maven {}:{}", group, name)))
    }
}

fn is_ignored(source: &SourceDescriptor, candidate: &str) -> bool {
    source.is_ignored(candidate)
        || version::canonical(candidate)
            .map(|c| source.is_ignored(&c))
            .unwrap_or(false)
}

#[async_trait]
impl VersionFetcher for UpstreamClient {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String> {
        let raw = self.fetch_raw(source).await?;
        let resolved = version::ensure_prefix(raw.trim());
        if !version::is_valid(&resolved) {
            return Err(Error::upstream(
                source.origin.to_string(),
                format!("invalid semver: {}", resolved),
            ));
        }
        if version::is_prerelease(&resolved) && !source.include_prerelease {
            return Err(Error::SemverPrerelease { version: resolved });
        }
        info!("Resolved {} to {}", source.origin, resolved);
        Ok(resolved)
    }
}

/// Wraps a fetcher with a per-run cache keyed by [`SourceDescriptor::cache_key`]
pub struct CachingFetcher<F> {
    inner: F,
    cache: Mutex<HashMap<String, Cached>>,
}

/// A remembered answer; transport failures are not remembered
#[derive(Debug, Clone)]
enum Cached {
    Latest(String),
    Prerelease(String),
    InvalidVersion(String),
    NoVersions(String),
}

impl Cached {
    fn from_result(result: &Result<String>) -> Option<Self> {
        match result {
            Ok(v) => Some(Self::Latest(v.clone())),
            Err(Error::SemverPrerelease { version }) => Some(Self::Prerelease(version.clone())),
            Err(Error::InvalidVersion { version }) => Some(Self::InvalidVersion(version.clone())),
            Err(Error::NoVersions { subject }) => Some(Self::NoVersions(subject.clone())),
            Err(_) => None,
        }
    }

    fn to_result(&self) -> Result<String> {
        match self {
            Self::Latest(v) => Ok(v.clone()),
            Self::Prerelease(v) => Err(Error::SemverPrerelease { version: v.clone() }),
            Self::InvalidVersion(v) => Err(Error::invalid_version(v.clone())),
            Self::NoVersions(s) => Err(Error::no_versions(s.clone())),
        }
    }
}

impl<F: VersionFetcher> CachingFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: VersionFetcher> VersionFetcher for CachingFetcher<F> {
    async fn fetch(&self, source: &SourceDescriptor) -> Result<String> {
        let key = source.cache_key();
        // Held across the lookup so one key has at most one request in flight
        let mut cache = self.cache.lock().await;
        if let Some(hit) = cache.get(&key) {
            debug!("Cache hit for {}", key);
            return hit.to_result();
        }
        let resolved = self.inner.fetch(source).await;
        if let Some(entry) = Cached::from_result(&resolved) {
            cache.insert(key, entry);
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_escape_module_path() {
        assert_eq!(
            escape_module_path("github.com/BurntSushi/toml"),
            "github.com/!burnt!sushi/toml"
        );
        assert_eq!(escape_module_path("google.golang.org/grpc"), "google.golang.org/grpc");
    }

    struct Counting(AtomicU32);

    #[async_trait]
    impl VersionFetcher for Counting {
        async fn fetch(&self, _source: &SourceDescriptor) -> Result<String> {
            let n = self.0.fetch_add(1, Ordering::SeqCst);
            Ok(format!("v1.0.{}", n))
        }
    }

    fn goproxy(path: &str, name: &str) -> SourceDescriptor {
        let yaml = format!("source:\n  goproxy:\n    name: {}\n", name);
        SourceDescriptor::parse(yaml.as_bytes(), Path::new(path)).unwrap()
    }

    #[tokio::test]
    async fn test_caching_fetcher_dedupes_by_key() {
        let fetcher = CachingFetcher::new(Counting(AtomicU32::new(0)));
        let a = goproxy("a/x/source.yaml", "example.com/mod");
        let b = goproxy("b/y/source.yaml", "example.com/mod");
        let c = goproxy("c/z/source.yaml", "example.com/other");

        assert_eq!(fetcher.fetch(&a).await.unwrap(), "v1.0.0");
        assert_eq!(fetcher.fetch(&b).await.unwrap(), "v1.0.0");
        assert_eq!(fetcher.fetch(&c).await.unwrap(), "v1.0.1");
        assert_eq!(fetcher.inner.0.load(Ordering::SeqCst), 2);
    }

    struct Failing {
        calls: AtomicU32,
        error: fn() -> Error,
    }

    #[async_trait]
    impl VersionFetcher for Failing {
        async fn fetch(&self, _source: &SourceDescriptor) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err((self.error)())
        }
    }

    #[tokio::test]
    async fn test_caching_fetcher_remembers_prerelease() {
        let fetcher = CachingFetcher::new(Failing {
            calls: AtomicU32::new(0),
            error: || Error::SemverPrerelease {
                version: "v2.0.0-rc.1".to_string(),
            },
        });
        let a = goproxy("a/x/source.yaml", "example.com/mod");
        let b = goproxy("b/y/source.yaml", "example.com/mod");

        assert!(fetcher.fetch(&a).await.unwrap_err().is_prerelease());
        let err = fetcher.fetch(&b).await.unwrap_err();
        assert!(matches!(err, Error::SemverPrerelease { ref version } if version == "v2.0.0-rc.1"));
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_caching_fetcher_retries_transport_failures() {
        let fetcher = CachingFetcher::new(Failing {
            calls: AtomicU32::new(0),
            error: || Error::upstream("https://proxy.golang.org", "connection reset"),
        });
        let a = goproxy("a/x/source.yaml", "example.com/mod");

        assert!(fetcher.fetch(&a).await.is_err());
        assert!(fetcher.fetch(&a).await.is_err());
        assert_eq!(fetcher.inner.calls.load(Ordering::SeqCst), 2);
    }
}
