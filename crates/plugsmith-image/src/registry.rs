use crate::naming;
use crate::types::{ImageManifest, ResolvedImage, MANIFEST_ACCEPT};
use plugsmith_core::error::{Error, Result};
use plugsmith_core::http::HttpClient;
use plugsmith_core::utils::digest_bytes;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, trace};

const DEFAULT_OS: &str = "linux";
const DEFAULT_ARCHITECTURE: &str = "amd64";

/// Client for interacting with OCI-compatible container registries
pub struct RegistryClient {
    http: HttpClient,
    /// Base URL requests are sent to, e.g. `https://ghcr.io`
    base_url: String,
    /// Host as it appears in image references, e.g. `ghcr.io`
    host: String,
    /// Raw token (e.g., GitHub PAT) for authentication
    auth_token: Option<String>,
    /// Bearer tokens obtained from the registry auth endpoint, per repository
    bearer_tokens: RwLock<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
}

impl RegistryClient {
    /// Create a client for `registry`, a host (`ghcr.io`) or a base URL
    pub fn new(http: HttpClient, registry: &str) -> Self {
        let registry = registry.trim_end_matches('/');
        let (base_url, host) = match registry.split_once("://") {
            Some((_, host)) => (registry.to_string(), host.to_string()),
            None => (format!("https://{}", registry), registry.to_string()),
        };
        Self {
            http,
            base_url,
            host,
            auth_token: None,
            bearer_tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Set authentication token (e.g., GitHub token for GHCR); empty tokens are ignored
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get a pull token for `repository`
    ///
    /// Public packages get an anonymous token. Private packages need a
    /// GitHub token with `read:packages`, sent as basic auth.
    async fn bearer_token(&self, repository: &str) -> Result<String> {
        if let Some(token) = self.bearer_tokens.read().await.get(repository) {
            return Ok(token.clone());
        }

        let token_url = format!("{}/token", self.base_url);
        let scope = format!("repository:{}:pull", repository);
        debug!("Requesting registry token for {}", repository);

        let auth = self.auth_token.as_deref();
        let response = self
            .http
            .send(&token_url, |client| {
                let request = client
                    .get(&token_url)
                    .query(&[("service", self.host.as_str()), ("scope", scope.as_str())]);
                match auth {
                    Some(token) => request.basic_auth("token", Some(token)),
                    None => request,
                }
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let hint = if self.auth_token.is_some() {
                "ensure GITHUB_TOKEN has the read:packages scope"
            } else {
                "the package may be private; set GITHUB_TOKEN"
            };
            return Err(Error::upstream(
                &token_url,
                format!("token request failed ({}): {}", status, hint),
            ));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::upstream(&token_url, format!("invalid token response: {}", e)))?;

        self.bearer_tokens
            .write()
            .await
            .insert(repository.to_string(), token.token.clone());
        Ok(token.token)
    }

    /// Fetch raw manifest bytes for a tag or digest; `None` on 404
    async fn get_manifest_bytes(&self, repository: &str, reference: &str) -> Result<Option<Vec<u8>>> {
        let url = format!("{}/v2/{}/manifests/{}", self.base_url, repository, reference);
        let bearer = self.bearer_token(repository).await?;
        debug!("Fetching manifest from: {}", url);

        let response = self
            .http
            .send(&url, |client| {
                client
                    .get(&url)
                    .header("Accept", MANIFEST_ACCEPT)
                    .bearer_auth(&bearer)
            })
            .await?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::upstream(&url, e.to_string()))?;
                trace!("Manifest {} is {} bytes", reference, bytes.len());
                Ok(Some(bytes.to_vec()))
            }
            status => Err(Error::upstream(&url, format!("unexpected status {}", status))),
        }
    }

    /// Resolve `repository:reference` to its platform manifest digest and image ID
    ///
    /// An image index is resolved to its `linux/amd64` manifest. Digests are
    /// recomputed from the bytes received, never taken from headers.
    /// Returns `None` when the image is not published.
    pub async fn resolve(&self, repository: &str, reference: &str) -> Result<Option<ResolvedImage>> {
        let Some(bytes) = self.get_manifest_bytes(repository, reference).await? else {
            return Ok(None);
        };
        let mut digest = digest_bytes(&bytes);
        let mut manifest = parse_manifest(&bytes, repository, reference)?;

        if manifest.is_index() {
            let entry = manifest
                .platform_entry(DEFAULT_OS, DEFAULT_ARCHITECTURE)
                .ok_or_else(|| {
                    Error::upstream(
                        format!("{}:{}", repository, reference),
                        format!("no {}/{} manifest in index", DEFAULT_OS, DEFAULT_ARCHITECTURE),
                    )
                })?
                .digest
                .clone();
            let Some(child) = self.get_manifest_bytes(repository, &entry).await? else {
                return Ok(None);
            };
            digest = digest_bytes(&child);
            if digest != entry {
                return Err(Error::digest_mismatch(
                    format!("{}@{}", repository, entry),
                    entry,
                    digest,
                ));
            }
            manifest = parse_manifest(&child, repository, &digest)?;
        }

        let config = manifest.config.ok_or_else(|| {
            Error::upstream(
                format!("{}:{}", repository, reference),
                "manifest has no config descriptor",
            )
        })?;

        Ok(Some(ResolvedImage {
            registry_image: naming::registry_image(&self.host, repository, &digest),
            image_id: config.digest,
        }))
    }
}

fn parse_manifest(bytes: &[u8], repository: &str, reference: &str) -> Result<ImageManifest> {
    serde_json::from_slice(bytes).map_err(|e| {
        Error::upstream(
            format!("{}:{}", repository, reference),
            format!("invalid manifest: {}", e),
        )
    })
}
