//! GitHub releases: lookup, asset download and publishing

use crate::manifest::{load_releases, PLUGIN_RELEASES_FILE, PLUGIN_RELEASES_SIGNATURE_FILE};
use crate::model::PluginRelease;
use minisign::PublicKey;
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::http::HttpClient;
use plugsmith_core::types::RuntimeConfig;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const API_ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

/// Release information
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub id: u64,

    /// Release tag (e.g., "20221121.1")
    pub tag_name: String,

    pub name: Option<String>,

    #[serde(default)]
    pub draft: bool,

    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    pub fn asset(&self, name: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name == name)
    }
}

/// Release asset
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Serialize)]
struct NewRelease<'a> {
    tag_name: &'a str,
    name: &'a str,
    body: &'a str,
    draft: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_commitish: Option<&'a str>,
}

/// A manifest downloaded from a release and verified
#[derive(Debug, Clone)]
pub struct PublishedManifest {
    pub releases: Vec<PluginRelease>,
    pub bytes: Vec<u8>,
    pub signature: Option<Vec<u8>>,
}

impl PublishedManifest {
    /// Keep a copy of the downloaded files in `dir`
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).with_path(dir)?;
        plugsmith_core::utils::write_atomic(&dir.join(PLUGIN_RELEASES_FILE), &self.bytes)?;
        if let Some(signature) = &self.signature {
            plugsmith_core::utils::write_atomic(&dir.join(PLUGIN_RELEASES_SIGNATURE_FILE), signature)?;
        }
        Ok(())
    }
}

/// Client for one release repository
pub struct GitHubClient {
    http: HttpClient,
    api_url: String,
    uploads_url: String,
    owner: String,
    repository: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(http: HttpClient, config: &RuntimeConfig) -> Self {
        Self {
            http,
            api_url: config.endpoints.github_api.trim_end_matches('/').to_string(),
            uploads_url: config.endpoints.github_uploads.trim_end_matches('/').to_string(),
            owner: config.release.owner.clone(),
            repository: config.release.repository.clone(),
            token: None,
        }
    }

    /// Authenticate with a token; empty tokens are ignored
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        if self.token.is_some() {
            debug!("Using authenticated GitHub client");
        }
        self
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.api_url, self.owner, self.repository)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Accept", API_ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get_release(&self, url: &str) -> Result<Option<Release>> {
        debug!("Fetching release from: {}", url);
        let response = self
            .http
            .send(url, |client| self.authorize(client.get(url)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Release>()
                .await
                .map(Some)
                .map_err(|e| Error::upstream(url, format!("invalid release: {}", e))),
            status => Err(Error::upstream(url, format!("unexpected status {}", status))),
        }
    }

    /// Latest published release, `None` if the repository has none
    pub async fn latest_release(&self) -> Result<Option<Release>> {
        self.get_release(&format!("{}/releases/latest", self.repo_url()))
            .await
    }

    /// Release by tag, `None` if it does not exist
    pub async fn release_by_tag(&self, tag: &str) -> Result<Option<Release>> {
        self.get_release(&format!("{}/releases/tags/{}", self.repo_url(), tag))
            .await
    }

    /// Download a release asset by name, `None` if the release has no such asset
    pub async fn download_asset(&self, release: &Release, name: &str) -> Result<Option<Vec<u8>>> {
        let Some(asset) = release.asset(name) else {
            return Ok(None);
        };
        let url = format!("{}/releases/assets/{}", self.repo_url(), asset.id);
        debug!("Downloading {} from release {}", name, release.tag_name);

        let response = self
            .http
            .send(&url, |client| {
                let request = client.get(&url).header("Accept", "application/octet-stream");
                match &self.token {
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
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::upstream(&url, e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }

    /// Download and verify the manifest of `release`
    ///
    /// `None` when the release has no manifest, which is the bootstrap case.
    pub async fn fetch_manifest(
        &self,
        release: &Release,
        public_key: Option<&PublicKey>,
    ) -> Result<Option<PublishedManifest>> {
        let Some(bytes) = self.download_asset(release, PLUGIN_RELEASES_FILE).await? else {
            return Ok(None);
        };
        let signature = self
            .download_asset(release, PLUGIN_RELEASES_SIGNATURE_FILE)
            .await?;
        let releases = load_releases(&bytes, signature.as_deref(), public_key)?;
        info!(
            "Loaded {} plugin releases from {}",
            releases.len(),
            release.tag_name
        );
        Ok(Some(PublishedManifest {
            releases,
            bytes,
            signature,
        }))
    }

    /// Create a draft release, upload the files of `assets_dir`, then publish it
    ///
    /// Only regular files directly inside `assets_dir` are uploaded, in name order.
    /// Creation and uploads are sent once. The draft is deleted when an upload
    /// or the final publish fails.
    pub async fn publish(
        &self,
        tag: &str,
        body: &str,
        target_commitish: Option<&str>,
        assets_dir: &Path,
    ) -> Result<Release> {
        let mut assets: Vec<_> = std::fs::read_dir(assets_dir)
            .with_path(assets_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        assets.sort();

        let draft = self.create_draft(tag, body, target_commitish).await?;
        match self.upload_and_publish(&draft, &assets).await {
            Ok(published) => Ok(published),
            Err(err) => {
                warn!("Deleting draft release {} after failed publish", draft.tag_name);
                if let Err(e) = self.delete_release(&draft).await {
                    warn!("Failed to delete draft release {}: {}", draft.tag_name, e);
                }
                Err(err)
            }
        }
    }

    async fn upload_and_publish(&self, draft: &Release, assets: &[PathBuf]) -> Result<Release> {
        for asset in assets {
            self.upload_asset(draft, asset).await?;
        }
        self.mark_published(draft).await
    }

    async fn create_draft(&self, tag: &str, body: &str, target_commitish: Option<&str>) -> Result<Release> {
        let url = format!("{}/releases", self.repo_url());
        let payload = NewRelease {
            tag_name: tag,
            name: tag,
            body,
            draft: true,
            target_commitish,
        };
        info!("Creating draft release {}", tag);
        let response = self
            .http
            .send_once(&url, self.authorize(self.http.inner().post(&url)).json(&payload))
            .await?;
        expect_json(response, &url).await
    }

    async fn delete_release(&self, release: &Release) -> Result<()> {
        let url = format!("{}/releases/{}", self.repo_url(), release.id);
        let response = self
            .http
            .send(&url, |client| self.authorize(client.delete(&url)))
            .await?;
        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(Error::upstream(&url, format!("unexpected status {}", status))),
        }
    }

    async fn upload_asset(&self, release: &Release, path: &Path) -> Result<()> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let url = format!(
            "{}/repos/{}/{}/releases/{}/assets",
            self.uploads_url, self.owner, self.repository, release.id
        );
        let bytes = tokio::fs::read(path).await.with_path(path)?;
        info!("Uploading {} ({} bytes)", name, bytes.len());

        let request = self
            .authorize(self.http.inner().post(&url))
            .query(&[("name", name.as_str())])
            .header("Content-Type", "application/octet-stream")
            .body(bytes);
        let response = self.http.send_once(&url, request).await?;
        if !response.status().is_success() {
            return Err(Error::upstream(
                &url,
                format!("upload of {} failed with status {}", name, response.status()),
            ));
        }
        Ok(())
    }

    async fn mark_published(&self, release: &Release) -> Result<Release> {
        let url = format!("{}/releases/{}", self.repo_url(), release.id);
        let payload = serde_json::json!({ "draft": false });
        let response = self
            .http
            .send(&url, |client| self.authorize(client.patch(&url)).json(&payload))
            .await?;
        let published: Release = expect_json(response, &url).await?;
        info!("Published release {}", published.tag_name);
        Ok(published)
    }
}

async fn expect_json<T: serde::de::DeserializeOwned>(response: reqwest::Response, url: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(Error::upstream(url, format!("unexpected status {}: {}", status, text.trim())));
    }
    response
        .json::<T>()
        .await
        .map_err(|e| Error::upstream(url, format!("invalid JSON: {}", e)))
}
