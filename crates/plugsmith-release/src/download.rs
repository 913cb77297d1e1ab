//! Downloading released plugin archives with digest verification

use crate::model::PluginRelease;
use futures::StreamExt;
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::http::HttpClient;
use plugsmith_core::utils::{digest_file, parse_digest, SHA256_PREFIX};
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// What happened to one archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    /// Already present with the expected digest
    Skipped(PathBuf),
}

/// Fetches release archives into a directory
pub struct PluginDownloader {
    http: HttpClient,
}

impl PluginDownloader {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    /// Download every archive of `releases` into `dir`
    pub async fn download_all(
        &self,
        releases: &[PluginRelease],
        dir: &Path,
    ) -> Result<Vec<DownloadOutcome>> {
        std::fs::create_dir_all(dir).with_path(dir)?;
        let mut outcomes = Vec::with_capacity(releases.len());
        for release in releases {
            outcomes.push(self.download(release, dir).await?);
        }
        Ok(outcomes)
    }

    /// Download one archive unless a file with the right digest is already there
    ///
    /// The body is streamed into a hidden temporary file while being hashed, and
    /// only renamed into place when the digest matches.
    pub async fn download(&self, release: &PluginRelease, dir: &Path) -> Result<DownloadOutcome> {
        let expected = parse_digest(&release.zip_digest)?.to_string();
        let file_name = archive_file_name(&release.url)?;
        let target = dir.join(file_name);

        if target.is_file() && digest_file(&target)? == release.zip_digest {
            info!("Already downloaded: {}", target.display());
            return Ok(DownloadOutcome::Skipped(target));
        }

        info!("Downloading: {}", release.url);
        let url = release.url.as_str();
        let response = self.http.send(url, |client| client.get(url)).await?;
        if !response.status().is_success() {
            return Err(Error::upstream(
                url,
                format!("unexpected status {}", response.status()),
            ));
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}", release.name.replace('/', "-")))
            .tempfile_in(dir)
            .with_path(dir)?;
        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if self.http.cancel_token().is_cancelled() {
                return Err(Error::Cancelled);
            }
            let chunk = chunk.map_err(|e| Error::upstream(url, e.to_string()))?;
            hasher.update(&chunk);
            tmp.write_all(&chunk).with_path(tmp.path())?;
        }
        tmp.flush().with_path(tmp.path())?;

        let actual = hex::encode(hasher.finalize());
        if actual != expected {
            return Err(Error::digest_mismatch(
                &release.url,
                &release.zip_digest,
                format!("{}{}", SHA256_PREFIX, actual),
            ));
        }
        tmp.persist(&target).map_err(|e| Error::io(&target, e.error))?;
        Ok(DownloadOutcome::Downloaded(target))
    }
}

/// Last path segment of an archive URL
fn archive_file_name(url: &str) -> Result<&str> {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| Error::upstream(url, "download URL has no file name"))
}
