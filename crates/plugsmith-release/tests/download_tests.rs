//! Archive download and manifest retrieval tests

mod common;

use common::*;
use plugsmith_core::utils::digest_bytes;
use plugsmith_core::Error;
use plugsmith_release::{DownloadOutcome, PluginDownloader, PluginRelease, Release, PLUGIN_RELEASES_FILE};
use std::fs;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ARCHIVE: &[u8] = b"PK\x05\x06 not really a zip";

fn release_at(server: &MockServer, digest: &str) -> PluginRelease {
    let mut release = previous_release("acme/foo", "v1.0.0", &image_id(1), "sha256:yaml");
    release.url = format!("{}/download/20240101.1/acme-foo-v1.0.0.zip", server.uri());
    release.zip_digest = digest.to_string();
    release
}

async fn serve_archive(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/download/20240101.1/acme-foo-v1.0.0.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(ARCHIVE))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn hidden_files(dir: &std::path::Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
        .count()
}

#[cfg(test)]
mod download_tests {
    use super::*;

    #[tokio::test]
    async fn test_downloads_and_verifies_archive() {
        let server = MockServer::start().await;
        serve_archive(&server, 1).await;
        let dir = TempDir::new().unwrap();

        let downloader = PluginDownloader::new(http_client());
        let outcomes = downloader
            .download_all(&[release_at(&server, &digest_bytes(ARCHIVE))], dir.path())
            .await
            .unwrap();

        let target = dir.path().join("acme-foo-v1.0.0.zip");
        assert_eq!(outcomes, [DownloadOutcome::Downloaded(target.clone())]);
        assert_eq!(fs::read(&target).unwrap(), ARCHIVE);
        assert_eq!(hidden_files(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_skips_archive_already_present() {
        let server = MockServer::start().await;
        serve_archive(&server, 0).await;
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("acme-foo-v1.0.0.zip");
        fs::write(&target, ARCHIVE).unwrap();

        let downloader = PluginDownloader::new(http_client());
        let outcome = downloader
            .download(&release_at(&server, &digest_bytes(ARCHIVE)), dir.path())
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Skipped(target));
    }

    #[tokio::test]
    async fn test_replaces_stale_archive() {
        let server = MockServer::start().await;
        serve_archive(&server, 1).await;
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("acme-foo-v1.0.0.zip");
        fs::write(&target, b"stale").unwrap();

        let downloader = PluginDownloader::new(http_client());
        let outcome = downloader
            .download(&release_at(&server, &digest_bytes(ARCHIVE)), dir.path())
            .await
            .unwrap();
        assert_eq!(outcome, DownloadOutcome::Downloaded(target.clone()));
        assert_eq!(fs::read(&target).unwrap(), ARCHIVE);
    }

    #[tokio::test]
    async fn test_digest_mismatch_leaves_nothing_behind() {
        let server = MockServer::start().await;
        serve_archive(&server, 1).await;
        let dir = TempDir::new().unwrap();

        let downloader = PluginDownloader::new(http_client());
        let err = downloader
            .download(&release_at(&server, &digest_bytes(b"something else")), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DigestMismatch { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_digest_is_rejected_before_download() {
        let server = MockServer::start().await;
        serve_archive(&server, 0).await;
        let dir = TempDir::new().unwrap();

        let downloader = PluginDownloader::new(http_client());
        let err = downloader
            .download(&release_at(&server, "md5:abc"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDigest { .. }));
    }

    #[tokio::test]
    async fn test_missing_archive_is_upstream_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let downloader = PluginDownloader::new(http_client());
        let err = downloader
            .download(&release_at(&server, &digest_bytes(ARCHIVE)), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamFailure { .. }));
    }

    #[tokio::test]
    async fn test_release_without_manifest_has_none() {
        let server = MockServer::start().await;
        let client = github(&server.uri());
        let release: Release = serde_json::from_value(release_json(1, "20240101.1", &[(5, "other.zip")])).unwrap();

        let manifest = client.fetch_manifest(&release, None).await.unwrap();
        assert!(manifest.is_none());
    }

    #[tokio::test]
    async fn test_release_lookup_by_tag() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/releases/tags/20240101.1", REPO_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_json(release_json(
                3,
                "20240101.1",
                &[(9, PLUGIN_RELEASES_FILE)],
            )))
            .mount(&server)
            .await;
        let client = github(&server.uri());

        let release = client.release_by_tag("20240101.1").await.unwrap().unwrap();
        assert_eq!(release.id, 3);
        assert_eq!(release.asset(PLUGIN_RELEASES_FILE).map(|a| a.id), Some(9));
        assert!(client.release_by_tag("20991231.1").await.unwrap().is_none());
    }
}
