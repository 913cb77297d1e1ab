//! Tag restoration tests against a mock registry

mod common;

use common::*;
use plugsmith_core::process::CommandRunner;
use plugsmith_core::utils::digest_bytes;
use plugsmith_core::CancellationToken;
use plugsmith_image::{DockerCli, RegistryClient};
use plugsmith_release::{restore_release, PluginRelease, RestoredTag};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPOSITORY: &str = "bufbuild/plugins-acme-foo";

fn manifest(config_digest: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "size": 10,
            "digest": config_digest
        },
        "layers": []
    }))
    .unwrap()
}

async fn mock_registry(server: &MockServer, tags: &[(&str, Vec<u8>)]) {
    Mock::given(method("GET"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "anon"})))
        .mount(server)
        .await;
    for (tag, body) in tags {
        Mock::given(method("GET"))
            .and(path(format!("/v2/{}/manifests/{}", REPOSITORY, tag)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(server)
            .await;
    }
}

/// Manifest entry recording `manifest_bytes` as the released image on `host`
fn released(host: &str, version: &str, manifest_bytes: &[u8]) -> PluginRelease {
    let mut release = previous_release("acme/foo", version, &image_id(1), "sha256:yaml");
    release.registry_image = format!("{}/{}@{}", host, REPOSITORY, digest_bytes(manifest_bytes));
    release
}

/// Docker stand-in that accepts every command
fn docker() -> DockerCli {
    DockerCli::new("true", "bufbuild", CommandRunner::new(CancellationToken::new()))
}

#[cfg(test)]
mod restore_tests {
    use super::*;

    #[tokio::test]
    async fn test_matching_tags_are_left_alone() {
        let server = MockServer::start().await;
        let current = manifest(&image_id(1));
        mock_registry(&server, &[("v1.0.0", current.clone())]).await;
        let registry = RegistryClient::new(http_client(), &server.uri());
        let releases = [released(registry.host(), "v1.0.0", &current)];

        let restored = restore_release(&releases, &registry, &docker(), false).await.unwrap();
        assert!(restored.is_empty());
    }

    #[tokio::test]
    async fn test_moved_tag_is_restored() {
        let server = MockServer::start().await;
        let current = manifest(&image_id(2));
        let original = manifest(&image_id(1));
        mock_registry(&server, &[("v1.0.0", current.clone())]).await;
        let registry = RegistryClient::new(http_client(), &server.uri());
        let releases = [released(registry.host(), "v1.0.0", &original)];

        let restored = restore_release(&releases, &registry, &docker(), false).await.unwrap();
        assert_eq!(
            restored,
            [RestoredTag {
                tag: format!("{}/{}:v1.0.0", registry.host(), REPOSITORY),
                previous: Some(format!("{}/{}@{}", registry.host(), REPOSITORY, digest_bytes(&current))),
                restored: releases[0].registry_image.clone(),
                pushed: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_dry_run_does_not_push_missing_tag() {
        let server = MockServer::start().await;
        mock_registry(&server, &[]).await;
        let registry = RegistryClient::new(http_client(), &server.uri());
        let releases = [released(registry.host(), "v2.0.0", &manifest(&image_id(3)))];

        let restored = restore_release(&releases, &registry, &docker(), true).await.unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].previous, None);
        assert!(!restored[0].pushed);
    }

    #[tokio::test]
    async fn test_image_on_another_registry_is_rejected() {
        let server = MockServer::start().await;
        mock_registry(&server, &[]).await;
        let registry = RegistryClient::new(http_client(), &server.uri());
        let releases = [released("ghcr.io", "v1.0.0", &manifest(&image_id(1)))];

        assert!(restore_release(&releases, &registry, &docker(), true).await.is_err());
    }
}
