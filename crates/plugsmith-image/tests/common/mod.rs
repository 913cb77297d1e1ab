//! Common test infrastructure for plugsmith-image

#![allow(dead_code)]

use plugsmith_core::http::HttpClient;
use plugsmith_core::types::{RetryPolicy, RetryStrategy};
use plugsmith_core::{CancellationToken, RuntimeConfig};
use plugsmith_image::RegistryClient;
use serde_json::json;

pub const REPOSITORY: &str = "bufbuild/plugins-acme-foo";

pub fn http_client() -> HttpClient {
    HttpClient::new(&RuntimeConfig::default(), "registry", CancellationToken::new())
        .expect("build http client")
        .with_policy(RetryPolicy {
            max_attempts: 1,
            strategy: RetryStrategy::None,
            backoff_multiplier: 1.0,
            initial_delay_ms: 1,
            max_delay_ms: 1,
        })
}

/// Registry client pointed at a mock server
pub fn registry(base: &str) -> RegistryClient {
    RegistryClient::new(http_client(), base)
}

/// Serialized image manifest with the given config digest
pub fn image_manifest(config_digest: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {
            "mediaType": "application/vnd.oci.image.config.v1+json",
            "size": 1234,
            "digest": config_digest
        },
        "layers": []
    }))
    .expect("encode manifest")
}

/// Serialized image index listing `(architecture, digest)` entries for linux
pub fn image_index(entries: &[(&str, &str)]) -> Vec<u8> {
    let manifests: Vec<_> = entries
        .iter()
        .map(|(arch, digest)| {
            json!({
                "mediaType": "application/vnd.oci.image.manifest.v1+json",
                "digest": digest,
                "size": 100,
                "platform": {"os": "linux", "architecture": arch}
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.index.v1+json",
        "manifests": manifests
    }))
    .expect("encode index")
}
