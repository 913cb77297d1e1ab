//! Runtime configuration types for operational parameters
//!
//! These types hold the knobs that vary between environments: HTTP
//! timeouts, retry policies, upstream endpoints, the release repository and
//! docker settings. Test suites point the endpoints at a mock server.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub retry_policies: RetryPoliciesConfig,

    /// Base URLs of every remote service
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Where releases are published
    #[serde(default)]
    pub release: ReleaseConfig,

    #[serde(default)]
    pub docker: DockerConfig,
}

/// Network and HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// HTTP timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_http_timeout() -> u64 {
    300 // 5 minutes
}
fn default_user_agent() -> String {
    format!(
        "plugsmith/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Retry policy configurations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPoliciesConfig {
    #[serde(default)]
    pub default: RetryPolicy,

    /// Per-operation policies (`upstream`, `registry`, `github`, `download`)
    #[serde(default)]
    pub operations: HashMap<String, RetryPolicy>,
}

impl RetryPoliciesConfig {
    /// Policy for `operation`, falling back to the default
    pub fn policy_for(&self, operation: &str) -> RetryPolicy {
        self.operations
            .get(operation)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

impl Default for RetryPoliciesConfig {
    fn default() -> Self {
        let mut operations = HashMap::new();
        operations.insert(
            "download".to_string(),
            RetryPolicy {
                max_attempts: 5,
                strategy: RetryStrategy::ExponentialBackoff,
                backoff_multiplier: 2.0,
                initial_delay_ms: 1000,
                max_delay_ms: 30000,
            },
        );

        Self {
            default: RetryPolicy::default(),
            operations,
        }
    }
}

/// Retry policy for an operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default)]
    pub strategy: RetryStrategy,

    /// Multiplier for exponential backoff
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            strategy: RetryStrategy::default(),
            backoff_multiplier: default_backoff_multiplier(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_initial_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}

/// Retry strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RetryStrategy {
    None,
    FixedDelay,
    #[default]
    ExponentialBackoff,
    LinearBackoff,
}

/// Base URLs for remote services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EndpointsConfig {
    #[serde(default = "default_github_api")]
    pub github_api: String,

    /// Release asset uploads live on a separate host
    #[serde(default = "default_github_uploads")]
    pub github_uploads: String,

    /// Public web host used in download links
    #[serde(default = "default_github_web")]
    pub github_web: String,

    #[serde(default = "default_goproxy")]
    pub goproxy: String,

    #[serde(default = "default_npm_registry")]
    pub npm_registry: String,

    #[serde(default = "default_pub_dev")]
    pub pub_dev: String,

    #[serde(default = "default_maven_search")]
    pub maven_search: String,

    /// OCI registry host holding plugin images
    #[serde(default = "default_image_registry")]
    pub image_registry: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            github_api: default_github_api(),
            github_uploads: default_github_uploads(),
            github_web: default_github_web(),
            goproxy: default_goproxy(),
            npm_registry: default_npm_registry(),
            pub_dev: default_pub_dev(),
            maven_search: default_maven_search(),
            image_registry: default_image_registry(),
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}
fn default_github_uploads() -> String {
    "https://uploads.github.com".to_string()
}
fn default_github_web() -> String {
    "https://github.com".to_string()
}
fn default_goproxy() -> String {
    "https://proxy.golang.org".to_string()
}
fn default_npm_registry() -> String {
    "https://registry.npmjs.org".to_string()
}
fn default_pub_dev() -> String {
    "https://pub.dev".to_string()
}
fn default_maven_search() -> String {
    "https://search.maven.org".to_string()
}
fn default_image_registry() -> String {
    "ghcr.io".to_string()
}

/// Release repository settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseConfig {
    /// GitHub account owning the release repository
    #[serde(default = "default_release_owner")]
    pub owner: String,

    #[serde(default = "default_release_repository")]
    pub repository: String,

    /// Value of the `org.opencontainers.image.source` label
    #[serde(default = "default_source_url")]
    pub source_url: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            owner: default_release_owner(),
            repository: default_release_repository(),
            source_url: default_source_url(),
        }
    }
}

fn default_release_owner() -> String {
    "bufbuild".to_string()
}
fn default_release_repository() -> String {
    "plugins".to_string()
}
fn default_source_url() -> String {
    "https://github.com/bufbuild/plugins".to_string()
}

/// Docker CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DockerConfig {
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Image namespace, overridden by `DOCKER_ORG`
    #[serde(default = "default_docker_org")]
    pub org: String,

    /// Upper bound on concurrent builds
    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            org: default_docker_org(),
            max_parallelism: default_max_parallelism(),
        }
    }
}

fn default_docker_binary() -> String {
    "docker".to_string()
}
fn default_docker_org() -> String {
    "bufbuild".to_string()
}
fn default_max_parallelism() -> usize {
    8
}
