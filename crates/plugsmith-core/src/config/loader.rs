//! Hierarchical configuration loader with precedence
//!
//! Loads configuration from these sources, lowest precedence first:
//! 1. Embedded defaults (built into binary)
//! 2. Runtime config file (`~/.config/plugsmith/runtime.yaml` or `--config`)
//! 3. Environment variables (`PLUGSMITH_*` prefix)
//! 4. CLI flags (handled by caller)

use crate::error::{Error, IoResultExt, Result};
use crate::types::{RetryPoliciesConfig, RuntimeConfig};
use camino::{Utf8Path, Utf8PathBuf};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::env;
use std::fs;

/// Embedded configuration files
#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/../../embedded/config/"]
#[prefix = ""]
struct EmbeddedConfigs;

const RUNTIME_FILE: &str = "runtime.yaml";

/// Configuration hierarchy loader
pub struct HierarchicalConfigLoader {
    config_dir: Utf8PathBuf,
    /// Explicit file that replaces `<config_dir>/runtime.yaml`
    config_file: Option<Utf8PathBuf>,
}

impl HierarchicalConfigLoader {
    /// Create a loader rooted at the user's config directory
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::invalid_config("Could not determine config directory"))?;
        let config_dir = Utf8PathBuf::from_path_buf(base.join("plugsmith"))
            .map_err(|p| Error::invalid_config(format!("Non UTF-8 config path: {}", p.display())))?;
        Ok(Self::with_dir(config_dir))
    }

    /// Create a loader with a custom config directory
    pub fn with_dir(config_dir: Utf8PathBuf) -> Self {
        Self {
            config_dir,
            config_file: None,
        }
    }

    /// Read overrides from an explicit file instead of the config directory
    pub fn with_file(mut self, file: Utf8PathBuf) -> Self {
        self.config_file = Some(file);
        self
    }

    /// Load runtime configuration with hierarchical precedence
    pub fn load_runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = Self::load_embedded_config::<RuntimeConfig>("runtime-defaults.yaml")?;

        match &self.config_file {
            Some(file) => {
                // An explicit file must exist
                let overlay = Self::load_yaml_file::<RuntimeConfig>(file)?;
                config = Self::merge_runtime_config(config, overlay);
            }
            None => {
                let path = self.config_dir.join(RUNTIME_FILE);
                if path.exists() {
                    let overlay = Self::load_yaml_file::<RuntimeConfig>(&path)?;
                    config = Self::merge_runtime_config(config, overlay);
                }
            }
        }

        Self::apply_env_overrides(config)
    }

    fn load_embedded_config<T: DeserializeOwned>(filename: &str) -> Result<T> {
        let embedded_file = EmbeddedConfigs::get(filename).ok_or_else(|| {
            Error::invalid_config(format!("Embedded config not found: {}", filename))
        })?;

        let content = std::str::from_utf8(&embedded_file.data).map_err(|_| {
            Error::invalid_config(format!("Invalid UTF-8 in embedded config: {}", filename))
        })?;

        serde_yaml_ng::from_str(content).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to parse embedded config {}: {}",
                filename, e
            ))
        })
    }

    fn load_yaml_file<T: DeserializeOwned>(path: &Utf8Path) -> Result<T> {
        let content = fs::read_to_string(path).with_path(path)?;
        serde_yaml_ng::from_str(&content)
            .map_err(|e| Error::invalid_config(format!("Failed to parse {}: {}", path, e)))
    }

    /// Merge two runtime configs (base is overridden by overlay)
    fn merge_runtime_config(base: RuntimeConfig, overlay: RuntimeConfig) -> RuntimeConfig {
        RuntimeConfig {
            network: overlay.network,
            retry_policies: Self::merge_retry_policies(base.retry_policies, overlay.retry_policies),
            endpoints: overlay.endpoints,
            release: overlay.release,
            docker: overlay.docker,
        }
    }

    fn merge_retry_policies(
        mut base: RetryPoliciesConfig,
        overlay: RetryPoliciesConfig,
    ) -> RetryPoliciesConfig {
        for (key, policy) in overlay.operations {
            base.operations.insert(key, policy);
        }
        base.default = overlay.default;
        base
    }

    fn apply_env_overrides(mut config: RuntimeConfig) -> Result<RuntimeConfig> {
        if let Ok(val) = env::var("PLUGSMITH_HTTP_TIMEOUT_SECS") {
            config.network.http_timeout_secs = val.parse().map_err(|_| {
                Error::invalid_config("PLUGSMITH_HTTP_TIMEOUT_SECS must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("PLUGSMITH_MAX_PARALLELISM") {
            config.docker.max_parallelism = val.parse().map_err(|_| {
                Error::invalid_config("PLUGSMITH_MAX_PARALLELISM must be a valid number")
            })?;
        }

        if let Ok(val) = env::var("PLUGSMITH_RETRY_MAX_ATTEMPTS") {
            config.retry_policies.default.max_attempts = val.parse().map_err(|_| {
                Error::invalid_config("PLUGSMITH_RETRY_MAX_ATTEMPTS must be a valid number")
            })?;
        }

        // Endpoint overrides let CI point flows at mirrors
        let endpoints = [
            ("PLUGSMITH_GITHUB_API", &mut config.endpoints.github_api),
            ("PLUGSMITH_GITHUB_UPLOADS", &mut config.endpoints.github_uploads),
            ("PLUGSMITH_GOPROXY", &mut config.endpoints.goproxy),
            ("PLUGSMITH_NPM_REGISTRY", &mut config.endpoints.npm_registry),
            ("PLUGSMITH_PUB_DEV", &mut config.endpoints.pub_dev),
            ("PLUGSMITH_MAVEN_SEARCH", &mut config.endpoints.maven_search),
            ("PLUGSMITH_IMAGE_REGISTRY", &mut config.endpoints.image_registry),
        ];
        for (key, slot) in endpoints {
            if let Ok(val) = env::var(key) {
                *slot = val.trim_end_matches('/').to_string();
            }
        }

        if let Ok(val) = env::var("PLUGSMITH_RELEASE_OWNER") {
            config.release.owner = val;
        }

        if let Ok(val) = env::var("PLUGSMITH_RELEASE_REPOSITORY") {
            config.release.repository = val;
        }

        if let Ok(val) = env::var("PLUGSMITH_DOCKER_BINARY") {
            config.docker.binary = val;
        }

        Ok(config)
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }
}
