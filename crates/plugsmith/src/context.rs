//! Per-invocation state shared by every command

use anyhow::{Context as _, Result};
use camino::Utf8Path;
use plugsmith_core::http::HttpClient;
use plugsmith_core::process::CommandRunner;
use plugsmith_core::{CancellationToken, HierarchicalConfigLoader, RuntimeConfig};
use plugsmith_image::{DockerCli, RegistryClient};
use plugsmith_plugins::selection::Selection;
use plugsmith_plugins::{find_all, Plugin};
use plugsmith_release::{load_public_key, GitHubClient, PluginRelease, Release};
use tracing::{info, warn};

use crate::cli::{ManifestSourceArgs, SelectionArgs};

pub struct Context {
    pub config: RuntimeConfig,
    pub cancel: CancellationToken,
}

impl Context {
    /// Load runtime configuration, from `config_file` when given
    pub fn load(config_file: Option<&Utf8Path>) -> Result<Self> {
        let mut loader =
            HierarchicalConfigLoader::new().context("Failed to locate config directory")?;
        if let Some(file) = config_file {
            loader = loader.with_file(file.to_path_buf());
        }
        let config = loader
            .load_runtime_config()
            .context("Failed to load runtime configuration")?;
        Ok(Self {
            config,
            cancel: CancellationToken::new(),
        })
    }

    /// HTTP client using the retry policy configured for `operation`
    pub fn http(&self, operation: &str) -> Result<HttpClient> {
        HttpClient::new(&self.config, operation, self.cancel.clone())
            .context("Failed to create HTTP client")
    }

    pub fn runner(&self) -> CommandRunner {
        CommandRunner::new(self.cancel.clone())
    }

    pub fn org(&self, org: Option<&str>) -> String {
        org.unwrap_or(&self.config.docker.org).to_string()
    }

    /// Docker CLI located on `PATH`
    pub fn docker(&self, org: Option<&str>) -> Result<DockerCli> {
        let docker = DockerCli::detect(&self.config.docker.binary, self.org(org), self.runner())?;
        Ok(docker.with_source_url(self.config.release.source_url.clone()))
    }

    pub fn registry(&self, token: Option<String>) -> Result<RegistryClient> {
        Ok(RegistryClient::new(self.http("registry")?, &self.config.endpoints.image_registry)
            .with_token(token))
    }

    pub fn github(&self, token: Option<String>) -> Result<GitHubClient> {
        Ok(GitHubClient::new(self.http("github")?, &self.config).with_token(token))
    }

    /// Release `tag`, or the latest release when `tag` is `None`
    pub async fn release(&self, github: &GitHubClient, tag: Option<&str>) -> Result<Release> {
        let release = match tag {
            Some(tag) => github.release_by_tag(tag).await?,
            None => github.latest_release().await?,
        };
        release.with_context(|| match tag {
            Some(tag) => format!("Release {} not found", tag),
            None => "No release found".to_string(),
        })
    }

    /// Download and verify the manifest of the requested release
    pub async fn manifest(
        &self,
        source: &ManifestSourceArgs,
        tag: Option<&str>,
    ) -> Result<(Release, Vec<PluginRelease>)> {
        let github = self.github(source.github_token.clone())?;
        let release = self.release(&github, tag).await?;

        let public_key = match &source.minisign_public_key {
            Some(key) => Some(load_public_key(key).context("Failed to load minisign public key")?),
            None => {
                warn!("No minisign public key given, skipping manifest verification");
                None
            }
        };

        let manifest = github
            .fetch_manifest(&release, public_key.as_ref())
            .await?
            .with_context(|| format!("Release {} has no plugin manifest", release.tag_name))?;
        info!(
            "Loaded {} plugins from release {}",
            manifest.releases.len(),
            release.tag_name
        );
        Ok((release, manifest.releases))
    }
}

/// Discover plugins under `root` and narrow them to the working set
pub fn select_plugins(root: &Utf8Path, selection: &SelectionArgs) -> Result<Vec<Plugin>> {
    let plugins = find_all(root.as_std_path())
        .with_context(|| format!("Failed to discover plugins under {}", root))?;
    let selection = Selection::from_inputs(
        selection.plugins.as_deref(),
        selection.any_modified.as_deref(),
        selection.all_modified_files.as_deref(),
    )?;
    let selected = selection.apply(&plugins)?;
    info!("Selected {} of {} plugins", selected.len(), plugins.len());
    Ok(selected)
}
