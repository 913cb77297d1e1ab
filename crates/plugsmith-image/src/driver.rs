//! Seam between the release flow and container tooling

use crate::docker::DockerCli;
use crate::naming;
use crate::registry::RegistryClient;
use crate::types::ResolvedImage;
use async_trait::async_trait;
use plugsmith_core::error::Result;
use plugsmith_plugins::Plugin;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves and exports the image of a plugin
#[async_trait]
pub trait BuildDriver: Send + Sync {
    /// Registry image and image ID of `plugin`, `None` if it is not published
    async fn resolve(&self, plugin: &Plugin) -> Result<Option<ResolvedImage>>;

    /// Write the image as `image.tar` inside `dir` and return its path
    async fn export(&self, image: &ResolvedImage, dir: &Path) -> Result<PathBuf>;
}

/// Resolves published images in the registry and exports them with docker
pub struct RegistryDriver {
    registry: RegistryClient,
    docker: DockerCli,
    org: String,
}

impl RegistryDriver {
    pub fn new(registry: RegistryClient, docker: DockerCli, org: impl Into<String>) -> Self {
        Self {
            registry,
            docker,
            org: org.into(),
        }
    }
}

#[async_trait]
impl BuildDriver for RegistryDriver {
    async fn resolve(&self, plugin: &Plugin) -> Result<Option<ResolvedImage>> {
        let repository = naming::repository(&self.org, &plugin.identity);
        let resolved = self.registry.resolve(&repository, plugin.version()).await?;
        debug!(
            "Resolved {}:{} to {:?}",
            repository,
            plugin.version(),
            resolved.as_ref().map(|r| &r.registry_image)
        );
        Ok(resolved)
    }

    async fn export(&self, image: &ResolvedImage, dir: &Path) -> Result<PathBuf> {
        self.docker.pull(&image.registry_image).await?;
        self.docker.save(&image.image_id, dir).await
    }
}

/// Uses images already present in the local docker daemon
///
/// The image reference it resolves is a local tag rather than a registry
/// digest, so it serves packaging and never feeds a release manifest.
pub struct LocalDriver {
    docker: DockerCli,
}

impl LocalDriver {
    pub fn new(docker: DockerCli) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl BuildDriver for LocalDriver {
    async fn resolve(&self, plugin: &Plugin) -> Result<Option<ResolvedImage>> {
        let image = naming::image_name(plugin, self.docker.org());
        Ok(self
            .docker
            .image_id(&image)
            .await?
            .map(|image_id| ResolvedImage {
                registry_image: image,
                image_id,
            }))
    }

    async fn export(&self, image: &ResolvedImage, dir: &Path) -> Result<PathBuf> {
        self.docker.save(&image.image_id, dir).await
    }
}
