//! Re-pointing registry tags at the images recorded in a release

use crate::model::PluginRelease;
use plugsmith_core::error::{Error, Result};
use plugsmith_image::{naming, DockerCli, RegistryClient};
use tracing::info;

/// A tag that was moved back to its released image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredTag {
    /// `<host>/<repository>:<version>`
    pub tag: String,
    /// Image the tag pointed at before, if it existed
    pub previous: Option<String>,
    /// Image recorded in the manifest
    pub restored: String,
    pub pushed: bool,
}

/// Restore every tag whose current image differs from the manifest
///
/// With `dry_run` the images are pulled and tagged locally but not pushed.
pub async fn restore_release(
    releases: &[PluginRelease],
    registry: &RegistryClient,
    docker: &DockerCli,
    dry_run: bool,
) -> Result<Vec<RestoredTag>> {
    let mut restored = Vec::new();
    for release in releases {
        let (base, _) = naming::split_digest(&release.registry_image).ok_or_else(|| {
            Error::malformed_digest(release.registry_image.as_str())
        })?;
        let repository = base
            .strip_prefix(registry.host())
            .map(|rest| rest.trim_start_matches('/'))
            .ok_or_else(|| {
                Error::upstream(
                    &release.registry_image,
                    format!("image is not hosted on {}", registry.host()),
                )
            })?;

        let current = registry
            .resolve(repository, &release.version)
            .await?
            .map(|image| image.registry_image);
        if current.as_deref() == Some(release.registry_image.as_str()) {
            continue;
        }

        let tag = naming::registry_reference(registry.host(), repository, &release.version);
        info!(
            "Updating image tag {} to point from {} to {}",
            tag,
            current.as_deref().unwrap_or("<missing>"),
            release.registry_image
        );
        docker.pull(&release.registry_image).await?;
        docker.tag(&release.registry_image, &tag).await?;
        if !dry_run {
            docker.push_image(&tag).await?;
        }
        restored.push(RestoredTag {
            tag,
            previous: current,
            restored: release.registry_image.clone(),
            pushed: !dry_run,
        });
    }
    Ok(restored)
}
