//! Classifying plugins against the previous release
//!
//! Every on-disk plugin is looked up in the previous manifest by
//! `(owner/name, version)`. A plugin whose image ID and descriptor digest both
//! match its incumbent is carried over; anything else gets a fresh archive and
//! is marked new or updated. Entries with no plugin on disk stay in the
//! manifest untouched.

use crate::archive::{self, PluginArchive};
use crate::manifest::index_releases;
use crate::model::{PluginRelease, ReleaseStatus};
use crate::naming::ReleaseLinks;
use chrono::{DateTime, Timelike, Utc};
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::utils::digest_file;
use plugsmith_image::{naming, BuildDriver, ResolvedImage};
use plugsmith_plugins::Plugin;
use std::collections::HashSet;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Builds the next manifest from the plugins on disk
pub struct ReleasePlanner<'a> {
    driver: &'a dyn BuildDriver,
    links: &'a ReleaseLinks,
    cancel: CancellationToken,
}

impl<'a> ReleasePlanner<'a> {
    pub fn new(driver: &'a dyn BuildDriver, links: &'a ReleaseLinks) -> Self {
        Self {
            driver,
            links,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Classify `plugins` (in dependency order) against `previous`
    ///
    /// Archives for new and updated plugins are written to `scratch_dir`.
    /// Returns `None` when nothing is new or updated.
    pub async fn plan(
        &self,
        plugins: &[Plugin],
        previous: &[PluginRelease],
        tag: &str,
        now: DateTime<Utc>,
        scratch_dir: &Path,
    ) -> Result<Option<Vec<PluginRelease>>> {
        let incumbents = index_releases(previous)?;
        let now = now.with_nanosecond(0).unwrap_or(now);
        let mut releases = Vec::with_capacity(plugins.len());
        let mut changed = 0usize;
        let mut seen = HashSet::with_capacity(plugins.len());

        for plugin in plugins {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let name = format!("{}/{}", plugin.identity.owner, plugin.identity.plugin);
            let yaml_digest = digest_file(&plugin.path)?;
            let dependencies = plugin.dependency_pins()?;

            let Some(image) = self.driver.resolve(plugin).await? else {
                warn!(
                    "Unable to detect registry image and image ID for plugin {}:{}",
                    name,
                    plugin.version()
                );
                continue;
            };

            let key = (name.clone(), plugin.version().to_string());
            let incumbent = incumbents.get(&key);
            seen.insert(key);
            if let Some(existing) = incumbent.filter(|r| {
                r.image_id == image.image_id && r.yaml_digest == yaml_digest
            }) {
                info!("Plugin {}:{} unchanged", name, plugin.version());
                let mut carried = (*existing).clone();
                carried.dependencies = dependencies;
                carried.status = ReleaseStatus::Existing;
                releases.push(carried);
                continue;
            }

            let status = if incumbent.is_some() {
                ReleaseStatus::Updated
            } else {
                ReleaseStatus::New
            };
            let archive = self.package(plugin, &image, scratch_dir).await?;
            let zip_name = naming::zip_name(plugin);
            info!("Plugin {}:{} {}", name, plugin.version(), status);

            changed += 1;
            releases.push(PluginRelease {
                name,
                version: plugin.version().to_string(),
                zip_digest: archive.digest,
                yaml_digest,
                image_id: image.image_id,
                registry_image: image.registry_image,
                release_tag: tag.to_string(),
                url: self.links.asset_url(tag, &zip_name),
                last_updated: now,
                dependencies,
                status,
            });
        }

        if changed == 0 {
            return Ok(None);
        }
        releases.extend(
            previous
                .iter()
                .filter(|r| !seen.contains(&(r.name.clone(), r.version.clone())))
                .map(|r| PluginRelease {
                    status: ReleaseStatus::Existing,
                    ..r.clone()
                }),
        );
        releases.sort_by(PluginRelease::manifest_order);
        Ok(Some(releases))
    }

    /// Export the image into a scratch subdirectory and archive it with the descriptor
    pub async fn package(
        &self,
        plugin: &Plugin,
        image: &ResolvedImage,
        out_dir: &Path,
    ) -> Result<PluginArchive> {
        let zip_name = naming::zip_name(plugin);
        let stem = zip_name.trim_end_matches(".zip");
        let scratch = tempfile::Builder::new()
            .prefix(stem)
            .tempdir_in(out_dir)
            .with_path(out_dir)?;
        let image_tar = self.driver.export(image, scratch.path()).await?;
        archive::create_archive(out_dir, &zip_name, &[plugin.path.as_path(), image_tar.as_path()])
    }
}
