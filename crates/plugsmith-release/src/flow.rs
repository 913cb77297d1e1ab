//! End-to-end release: classify, write, sign and publish
//!
//! Everything is assembled in a scratch directory owned by the run. Nothing
//! becomes visible outside it until the final publish, and the directory is
//! removed afterwards unless the run is a dry run.

use crate::github::{GitHubClient, Release};
use crate::manifest::{encode_releases, PLUGIN_RELEASES_FILE, PLUGIN_RELEASES_SIGNATURE_FILE};
use crate::model::PluginRelease;
use crate::naming::{next_release_name, ReleaseLinks};
use crate::notes::release_body;
use crate::plan::ReleasePlanner;
use crate::signing::ReleaseSigner;
use chrono::{DateTime, Utc};
use minisign::PublicKey;
use plugsmith_core::error::{IoResultExt, Result};
use plugsmith_core::utils::write_atomic;
use plugsmith_image::BuildDriver;
use plugsmith_plugins::Plugin;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Release notes file written in dry-run mode
pub const RELEASE_NOTES_FILE: &str = "RELEASE.md";

/// Subdirectory holding the previous manifest for inspection; never uploaded
const PREVIOUS_DIR: &str = "previous";

/// How a release run ended
#[derive(Debug)]
pub enum ReleaseOutcome {
    /// No plugin is new or updated
    Unchanged { previous_tag: Option<String> },
    /// Assets were assembled in `dir` and kept
    DryRun {
        tag: String,
        dir: PathBuf,
        releases: Vec<PluginRelease>,
    },
    Published {
        release: Release,
        releases: Vec<PluginRelease>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    pub dry_run: bool,
    pub target_commitish: Option<String>,
    /// Parent of the scratch directory; the system temp dir when unset
    pub scratch_parent: Option<PathBuf>,
}

/// Scratch directory, removed on drop unless kept
enum Scratch {
    Owned(TempDir),
    Kept(PathBuf),
}

impl Scratch {
    fn path(&self) -> &Path {
        match self {
            Self::Owned(dir) => dir.path(),
            Self::Kept(path) => path,
        }
    }

    fn into_path(self) -> PathBuf {
        match self {
            Self::Owned(dir) => dir.keep(),
            Self::Kept(path) => path,
        }
    }
}

/// Drives one release against a repository
pub struct ReleaseFlow<'a> {
    github: &'a GitHubClient,
    driver: &'a dyn BuildDriver,
    links: ReleaseLinks,
    signer: Option<ReleaseSigner>,
    public_key: Option<PublicKey>,
    options: ReleaseOptions,
    cancel: CancellationToken,
}

impl<'a> ReleaseFlow<'a> {
    pub fn new(github: &'a GitHubClient, driver: &'a dyn BuildDriver, links: ReleaseLinks) -> Self {
        Self {
            github,
            driver,
            links,
            signer: None,
            public_key: None,
            options: ReleaseOptions::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Sign the new manifest with this key
    pub fn with_signer(mut self, signer: Option<ReleaseSigner>) -> Self {
        self.signer = signer;
        self
    }

    /// Verify the previous manifest with this key instead of the signer's
    pub fn with_public_key(mut self, public_key: Option<PublicKey>) -> Self {
        self.public_key = public_key;
        self
    }

    pub fn with_options(mut self, options: ReleaseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn verification_key(&self) -> Option<&PublicKey> {
        self.public_key
            .as_ref()
            .or_else(|| self.signer.as_ref().map(ReleaseSigner::public_key))
    }

    /// A dry run keeps its scratch directory on every exit path
    fn scratch_dir(&self) -> Result<Scratch> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("plugins-release");
        let dir = match &self.options.scratch_parent {
            Some(parent) => builder.tempdir_in(parent).with_path(parent)?,
            None => builder.tempdir().with_path(std::env::temp_dir())?,
        };
        info!("Created scratch dir: {}", dir.path().display());
        Ok(if self.options.dry_run {
            Scratch::Kept(dir.keep())
        } else {
            Scratch::Owned(dir)
        })
    }

    /// Release `plugins`, which must be in dependency order
    pub async fn run(&self, plugins: &[Plugin], now: DateTime<Utc>) -> Result<ReleaseOutcome> {
        let scratch = self.scratch_dir()?;
        let latest = self.github.latest_release().await?;

        let previous = match &latest {
            Some(release) => match self.github.fetch_manifest(release, self.verification_key()).await? {
                Some(manifest) => {
                    manifest.write_to(&scratch.path().join(PREVIOUS_DIR))?;
                    manifest.releases
                }
                None => Vec::new(),
            },
            None => {
                info!("No current release found");
                Vec::new()
            }
        };

        let previous_tag = latest.as_ref().map(|r| r.tag_name.clone());
        let tag = next_release_name(now, previous_tag.as_deref())?;

        let planner = ReleasePlanner::new(self.driver, &self.links).with_cancel(self.cancel.clone());
        let Some(releases) = planner
            .plan(plugins, &previous, &tag, now, scratch.path())
            .await?
        else {
            match &previous_tag {
                Some(previous) => info!("No changes to plugins since {}", previous),
                None => info!("No changes to plugins, not creating initial release"),
            }
            return Ok(ReleaseOutcome::Unchanged { previous_tag });
        };

        let manifest = encode_releases(&releases)?;
        write_atomic(&scratch.path().join(PLUGIN_RELEASES_FILE), &manifest)?;
        let public_key = self.sign(scratch.path(), &manifest)?;
        let body = release_body(&tag, &releases, &self.links, public_key.as_deref());

        if self.options.dry_run {
            write_atomic(&scratch.path().join(RELEASE_NOTES_FILE), body.as_bytes())?;
            let dir = scratch.into_path();
            info!("Skipping GitHub release creation in dry-run mode");
            info!("Release assets created in {}", dir.display());
            return Ok(ReleaseOutcome::DryRun { tag, dir, releases });
        }

        let release = self
            .github
            .publish(
                &tag,
                &body,
                self.options.target_commitish.as_deref(),
                scratch.path(),
            )
            .await?;
        Ok(ReleaseOutcome::Published { release, releases })
    }

    /// Write the detached signature; returns the base64 public key when signed
    fn sign(&self, dir: &Path, manifest: &[u8]) -> Result<Option<String>> {
        let Some(signer) = &self.signer else {
            info!("Skipping signing of {}", PLUGIN_RELEASES_FILE);
            return Ok(None);
        };
        info!("Signing {}", PLUGIN_RELEASES_FILE);
        let signature = signer.sign(manifest)?;
        write_atomic(&dir.join(PLUGIN_RELEASES_SIGNATURE_FILE), signature.as_bytes())?;
        Ok(Some(signer.public_key().to_base64()))
    }
}
