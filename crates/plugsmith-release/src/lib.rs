//! # plugsmith-release
//!
//! Everything between built plugin images and a published GitHub release:
//! - The `plugin-releases.json` manifest model, its deterministic encoding and
//!   minisign signatures
//! - Classification of on-disk plugins against the previous manifest and
//!   packaging of changed plugins as reproducible archives
//! - Release naming, release notes and the GitHub publisher
//! - Verified archive downloads, registry tag restore and the
//!   latest-plugins view used by downstream tooling

pub mod archive;
pub mod download;
pub mod flow;
pub mod github;
pub mod latest;
pub mod manifest;
pub mod model;
pub mod naming;
pub mod notes;
pub mod plan;
pub mod restore;
pub mod signing;

pub use archive::{create_archive, PluginArchive};
pub use download::{DownloadOutcome, PluginDownloader};
pub use flow::{ReleaseFlow, ReleaseOptions, ReleaseOutcome};
pub use github::{GitHubClient, PublishedManifest, Release};
pub use latest::latest_plugins_and_dependencies;
pub use manifest::{encode_releases, load_releases, PLUGIN_RELEASES_FILE, PLUGIN_RELEASES_SIGNATURE_FILE};
pub use model::{PluginRelease, PluginReleases, ReleaseStatus};
pub use naming::{next_release_name, ReleaseLinks};
pub use notes::release_body;
pub use plan::ReleasePlanner;
pub use restore::{restore_release, RestoredTag};
pub use signing::{load_public_key, ReleaseSigner};
