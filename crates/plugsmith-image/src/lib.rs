//! # plugsmith-image
//!
//! Container image handling for plugin releases:
//! - Image naming per owner, plugin and host architecture
//! - Build-stage discovery in plugin Dockerfiles
//! - OCI registry resolution of published images (GHCR token exchange,
//!   index to `linux/amd64` manifest, digests recomputed from bytes)
//! - A docker CLI driver and a grouped, bounded-parallel build runner
//! - The [`BuildDriver`] seam consumed by the release flow

pub mod docker;
pub mod dockerfile;
pub mod driver;
pub mod naming;
pub mod parallel;
pub mod registry;
pub mod types;

pub use docker::DockerCli;
pub use driver::{BuildDriver, LocalDriver, RegistryDriver};
pub use parallel::{run_grouped, Action, ImageDriver};
pub use registry::RegistryClient;
pub use types::{ImageManifest, ResolvedImage};
