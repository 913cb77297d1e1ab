//! # plugsmith-fetch
//!
//! Finds upstream releases for every plugin source and materializes the
//! matching plugin version directories:
//! - `source.yaml` descriptor loading
//! - Upstream version clients (GitHub, Go proxy, npm, pub.dev, Maven)
//! - The `.github/docker` base-image catalog
//! - Copy-and-rewrite of a previous version directory
//! - The fetch flow and its post-processing steps

pub mod baseimage;
pub mod flow;
pub mod materialize;
pub mod postprocess;
pub mod source;
pub mod upstream;

pub use baseimage::BaseImages;
pub use flow::{CreatedPlugin, FetchFlow};
pub use materialize::Materializer;
pub use postprocess::PostProcessor;
pub use source::{Origin, SourceDescriptor};
pub use upstream::{CachingFetcher, UpstreamClient, VersionFetcher};
