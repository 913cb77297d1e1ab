//! # plugsmith-core
//!
//! Core library for plugsmith providing:
//! - The shared error type
//! - `v`-prefixed semantic version helpers
//! - Digest and atomic-write utilities
//! - Retry execution engine with policy-based configuration
//! - Hierarchical runtime configuration
//! - Cancellable HTTP and subprocess helpers

pub mod cancel;
pub mod config;
pub mod error;
pub mod http;
pub mod process;
pub mod retry;
pub mod types;
pub mod utils;
pub mod version;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::RuntimeConfig;

/// Re-exported so downstream crates share one token type
pub use tokio_util::sync::CancellationToken;
