//! # plugsmith-plugins
//!
//! Loads `buf.plugin.yaml` descriptors from a plugins tree, orders them so
//! every dependency precedes its dependents, and narrows the set to the
//! plugins a CI job should act on.

pub mod discovery;
pub mod graph;
pub mod manifest;
pub mod selection;

pub use discovery::{find_all, walk};
pub use graph::{normalize_name, sort_by_dependency_order, DependencyNode};
pub use manifest::{Dependency, Plugin, PluginConfig, PluginIdentity, PLUGIN_FILE};
pub use selection::{ChangedFiles, IncludePlugin, Selection};
