//! Runtime configuration loading

mod loader;

pub use loader::HierarchicalConfigLoader;
