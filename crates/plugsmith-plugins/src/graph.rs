//! Dependency ordering using round-based resolution
//!
//! Each round resolves every node whose in-set dependencies are already
//! resolved. Pins naming a plugin that is absent from the set are external and
//! do not constrain the order. A round that resolves nothing means the
//! remaining nodes form a cycle.

use crate::manifest::Plugin;
use plugsmith_core::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Anything that can be ordered by its dependency pins
pub trait DependencyNode {
    /// Plugin name, with or without the registry segment
    fn node_name(&self) -> &str;

    fn node_version(&self) -> &str;

    /// Raw `name:version` pins
    fn node_pins(&self) -> Vec<String>;

    fn node_label(&self) -> String {
        format!("{}:{}", self.node_name(), self.node_version())
    }
}

impl DependencyNode for Plugin {
    fn node_name(&self) -> &str {
        self.name()
    }

    fn node_version(&self) -> &str {
        self.version()
    }

    fn node_pins(&self) -> Vec<String> {
        self.config.deps.iter().map(|d| d.plugin.clone()).collect()
    }
}

/// Strip the registry segment: `buf.build/acme/foo` becomes `acme/foo`
pub fn normalize_name(name: &str) -> &str {
    if name.matches('/').count() >= 2 {
        name.split_once('/').map(|(_, rest)| rest).unwrap_or(name)
    } else {
        name
    }
}

/// Order `nodes` so every in-set dependency precedes its dependents
///
/// The order is stable: nodes resolved in the same round keep their input
/// order.
pub fn sort_by_dependency_order<T: DependencyNode>(nodes: Vec<T>) -> Result<Vec<T>> {
    let known: HashSet<String> = nodes
        .iter()
        .map(|n| normalize_name(n.node_name()).to_string())
        .collect();

    let mut pending = nodes;
    let mut resolved: Vec<T> = Vec::with_capacity(pending.len());
    let mut resolved_keys: HashSet<String> = HashSet::new();
    let mut reported: HashSet<String> = HashSet::new();

    while !pending.is_empty() {
        let before = pending.len();
        let mut unresolved = Vec::new();

        for node in pending {
            let mut ready = true;
            for pin in node.node_pins() {
                let (name, version) = pin.split_once(':').ok_or_else(|| {
                    Error::malformed_manifest(
                        Path::new(&node.node_label()),
                        format!("invalid plugin dependency: {}", pin),
                    )
                })?;
                let name = normalize_name(name);
                if !known.contains(name) {
                    if reported.insert(format!("{} -> {}", node.node_label(), pin)) {
                        info!("Ignoring external dependency {} of {}", pin, node.node_label());
                    }
                    continue;
                }
                if !resolved_keys.contains(&format!("{}:{}", name, version)) {
                    ready = false;
                    break;
                }
            }

            if ready {
                resolved_keys.insert(format!(
                    "{}:{}",
                    normalize_name(node.node_name()),
                    node.node_version()
                ));
                resolved.push(node);
            } else {
                unresolved.push(node);
            }
        }

        if unresolved.len() == before {
            return Err(Error::dependency_cycle(
                unresolved.iter().map(|n| n.node_label()),
            ));
        }
        pending = unresolved;
    }

    Ok(resolved)
}
