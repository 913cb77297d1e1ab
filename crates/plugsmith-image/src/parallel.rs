//! Grouped, bounded-parallel image builds
//!
//! Plugins whose builds share a Bazel cache are grouped per version and
//! built one after another; groups run concurrently up to a limit. The
//! first failure cancels everything still running.

use crate::docker::DockerCli;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use plugsmith_core::error::{Error, Result};
use plugsmith_core::CancellationToken;
use plugsmith_plugins::Plugin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Concurrent builds beyond this ran out of memory in practice
pub const MAX_PARALLELISM: usize = 8;

const GRPC_SHARED: [&str; 6] = ["cpp", "csharp", "objc", "php", "python", "ruby"];
const PROTOBUF_SHARED: [&str; 9] = [
    "cpp", "csharp", "java", "kotlin", "objc", "php", "pyi", "python", "ruby",
];

/// What to do with each selected plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Build,
    Push,
}

/// Per-plugin image operations
#[async_trait]
pub trait ImageDriver: Send + Sync {
    async fn build(&self, plugin: &Plugin, cancel: &CancellationToken) -> Result<()>;
    async fn push(&self, plugin: &Plugin, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait]
impl ImageDriver for DockerCli {
    async fn build(&self, plugin: &Plugin, cancel: &CancellationToken) -> Result<()> {
        DockerCli::build(self, plugin, cancel).await
    }

    async fn push(&self, plugin: &Plugin, cancel: &CancellationToken) -> Result<()> {
        DockerCli::push(self, plugin, cancel).await
    }
}

/// Key of the group `plugin` is built in
pub fn group_key(plugin: &Plugin) -> String {
    let owner = plugin.identity.owner.as_str();
    let name = plugin.identity.plugin.as_str();
    let shared = match owner {
        "grpc" => GRPC_SHARED.contains(&name),
        "protocolbuffers" => PROTOBUF_SHARED.contains(&name),
        _ => false,
    };
    if shared {
        format!("{}/{}", owner, plugin.version())
    } else {
        plugin.identity.to_string()
    }
}

/// Group plugins by [`group_key`], keeping first-seen order
pub fn group<'a>(plugins: &'a [Plugin]) -> Vec<Vec<&'a Plugin>> {
    let mut keys: Vec<String> = Vec::new();
    let mut groups: Vec<Vec<&Plugin>> = Vec::new();
    for plugin in plugins {
        let key = group_key(plugin);
        match keys.iter().position(|k| *k == key) {
            Some(idx) => groups[idx].push(plugin),
            None => {
                keys.push(key);
                groups.push(vec![plugin]);
            }
        }
    }
    groups
}

/// Effective parallelism: the configured limit, capped by cores and [`MAX_PARALLELISM`]
pub fn parallelism(configured: usize) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    configured.clamp(1, MAX_PARALLELISM).min(cores)
}

/// Run `action` over `plugins`, group by group, with at most `limit` groups in flight
pub async fn run_grouped<D: ImageDriver>(
    driver: &D,
    plugins: &[Plugin],
    action: Action,
    limit: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let groups = group(plugins);
    debug!("Running {:?} over {} groups with limit {}", action, groups.len(), limit);

    let cancel = cancel.child_token();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = FuturesUnordered::new();

    for members in groups {
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        tasks.push(async move {
            let _permit = semaphore.acquire_owned().await.map_err(|_| Error::Cancelled)?;
            for plugin in members {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                match action {
                    Action::Build => driver.build(plugin, &cancel).await?,
                    Action::Push => driver.push(plugin, &cancel).await?,
                }
            }
            Ok::<(), Error>(())
        });
    }

    let mut first_error: Option<Error> = None;
    while let Some(result) = tasks.next().await {
        if let Err(err) = result {
            if !cancel.is_cancelled() {
                warn!("Stopping remaining work after failure: {}", err);
                cancel.cancel();
            }
            // Errors caused by our own cancellation are noise
            match &first_error {
                None => first_error = Some(err),
                Some(existing) if existing.is_cancelled() && !err.is_cancelled() => {
                    first_error = Some(err)
                }
                Some(_) => {}
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
