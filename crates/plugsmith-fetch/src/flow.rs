//! Fetch flow: resolve upstream versions and materialize what is missing

use crate::baseimage::{find_base_image_dir, BaseImages};
use crate::materialize::Materializer;
use crate::source::{gather, SourceDescriptor};
use crate::upstream::VersionFetcher;
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::version;
use plugsmith_plugins::selection::latest_versions_by_name;
use plugsmith_plugins::{find_all, PluginConfig, PLUGIN_FILE};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A version directory created by the fetch flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPlugin {
    /// Owner directory name, e.g. `bufbuild`
    pub org: String,
    /// Plugin directory name, e.g. `connect-go`
    pub name: String,
    pub plugin_dir: PathBuf,
    pub previous_version: String,
    pub new_version: String,
}

impl CreatedPlugin {
    /// `<org>/<name>:<new_version>`, the form `make test PLUGINS=` expects
    pub fn selector(&self) -> String {
        format!("{}/{}:{}", self.org, self.name, self.new_version)
    }

    pub fn version_dir(&self) -> PathBuf {
        self.plugin_dir.join(&self.new_version)
    }
}

/// Drives source gathering, upstream resolution and materialization
pub struct FetchFlow<F> {
    fetcher: F,
    cancel: CancellationToken,
}

impl<F: VersionFetcher> FetchFlow<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run the flow over every source under `root`
    pub async fn run(&self, root: &Path) -> Result<Vec<CreatedPlugin>> {
        let root = std::path::absolute(root).with_path(root)?;

        let images = BaseImages::load(&find_base_image_dir(&root)?)?;
        info!("Loaded {} tracked base images", images.len());

        let plugins = find_all(&root)?;
        let mut sources = gather(&root)?;
        order_by_plugin_dirs(&mut sources, plugins.iter().filter_map(|p| p.dir().parent()));

        let mut materializer = Materializer::new(&images, &latest_versions_by_name(&plugins));
        let mut created = Vec::new();

        for source in &sources {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if source.disabled {
                info!("Skipping disabled source {}", source.path.display());
                continue;
            }

            let latest = match self.fetcher.fetch(source).await {
                Ok(v) => v,
                Err(e) if e.is_prerelease() => {
                    info!("Skipping {}: {}", source.path.display(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let plugin_dir = source.plugin_dir();
            let target = plugin_dir.join(&latest);
            if target.exists() {
                debug!("{} already exists", target.display());
                continue;
            }

            let previous = latest_version_in_dir(plugin_dir)?;
            let version_dir = materializer.create_version(plugin_dir, &previous, &latest)?;
            info!(
                "Created {} from {}",
                version_dir.display(),
                previous
            );

            let descriptor = version_dir.join(PLUGIN_FILE);
            if descriptor.is_file() {
                let bytes = fs::read(&descriptor).with_path(&descriptor)?;
                let config = PluginConfig::parse(&bytes, &descriptor)?;
                materializer.record_latest(&config.name, &latest);
            }

            created.push(created_record(plugin_dir, &previous, &latest));
        }

        Ok(created)
    }
}

fn created_record(plugin_dir: &Path, previous: &str, new: &str) -> CreatedPlugin {
    let base = |p: Option<&Path>| {
        p.and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    CreatedPlugin {
        org: base(plugin_dir.parent()),
        name: base(Some(plugin_dir)),
        plugin_dir: plugin_dir.to_path_buf(),
        previous_version: previous.to_string(),
        new_version: new.to_string(),
    }
}

/// Stable sort of descriptors by the first position of their plugin directory
///
/// Descriptors whose directory holds no plugin sort last.
fn order_by_plugin_dirs<'a, I>(sources: &mut [SourceDescriptor], ordered_dirs: I)
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut rank: HashMap<&Path, usize> = HashMap::new();
    for (idx, dir) in ordered_dirs.into_iter().enumerate() {
        rank.entry(dir).or_insert(idx);
    }
    let ranks: Vec<usize> = sources
        .iter()
        .map(|s| rank.get(s.plugin_dir()).copied().unwrap_or(usize::MAX))
        .collect();
    let mut indexed: Vec<(usize, SourceDescriptor)> =
        ranks.into_iter().zip(sources.iter().cloned()).collect();
    indexed.sort_by_key(|(r, _)| *r);
    for (slot, (_, source)) in sources.iter_mut().zip(indexed) {
        *slot = source;
    }
}

/// Greatest semver-named subdirectory of `dir`
pub fn latest_version_in_dir(dir: &Path) -> Result<String> {
    let mut versions = Vec::new();
    for entry in fs::read_dir(dir).with_path(dir)? {
        let entry = entry.with_path(dir)?;
        if entry.file_type().with_path(entry.path())?.is_dir() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if version::is_valid(&name) {
                versions.push(name);
            }
        }
    }
    version::max(versions.iter().map(String::as_str))
        .map(str::to_string)
        .ok_or_else(|| Error::no_versions(dir.display().to_string()))
}
