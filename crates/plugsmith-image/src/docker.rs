//! Docker CLI driver
//!
//! Every invocation goes through [`CommandRunner`], so a cancelled run
//! kills the docker client process.

use crate::dockerfile::read_build_stages;
use crate::naming;
use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::process::CommandRunner;
use plugsmith_core::CancellationToken;
use plugsmith_plugins::Plugin;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

/// Archive entry name of an exported image
pub const IMAGE_TAR: &str = "image.tar";

/// Thin wrapper over the `docker` executable
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: PathBuf,
    org: String,
    source_url: String,
    cache_dir: Option<PathBuf>,
    extra_args: Vec<String>,
    runner: CommandRunner,
}

impl DockerCli {
    /// Locate `binary` on `PATH`
    pub fn detect(binary: &str, org: impl Into<String>, runner: CommandRunner) -> Result<Self> {
        let binary = which::which(binary).map_err(|e| {
            Error::invalid_config(format!("docker executable {:?} not found: {}", binary, e))
        })?;
        debug!("Using docker at {}", binary.display());
        Ok(Self::new(binary, org, runner))
    }

    pub fn new(binary: impl Into<PathBuf>, org: impl Into<String>, runner: CommandRunner) -> Self {
        Self {
            binary: binary.into(),
            org: org.into(),
            source_url: String::new(),
            cache_dir: None,
            extra_args: Vec::new(),
            runner,
        }
    }

    /// Value of the `org.opencontainers.image.source` label
    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = url.into();
        self
    }

    /// Use a local buildx cache at `dir`
    pub fn with_cache_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.cache_dir = dir;
        self
    }

    /// Arguments appended to every build
    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    /// Arguments shared by every stage of a build
    pub fn build_args(&self, plugin: &Plugin) -> Vec<String> {
        let config = &plugin.config;
        let mut args: Vec<String> = vec!["buildx".into(), "build".into()];
        let labels = [
            format!("build.buf.plugins.config.owner={}", plugin.identity.owner),
            format!("build.buf.plugins.config.name={}", plugin.identity.plugin),
            format!("build.buf.plugins.config.version={}", plugin.version()),
            format!("org.opencontainers.image.source={}", self.source_url),
            format!(
                "org.opencontainers.image.description={}",
                config.description.as_deref().unwrap_or_default()
            ),
            format!(
                "org.opencontainers.image.licenses={}",
                config.spdx_license_id.as_deref().unwrap_or_default()
            ),
        ];
        for label in labels {
            args.push("--label".into());
            args.push(label);
        }
        args.push("--progress".into());
        args.push("plain".into());

        if let Some(cache) = &self.cache_dir {
            args.push("--cache-to".into());
            args.push(format!(
                "type=local,dest={},mode=max,compression=zstd",
                cache.display()
            ));
            args.push("--cache-from".into());
            args.push(format!("type=local,src={}", cache.display()));
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Build every named stage, then the final image
    pub async fn build(&self, plugin: &Plugin, cancel: &CancellationToken) -> Result<()> {
        let runner = CommandRunner::new(cancel.clone());
        let context = plugin.dir();
        let image = naming::image_name(plugin, &self.org);
        let common = self.build_args(plugin);

        if let Some(cache) = &self.cache_dir {
            std::fs::create_dir_all(cache).with_path(cache)?;
        }

        info!("Building {}", plugin);
        let start = Instant::now();
        for stage in read_build_stages(&context.join("Dockerfile"))? {
            let mut cmd = self.command();
            cmd.args(&common)
                .arg("--target")
                .arg(&stage)
                .arg("-t")
                .arg(naming::stage_image_name(&image, &stage))
                .arg(context);
            runner.output(cmd).await?;
        }

        let mut cmd = self.command();
        cmd.args(&common).arg("-t").arg(&image).arg(context);
        runner.output(cmd).await?;
        info!("Built {} in {}s", plugin, start.elapsed().as_secs());
        Ok(())
    }

    pub async fn push(&self, plugin: &Plugin, cancel: &CancellationToken) -> Result<()> {
        let image = naming::image_name(plugin, &self.org);
        info!("Pushing {}", image);
        let mut cmd = self.command();
        cmd.arg("push").arg(&image);
        CommandRunner::new(cancel.clone()).output(cmd).await?;
        Ok(())
    }

    pub async fn pull(&self, image: &str) -> Result<()> {
        info!("Pulling image: {}", image);
        let mut cmd = self.command();
        cmd.arg("pull").arg(image);
        self.runner.output(cmd).await.map(|_| ())
    }

    pub async fn tag(&self, source: &str, target: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("tag").arg(source).arg(target);
        self.runner.output(cmd).await.map(|_| ())
    }

    /// Push an arbitrary reference
    pub async fn push_image(&self, image: &str) -> Result<()> {
        info!("Pushing {}", image);
        let mut cmd = self.command();
        cmd.arg("push").arg(image);
        self.runner.output(cmd).await.map(|_| ())
    }

    /// `docker save <image_id> -o image.tar` inside `dir`
    pub async fn save(&self, image_id: &str, dir: &Path) -> Result<PathBuf> {
        let mut cmd = self.command();
        cmd.arg("save")
            .arg(image_id)
            .arg("-o")
            .arg(IMAGE_TAR)
            .current_dir(dir);
        self.runner.output(cmd).await?;
        Ok(dir.join(IMAGE_TAR))
    }

    /// Config digest of a local image, `None` if docker does not know it
    ///
    /// Any other failure, such as an unreachable daemon, is an error.
    pub async fn image_id(&self, image: &str) -> Result<Option<String>> {
        let mut cmd = self.command();
        cmd.args(["image", "inspect", "--format", "{{.Id}}"]).arg(image);
        match self.runner.output(cmd).await {
            Ok(out) => Ok(Some(out.trim().to_string()).filter(|id| !id.is_empty())),
            Err(Error::SubprocessFailure { output, .. }) if is_missing_image(&output) => {
                debug!("No local image {}: {}", image, output.trim());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn is_missing_image(output: &str) -> bool {
    output.contains("No such image") || output.contains("No such object")
}
