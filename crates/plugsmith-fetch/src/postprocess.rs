//! Post-processing for freshly materialized versions
//!
//! Lock files and module sums are regenerated with the ecosystem's own
//! tooling; the new versions can optionally be run through `make test`.

use crate::flow::CreatedPlugin;
use plugsmith_core::error::{IoResultExt, Result};
use plugsmith_core::process::CommandRunner;
use std::fs;
use std::path::Path;
use tokio::process::Command;
use tracing::info;

/// Runs the regeneration steps for each created plugin
pub struct PostProcessor {
    runner: CommandRunner,
    run_tests: bool,
}

impl PostProcessor {
    pub fn new(runner: CommandRunner) -> Self {
        Self {
            runner,
            run_tests: false,
        }
    }

    /// Also run `make test` over the created versions
    pub fn with_tests(mut self, run_tests: bool) -> Self {
        self.run_tests = run_tests;
        self
    }

    pub async fn run(&self, repo_root: &Path, created: &[CreatedPlugin]) -> Result<()> {
        for plugin in created {
            self.regenerate(&plugin.version_dir()).await?;
        }
        if self.run_tests && !created.is_empty() {
            self.make_test(repo_root, created).await?;
        }
        Ok(())
    }

    async fn regenerate(&self, dir: &Path) -> Result<()> {
        if dir.join("go.mod").is_file() {
            info!("Running go mod tidy in {}", dir.display());
            let mut cmd = Command::new("go");
            cmd.args(["mod", "tidy"]).current_dir(dir);
            self.runner.output(cmd).await?;
        }

        let lock = dir.join("package-lock.json");
        if lock.is_file() {
            fs::remove_file(&lock).with_path(&lock)?;
            info!("Regenerating package-lock.json in {}", dir.display());
            let mut cmd = Command::new("npm");
            cmd.arg("install").current_dir(dir);
            self.runner.output(cmd).await?;
        }
        Ok(())
    }

    async fn make_test(&self, repo_root: &Path, created: &[CreatedPlugin]) -> Result<()> {
        let selectors: Vec<String> = created.iter().map(CreatedPlugin::selector).collect();
        let mut cmd = Command::new("make");
        cmd.arg("test")
            .arg(format!("PLUGINS={}", selectors.join(",")))
            .env("ALLOW_EMPTY_PLUGIN_SUM", "true")
            .current_dir(repo_root);
        self.runner.status(cmd).await
    }
}
