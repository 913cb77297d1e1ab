//! Fetch command
//!
//! Resolves upstream versions for every source descriptor, materializes
//! the missing version directories and regenerates lock files in them.

use anyhow::{Context as _, Result};
use plugsmith_fetch::baseimage::find_base_image_dir;
use plugsmith_fetch::{CachingFetcher, FetchFlow, PostProcessor, UpstreamClient};
use std::path::{Path, PathBuf};

use crate::cli::FetchArgs;
use crate::context::Context;
use crate::output;

pub async fn run(args: FetchArgs, ctx: &Context) -> Result<()> {
    let root = args.root.as_std_path();
    let client = UpstreamClient::new(ctx.http("upstream")?, ctx.config.endpoints.clone())
        .with_github_token(args.github_token.clone());
    let flow = FetchFlow::new(CachingFetcher::new(client)).with_cancel(ctx.cancel.clone());

    let created = flow
        .run(root)
        .await
        .with_context(|| format!("Failed to fetch plugins under {}", args.root))?;
    if created.is_empty() {
        output::info("No new plugin versions");
        return Ok(());
    }

    output::header("Created plugin versions");
    for plugin in &created {
        output::kv(
            &format!("{}/{}", plugin.org, plugin.name),
            &format!("{} -> {}", plugin.previous_version, plugin.new_version),
        );
    }

    if args.no_post_process {
        return Ok(());
    }

    let repo_root = repository_root(root)?;
    let spinner = output::spinner("Regenerating dependencies");
    let result = PostProcessor::new(ctx.runner())
        .with_tests(args.run_tests)
        .run(&repo_root, &created)
        .await;
    spinner.finish_and_clear();
    result.context("Post-processing failed")?;

    output::success(&format!("Created {} plugin versions", created.len()));
    Ok(())
}

/// Directory holding `.github`, where `make test` runs
fn repository_root(root: &Path) -> Result<PathBuf> {
    let docker_dir = find_base_image_dir(root)?;
    docker_dir
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .with_context(|| format!("{} has no repository root", docker_dir.display()))
}
