//! Download command

use anyhow::{Context as _, Result};
use plugsmith_release::{DownloadOutcome, PluginDownloader};

use crate::cli::DownloadArgs;
use crate::context::Context;
use crate::output;

pub async fn run(args: DownloadArgs, ctx: &Context) -> Result<()> {
    let (release, releases) = ctx.manifest(&args.source, args.release_tag.as_deref()).await?;

    let downloader = PluginDownloader::new(ctx.http("download")?);
    let spinner = output::spinner(&format!(
        "Downloading {} plugins from {}",
        releases.len(),
        release.tag_name
    ));
    let result = downloader.download_all(&releases, args.dir.as_std_path()).await;
    spinner.finish_and_clear();
    let outcomes = result.with_context(|| format!("Failed to download release {}", release.tag_name))?;

    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, DownloadOutcome::Skipped(_)))
        .count();
    output::success(&format!(
        "Downloaded {} plugins into {} ({} already present)",
        outcomes.len() - skipped,
        args.dir,
        skipped
    ));
    Ok(())
}
