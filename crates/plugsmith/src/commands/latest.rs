//! Latest command

use anyhow::{Context as _, Result};
use plugsmith_release::{latest_plugins_and_dependencies, PluginReleases};

use crate::cli::LatestArgs;
use crate::context::Context;

pub async fn run(args: LatestArgs, ctx: &Context) -> Result<()> {
    let (_, releases) = ctx.manifest(&args.source, args.release_tag.as_deref()).await?;
    let releases = latest_plugins_and_dependencies(&releases)?;
    let json = serde_json::to_string_pretty(&PluginReleases { releases })
        .context("Failed to encode latest plugins")?;
    println!("{}", json);
    Ok(())
}
