//! Restore command

use anyhow::{Context as _, Result};
use plugsmith_release::restore_release;

use crate::cli::RestoreArgs;
use crate::context::Context;
use crate::output;

pub async fn run(args: RestoreArgs, ctx: &Context) -> Result<()> {
    let (release, releases) = ctx.manifest(&args.source, Some(&args.tag)).await?;
    if args.dry_run {
        output::warning("DRY RUN MODE - tags are not pushed");
    }

    let registry = ctx.registry(args.source.github_token.clone())?;
    let docker = ctx.docker(None)?;
    let restored = restore_release(&releases, &registry, &docker, args.dry_run)
        .await
        .with_context(|| format!("Failed to restore release {}", release.tag_name))?;

    if restored.is_empty() {
        output::info(&format!("All tags already match release {}", release.tag_name));
        return Ok(());
    }
    output::header(&format!("Restored tags from {}", release.tag_name));
    for tag in &restored {
        output::kv(&tag.tag, &tag.restored);
    }
    Ok(())
}
