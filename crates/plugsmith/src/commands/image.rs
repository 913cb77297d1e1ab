//! Build and push commands

use anyhow::{Context as _, Result};
use plugsmith_image::parallel::parallelism;
use plugsmith_image::{run_grouped, Action};

use crate::cli::ImageArgs;
use crate::context::{select_plugins, Context};
use crate::output;

pub async fn build(args: ImageArgs, ctx: &Context) -> Result<()> {
    execute(args, ctx, Action::Build).await
}

pub async fn push(args: ImageArgs, ctx: &Context) -> Result<()> {
    execute(args, ctx, Action::Push).await
}

async fn execute(args: ImageArgs, ctx: &Context, action: Action) -> Result<()> {
    let plugins = select_plugins(&args.root, &args.selection)?;
    if plugins.is_empty() {
        output::info("No plugins selected");
        return Ok(());
    }

    let docker = ctx
        .docker(args.org.as_deref())?
        .with_cache_dir(args.cache_dir.map(|dir| dir.into_std_path_buf()))
        .with_extra_args(args.docker_args);
    let limit = parallelism(args.parallelism.unwrap_or(ctx.config.docker.max_parallelism));

    let verb = match action {
        Action::Build => "Building",
        Action::Push => "Pushing",
    };
    let spinner = output::spinner(&format!("{} {} plugins", verb, plugins.len()));
    let result = run_grouped(&docker, &plugins, action, limit, &ctx.cancel).await;
    spinner.finish_and_clear();
    result.with_context(|| format!("{} plugins failed", verb))?;

    output::success(&format!("{} {} plugins done", verb, plugins.len()));
    Ok(())
}
