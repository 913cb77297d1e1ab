//! Package command
//!
//! Archives selected plugins from images in the local docker daemon, the
//! same way a release packages them.

use anyhow::{Context as _, Result};
use plugsmith_image::{BuildDriver, LocalDriver};
use plugsmith_release::{ReleaseLinks, ReleasePlanner};
use tracing::warn;

use crate::cli::PackageArgs;
use crate::context::{select_plugins, Context};
use crate::output;

pub async fn run(args: PackageArgs, ctx: &Context) -> Result<()> {
    let plugins = select_plugins(&args.root, &args.selection)?;
    let output_dir = args.output.as_std_path();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", args.output))?;

    let driver = LocalDriver::new(ctx.docker(args.org.as_deref())?);
    let links = ReleaseLinks::from_config(&ctx.config);
    let planner = ReleasePlanner::new(&driver, &links).with_cancel(ctx.cancel.clone());

    let mut packaged = 0;
    for plugin in &plugins {
        let Some(image) = driver.resolve(plugin).await? else {
            warn!("No local image for {}:{}, skipping", plugin.name(), plugin.version());
            continue;
        };
        let archive = planner
            .package(plugin, &image, output_dir)
            .await
            .with_context(|| format!("Failed to package {}", plugin.relpath))?;
        output::kv(&archive.path.display().to_string(), &archive.digest);
        packaged += 1;
    }

    output::success(&format!("Packaged {} plugins into {}", packaged, args.output));
    Ok(())
}
