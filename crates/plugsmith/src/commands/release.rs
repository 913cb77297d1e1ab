//! Release command

use anyhow::{bail, Context as _, Result};
use chrono::Utc;
use plugsmith_image::RegistryDriver;
use plugsmith_plugins::find_all;
use plugsmith_release::{
    load_public_key, PluginRelease, ReleaseFlow, ReleaseLinks, ReleaseOptions, ReleaseOutcome,
    ReleaseSigner, ReleaseStatus,
};
use tracing::warn;

use crate::cli::ReleaseArgs;
use crate::context::Context;
use crate::output;

pub async fn run(args: ReleaseArgs, ctx: &Context) -> Result<()> {
    let signer = signer(&args)?;
    let public_key = args
        .source
        .minisign_public_key
        .as_deref()
        .map(load_public_key)
        .transpose()
        .context("Failed to load minisign public key")?;

    let token = args.source.github_token.clone();
    let github = ctx.github(token.clone())?;
    let org = ctx.org(args.org.as_deref());
    let docker = ctx.docker(Some(&org))?;
    let driver = RegistryDriver::new(ctx.registry(token)?, docker, org);

    let plugins = find_all(args.root.as_std_path())
        .with_context(|| format!("Failed to discover plugins under {}", args.root))?;

    let outcome = ReleaseFlow::new(&github, &driver, ReleaseLinks::from_config(&ctx.config))
        .with_signer(signer)
        .with_public_key(public_key)
        .with_options(ReleaseOptions {
            dry_run: args.dry_run,
            target_commitish: args.commitish,
            scratch_parent: None,
        })
        .with_cancel(ctx.cancel.clone())
        .run(&plugins, Utc::now())
        .await
        .context("Release failed")?;

    match outcome {
        ReleaseOutcome::Unchanged { previous_tag } => match previous_tag {
            Some(tag) => output::info(&format!("No changes to plugins since {}", tag)),
            None => output::info("No plugins to release"),
        },
        ReleaseOutcome::DryRun { tag, dir, releases } => {
            output::header(&format!("Release {} (dry run)", tag));
            summarize(&releases);
            output::kv("Assets", &dir.display().to_string());
        }
        ReleaseOutcome::Published { release, releases } => {
            output::header(&format!("Release {}", release.tag_name));
            summarize(&releases);
            output::success(&format!("Published release {}", release.tag_name));
        }
    }
    Ok(())
}

/// Secret key loaded only when a password is provided
fn signer(args: &ReleaseArgs) -> Result<Option<ReleaseSigner>> {
    match (&args.minisign_private_key, &args.minisign_private_key_password) {
        (Some(path), Some(password)) => ReleaseSigner::from_file(path.as_std_path(), password)
            .map(Some)
            .context("Failed to load minisign secret key"),
        (None, Some(_)) => bail!("MINISIGN_PRIVATE_KEY_PASSWORD is set but no --minisign-private-key was given"),
        (Some(path), None) => {
            warn!(
                "MINISIGN_PRIVATE_KEY_PASSWORD is not set, not signing with {}",
                path
            );
            Ok(None)
        }
        (None, None) => Ok(None),
    }
}

fn summarize(releases: &[PluginRelease]) {
    for release in releases.iter().filter(|r| r.status != ReleaseStatus::Existing) {
        output::kv(&format!("{}:{}", release.name, release.version), &release.status.to_string());
    }
}
