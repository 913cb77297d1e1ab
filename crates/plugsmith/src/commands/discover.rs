//! Discover command

use anyhow::Result;
use plugsmith_plugins::Plugin;

use crate::cli::DiscoverArgs;
use crate::context::select_plugins;

pub fn run(args: DiscoverArgs) -> Result<()> {
    let plugins = select_plugins(&args.root, &args.selection)?;
    for plugin in &plugins {
        println!("{}", render(plugin, &args));
    }
    Ok(())
}

fn render(plugin: &Plugin, args: &DiscoverArgs) -> String {
    if args.names {
        format!("{}:{}", plugin.identity.short_name(), plugin.version())
    } else if args.relative {
        plugin.relpath.clone()
    } else {
        plugin.path.display().to_string()
    }
}
