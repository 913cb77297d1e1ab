//! CLI argument parsing with clap

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// plugsmith - build, package and release remote code-generation plugins
#[derive(Parser, Debug)]
#[command(name = "plugsmith")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a runtime.yaml overriding the built-in defaults
    #[arg(short, long, global = true, env = "PLUGSMITH_CONFIG")]
    pub config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the selected plugins in dependency order
    Discover(DiscoverArgs),

    /// Create version directories for new upstream releases
    Fetch(FetchArgs),

    /// Build plugin images
    Build(ImageArgs),

    /// Push plugin images
    Push(ImageArgs),

    /// Package plugins from local images into archives
    Package(PackageArgs),

    /// Publish a GitHub release of every new or updated plugin
    Release(ReleaseArgs),

    /// Print the latest plugins and their dependencies as JSON
    Latest(LatestArgs),

    /// Download every plugin archive of a release
    Download(DownloadArgs),

    /// Re-point registry tags at the images recorded in a release
    Restore(RestoreArgs),
}

/// Inputs choosing the working set
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Plugins to select: `all`, or names with an optional `:version` or `:latest`
    #[arg(long, env = "PLUGINS")]
    pub plugins: Option<String>,

    /// Whether any file changed (from the changed-files action)
    #[arg(long, env = "ANY_MODIFIED")]
    pub any_modified: Option<String>,

    /// Whitespace-separated changed paths
    #[arg(long, env = "ALL_MODIFIED_FILES")]
    pub all_modified_files: Option<String>,
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Plugins root directory
    #[arg(default_value = ".")]
    pub root: Utf8PathBuf,

    /// Print descriptor paths relative to the root
    #[arg(long)]
    pub relative: bool,

    /// Print `owner/name:version` instead of descriptor paths
    #[arg(long, conflicts_with = "relative")]
    pub names: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Plugins root directory
    #[arg(default_value = ".")]
    pub root: Utf8PathBuf,

    /// Skip go mod tidy and npm install in created directories
    #[arg(long)]
    pub no_post_process: bool,

    /// Run `make test` over the created versions
    #[arg(long, conflicts_with = "no_post_process")]
    pub run_tests: bool,

    /// Token for the GitHub API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Plugins root directory
    #[arg(default_value = ".")]
    pub root: Utf8PathBuf,

    /// Image organization (defaults to the configured org)
    #[arg(long, env = "DOCKER_ORG")]
    pub org: Option<String>,

    /// Local buildx cache directory
    #[arg(long)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Maximum concurrent build groups (capped at 8)
    #[arg(short = 'j', long)]
    pub parallelism: Option<usize>,

    /// Extra arguments passed to every docker build
    #[arg(last = true)]
    pub docker_args: Vec<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Plugins root directory
    #[arg(default_value = ".")]
    pub root: Utf8PathBuf,

    /// Directory receiving the archives
    #[arg(short, long)]
    pub output: Utf8PathBuf,

    /// Image organization (defaults to the configured org)
    #[arg(long, env = "DOCKER_ORG")]
    pub org: Option<String>,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

/// Where the release manifest comes from and how it is verified
#[derive(Args, Debug, Clone, Default)]
pub struct ManifestSourceArgs {
    /// Minisign public key, as a file path or inline
    #[arg(long)]
    pub minisign_public_key: Option<String>,

    /// Token for the GitHub API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReleaseArgs {
    /// Plugins root directory
    #[arg(default_value = ".")]
    pub root: Utf8PathBuf,

    /// Assemble the release locally without publishing
    #[arg(long)]
    pub dry_run: bool,

    /// Commit the release tag points at
    #[arg(long, env = "GITHUB_SHA")]
    pub commitish: Option<String>,

    /// Minisign secret key file used to sign the manifest
    #[arg(long)]
    pub minisign_private_key: Option<Utf8PathBuf>,

    /// Password of the minisign secret key
    #[arg(long, env = "MINISIGN_PRIVATE_KEY_PASSWORD", hide_env_values = true)]
    pub minisign_private_key_password: Option<String>,

    /// Image organization (defaults to the configured org)
    #[arg(long, env = "DOCKER_ORG")]
    pub org: Option<String>,

    #[command(flatten)]
    pub source: ManifestSourceArgs,
}

#[derive(Args, Debug)]
pub struct LatestArgs {
    /// Release tag to read instead of the latest release
    #[arg(long)]
    pub release_tag: Option<String>,

    #[command(flatten)]
    pub source: ManifestSourceArgs,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Directory receiving the archives
    pub dir: Utf8PathBuf,

    /// Release tag to download instead of the latest release
    #[arg(long)]
    pub release_tag: Option<String>,

    #[command(flatten)]
    pub source: ManifestSourceArgs,
}

#[derive(Args, Debug)]
pub struct RestoreArgs {
    /// Release tag whose images are restored
    pub tag: String,

    /// Pull and tag locally without pushing
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub source: ManifestSourceArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serial_test::serial;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    #[serial]
    fn test_discover_defaults() {
        let cli = Cli::try_parse_from(["plugsmith", "discover"]).unwrap();
        let Commands::Discover(args) = cli.command else {
            panic!("expected discover");
        };
        assert_eq!(args.root, Utf8PathBuf::from("."));
        assert!(!args.relative);
        assert!(!args.names);
    }

    #[test]
    #[serial]
    fn test_selection_bound_to_environment() {
        std::env::set_var("PLUGINS", "connect-go:latest");
        std::env::set_var("ANY_MODIFIED", "true");
        let cli = Cli::try_parse_from(["plugsmith", "build", "plugins"]);
        std::env::remove_var("PLUGINS");
        std::env::remove_var("ANY_MODIFIED");

        let Commands::Build(args) = cli.unwrap().command else {
            panic!("expected build");
        };
        assert_eq!(args.root, Utf8PathBuf::from("plugins"));
        assert_eq!(args.selection.plugins.as_deref(), Some("connect-go:latest"));
        assert_eq!(args.selection.any_modified.as_deref(), Some("true"));
    }

    #[test]
    #[serial]
    fn test_build_passes_trailing_docker_args() {
        let cli = Cli::try_parse_from([
            "plugsmith", "build", ".", "-j", "4", "--", "--platform", "linux/amd64",
        ])
        .unwrap();
        let Commands::Build(args) = cli.command else {
            panic!("expected build");
        };
        assert_eq!(args.parallelism, Some(4));
        assert_eq!(args.docker_args, ["--platform", "linux/amd64"]);
    }

    #[test]
    fn test_package_requires_output() {
        assert!(Cli::try_parse_from(["plugsmith", "package", "."]).is_err());
    }

    #[test]
    fn test_release_resolves_from_registry_only() {
        assert!(Cli::try_parse_from(["plugsmith", "release", ".", "--local"]).is_err());
        let cli = Cli::try_parse_from(["plugsmith", "release", ".", "--dry-run"]).unwrap();
        let Commands::Release(args) = cli.command else {
            panic!("expected release");
        };
        assert!(args.dry_run);
    }

    #[test]
    fn test_restore_requires_tag() {
        assert!(Cli::try_parse_from(["plugsmith", "restore"]).is_err());
        let cli = Cli::try_parse_from(["plugsmith", "restore", "20240101.1", "--dry-run"]).unwrap();
        let Commands::Restore(args) = cli.command else {
            panic!("expected restore");
        };
        assert_eq!(args.tag, "20240101.1");
        assert!(args.dry_run);
    }
}
