//! Image names derived from plugin identities

use plugsmith_plugins::{Plugin, PluginIdentity};

const PREFIX: &str = "plugins";
const ARM64_PREFIX: &str = "plugins-arm64";

/// Whether `arch` names a 64-bit ARM host, in Rust or Go spelling
fn is_arm64(arch: &str) -> bool {
    matches!(arch, "aarch64" | "arm64")
}

/// `<org>/plugins-<owner>-<name>`, the repository path in a registry
pub fn repository(org: &str, identity: &PluginIdentity) -> String {
    format!("{}/{}-{}-{}", org, PREFIX, identity.owner, identity.plugin)
}

/// Local tag for `plugin` built on `arch`
pub fn image_name_for_arch(plugin: &Plugin, org: &str, arch: &str) -> String {
    let prefix = if is_arm64(arch) { ARM64_PREFIX } else { PREFIX };
    format!(
        "{}/{}-{}-{}:{}",
        org,
        prefix,
        plugin.identity.owner,
        plugin.identity.plugin,
        plugin.version()
    )
}

/// Local tag for `plugin` built on this host
pub fn image_name(plugin: &Plugin, org: &str) -> String {
    image_name_for_arch(plugin, org, std::env::consts::ARCH)
}

/// Tag for an intermediate build stage
pub fn stage_image_name(image: &str, stage: &str) -> String {
    format!("{}-{}", image, stage)
}

/// `<host>/<repository>:<version>`
pub fn registry_reference(host: &str, repository: &str, version: &str) -> String {
    format!("{}/{}:{}", host, repository, version)
}

/// `<host>/<repository>@<digest>`
pub fn registry_image(host: &str, repository: &str, digest: &str) -> String {
    format!("{}/{}@{}", host, repository, digest)
}

/// Split `<name>@<digest>` into its parts
pub fn split_digest(image: &str) -> Option<(&str, &str)> {
    image.rsplit_once('@')
}

/// Archive name `<owner>-<name>-<version>.zip`
pub fn zip_name(plugin: &Plugin) -> String {
    format!(
        "{}-{}-{}.zip",
        plugin.identity.owner,
        plugin.identity.plugin,
        plugin.version()
    )
}
