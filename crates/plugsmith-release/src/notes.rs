//! Markdown body of a GitHub release

use crate::manifest::{PLUGIN_RELEASES_FILE, PLUGIN_RELEASES_SIGNATURE_FILE};
use crate::model::{PluginRelease, ReleaseStatus};
use crate::naming::ReleaseLinks;
use std::fmt::Write;

const TABLE_HEADER: &str = "| Plugin | Version | Link |\n|--------|---------|------|\n";

/// Render the release notes for `name`
///
/// `public_key` is the base64 minisign key; without it the verification
/// section is left out.
pub fn release_body(
    name: &str,
    releases: &[PluginRelease],
    links: &ReleaseLinks,
    public_key: Option<&str>,
) -> String {
    let mut body = String::new();
    let _ = writeln!(body, "# Buf Remote Plugins Release {}\n", name);

    write_table(&mut body, "New Plugins", releases, ReleaseStatus::New);
    write_table(&mut body, "Updated Plugins", releases, ReleaseStatus::Updated);

    let manifest_url = links.asset_url(name, PLUGIN_RELEASES_FILE);
    if releases.iter().any(|r| r.status == ReleaseStatus::Existing) {
        let _ = writeln!(
            body,
            "## Previously Released Plugins\n\nEvery released plugin, including those from earlier releases, is listed in [{}]({}).\n",
            PLUGIN_RELEASES_FILE, manifest_url
        );
    }

    if let Some(key) = public_key {
        let signature_url = links.asset_url(name, PLUGIN_RELEASES_SIGNATURE_FILE);
        body.push_str("## Verifying a release\n\n");
        body.push_str(
            "Releases are signed using our [minisign](https://github.com/jedisct1/minisign) public key:\n\n",
        );
        let _ = writeln!(body, "```\n{}\n```\n", key);
        body.push_str(
            "The release assets can be verified using this command (assuming that minisign is installed):\n\n",
        );
        let _ = writeln!(body, "```\ncurl -OL {} && \\", manifest_url);
        let _ = writeln!(body, "  curl -OL {} && \\", signature_url);
        let _ = writeln!(body, "  minisign -Vm {} -P {}\n```", PLUGIN_RELEASES_FILE, key);
    }
    body
}

fn write_table(body: &mut String, title: &str, releases: &[PluginRelease], status: ReleaseStatus) {
    let mut rows = releases.iter().filter(|r| r.status == status).peekable();
    if rows.peek().is_none() {
        return;
    }
    let _ = write!(body, "## {}\n\n{}", title, TABLE_HEADER);
    for release in rows {
        let _ = writeln!(
            body,
            "| {} | {} | [Download]({}) |",
            release.name, release.version, release.url
        );
    }
    body.push('\n');
}
