//! Release tags and download links

use chrono::{DateTime, Utc};
use plugsmith_core::error::{Error, Result};
use plugsmith_core::types::RuntimeConfig;

/// Next `yyyyMMdd.N` tag after `previous`, in UTC
///
/// N restarts at 1 on a new day.
pub fn next_release_name(now: DateTime<Utc>, previous: Option<&str>) -> Result<String> {
    let today = now.format("%Y%m%d").to_string();
    let Some(previous) = previous.filter(|tag| tag.starts_with(&format!("{}.", today))) else {
        return Ok(format!("{}.1", today));
    };
    let revision: u32 = previous
        .split_once('.')
        .and_then(|(_, n)| n.parse().ok())
        .ok_or_else(|| Error::malformed_release_tag(previous))?;
    Ok(format!("{}.{}", today, revision + 1))
}

/// Where release assets are published and downloaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseLinks {
    /// Web base, e.g. `https://github.com`
    pub web_base: String,
    pub owner: String,
    pub repository: String,
}

impl ReleaseLinks {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            web_base: config.endpoints.github_web.trim_end_matches('/').to_string(),
            owner: config.release.owner.clone(),
            repository: config.release.repository.clone(),
        }
    }

    /// `<web>/<owner>/<repo>/releases/download/<tag>/<file>`
    pub fn asset_url(&self, tag: &str, file: &str) -> String {
        format!(
            "{}/{}/{}/releases/download/{}/{}",
            self.web_base, self.owner, self.repository, tag, file
        )
    }
}
