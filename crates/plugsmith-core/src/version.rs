//! Semantic version helpers for `v`-prefixed plugin versions
//!
//! Plugin and upstream versions follow the Go module convention: a leading
//! `v`, and short forms such as `v1` or `v25.2` are valid and compare as if
//! padded with zeros (`v25.2.0`). Build metadata never takes part in ordering.

use semver::{BuildMetadata, Version};
use std::cmp::Ordering;

/// Parse a `v`-prefixed version, accepting `vMAJOR` and `vMAJOR.MINOR` short forms
pub fn parse(version: &str) -> Option<Version> {
    let rest = version.strip_prefix('v')?;
    let (core, suffix) = match rest.find(|c| c == '-' || c == '+') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    let padded = match parts.len() {
        3 => core.to_string(),
        // Short forms cannot carry prerelease or build suffixes
        1 | 2 if suffix.is_empty() => {
            let mut parts = parts;
            while parts.len() < 3 {
                parts.push("0");
            }
            parts.join(".")
        }
        _ => return None,
    };
    let mut parsed = Version::parse(&format!("{}{}", padded, suffix)).ok()?;
    parsed.build = BuildMetadata::EMPTY;
    Some(parsed)
}

/// Report whether `version` is a valid `v`-prefixed semantic version
pub fn is_valid(version: &str) -> bool {
    parse(version).is_some()
}

/// Canonical `vMAJOR.MINOR.PATCH[-PRERELEASE]` form, dropping build metadata
pub fn canonical(version: &str) -> Option<String> {
    parse(version).map(|v| format!("v{}", v))
}

/// Prerelease suffix without the leading `-`, if any
pub fn prerelease(version: &str) -> Option<String> {
    parse(version)
        .filter(|v| !v.pre.is_empty())
        .map(|v| v.pre.as_str().to_string())
}

pub fn is_prerelease(version: &str) -> bool {
    prerelease(version).is_some()
}

/// Compare two versions; invalid versions sort before valid ones and equal each other
pub fn compare(a: &str, b: &str) -> Ordering {
    match (parse(a), parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Prefix a bare upstream version with `v`
pub fn ensure_prefix(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{}", version)
    }
}

/// Version digits without the leading `v`, as they appear inside build files
pub fn digits(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Highest valid version in the iterator
pub fn max<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .filter(|v| is_valid(v))
        .max_by(|a, b| compare(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_forms_are_valid() {
        assert!(is_valid("v1"));
        assert!(is_valid("v25.2"));
        assert!(is_valid("v1.36.11"));
        assert_eq!(canonical("v25.2").as_deref(), Some("v25.2.0"));
        assert_eq!(canonical("v1").as_deref(), Some("v1.0.0"));
    }

    #[test]
    fn test_rejects_unprefixed_and_malformed() {
        assert!(!is_valid("1.2.3"));
        assert!(!is_valid("v1.2-rc.1"));
        assert!(!is_valid("v01.2.3"));
        assert!(!is_valid("v1.2.3.4"));
        assert!(!is_valid("latest"));
        assert!(!is_valid(""));
    }

    #[test]
    fn test_prerelease_and_build() {
        assert_eq!(prerelease("v1.0.0-rc.1").as_deref(), Some("rc.1"));
        assert!(!is_prerelease("v1.0.0+build.5"));
        assert_eq!(canonical("v1.0.0+build.5").as_deref(), Some("v1.0.0"));
        assert_eq!(compare("v1.0.0+a", "v1.0.0+b"), Ordering::Equal);
    }

    #[test]
    fn test_compare_ordering() {
        assert_eq!(compare("v1.9.0", "v1.10.0"), Ordering::Less);
        assert_eq!(compare("v25.2", "v25.1.3"), Ordering::Greater);
        assert_eq!(compare("v1.0.0-rc.1", "v1.0.0"), Ordering::Less);
        assert_eq!(compare("bogus", "v0.0.1"), Ordering::Less);
        assert_eq!(compare("bogus", "junk"), Ordering::Equal);
    }

    #[test]
    fn test_max_skips_invalid() {
        let versions = ["v1.2.0", "garbage", "v1.10.0", "v1.9.9"];
        assert_eq!(max(versions.iter().copied()), Some("v1.10.0"));
        assert_eq!(max(["nope"].iter().copied()), None);
    }

    #[test]
    fn test_prefix_helpers() {
        assert_eq!(ensure_prefix("1.2.3"), "v1.2.3");
        assert_eq!(ensure_prefix("v1.2.3"), "v1.2.3");
        assert_eq!(digits("v1.2.3"), "1.2.3");
        assert_eq!(digits("1.2.3"), "1.2.3");
    }
}
