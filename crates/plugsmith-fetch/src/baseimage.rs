//! Base-image catalog read from `.github/docker`
//!
//! Every `Dockerfile*` in the catalog directory pins one image with a
//! `FROM <image>:<tag>` line; dependabot keeps those tags current. Plugin
//! Dockerfiles are rewritten to the pinned tags when a new version is
//! materialized.

use plugsmith_core::error::{Error, IoResultExt, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const DISTROLESS_PREFIX: &str = "gcr.io/distroless/";

/// Latest tags of the tracked base images
#[derive(Debug, Clone, Default)]
pub struct BaseImages {
    latest_versions: HashMap<String, String>,
    /// Family-collapsed distroless name to the tracked full name
    distroless_families: HashMap<String, String>,
}

/// Distroless name with digit runs removed, if it is a versioned distroless image
///
/// `gcr.io/distroless/java17-debian11` collapses to `gcr.io/distroless/java-debian`.
pub fn distroless_family(name: &str) -> Option<String> {
    if !name.starts_with(DISTROLESS_PREFIX) || !name.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(name.chars().filter(|c| !c.is_ascii_digit()).collect())
}

/// Split an image reference into name and tag at the last `:` after the last `/`
pub fn split_image_tag(image: &str) -> (&str, Option<&str>) {
    let slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[slash..].rfind(':') {
        Some(idx) => (&image[..slash + idx], Some(&image[slash + idx + 1..])),
        None => (image, None),
    }
}

/// Whitespace-separated tokens of `line` with their byte offsets
pub fn tokens(line: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                out.push((s, &line[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push((s, &line[s..]));
    }
    out
}

/// Offset and text of the image argument of a `FROM` line, skipping `--flag` tokens
///
/// Returns `None` when the line is not a `FROM` instruction.
pub fn from_image_token(line: &str) -> Option<Option<(usize, &str)>> {
    let tokens = tokens(line);
    let (_, first) = tokens.first()?;
    if !first.eq_ignore_ascii_case("from") {
        return None;
    }
    Some(tokens[1..].iter().copied().find(|(_, t)| !t.starts_with("--")))
}

/// Image argument of a `FROM` line
pub fn from_image(line: &str) -> Option<Option<&str>> {
    from_image_token(line).map(|token| token.map(|(_, image)| image))
}

/// Walk up from `start` until a `.github/docker` directory is found
pub fn find_base_image_dir(start: &Path) -> Result<PathBuf> {
    let start = std::path::absolute(start).with_path(start)?;
    let mut dir = start.as_path();
    loop {
        let candidate = dir.join(".github").join("docker");
        if candidate.is_dir() {
            return Ok(candidate);
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(Error::BaseImageDirNotFound { path: start.clone() }),
        }
    }
}

fn parse_base_dockerfile(path: &Path) -> Result<(String, String)> {
    let contents = fs::read_to_string(path).with_path(path)?;
    for line in contents.lines() {
        let line = line.trim();
        // A lone `FROM` keyword is not an instruction yet
        if line.split_whitespace().nth(1).is_none() {
            continue;
        }
        let Some(image) = from_image(line) else {
            continue;
        };
        let malformed = || Error::MalformedBaseImage {
            path: path.to_path_buf(),
            line: line.to_string(),
        };
        let image = image.ok_or_else(malformed)?;
        return match split_image_tag(image) {
            (name, Some(tag)) if !name.is_empty() && !tag.is_empty() => {
                Ok((name.to_string(), tag.to_string()))
            }
            _ => Err(malformed()),
        };
    }
    Err(Error::MalformedBaseImage {
        path: path.to_path_buf(),
        line: String::new(),
    })
}

impl BaseImages {
    /// Load every `Dockerfile*` in `dir`, in sorted order
    pub fn load(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_path(dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("Dockerfile"))
            .map(|entry| entry.path())
            .collect();
        files.sort();

        let mut catalog = Self::default();
        for file in files {
            let (name, tag) = parse_base_dockerfile(&file)?;
            catalog.insert(name, tag)?;
        }
        debug!("Loaded {} base images from {}", catalog.latest_versions.len(), dir.display());
        Ok(catalog)
    }

    /// Track `name` at `tag`, enforcing name and family uniqueness
    pub fn insert(&mut self, name: String, tag: String) -> Result<()> {
        if self.latest_versions.contains_key(&name) {
            return Err(Error::DuplicateBaseImage { image: name });
        }
        if let Some(family) = distroless_family(&name) {
            if self.distroless_families.contains_key(&family) {
                return Err(Error::DuplicateDistrolessFamily { family });
            }
            self.distroless_families.insert(family, name.clone());
        }
        self.latest_versions.insert(name, tag);
        Ok(())
    }

    fn canonical_name<'a>(&'a self, requested: &'a str) -> Option<&'a str> {
        match distroless_family(requested) {
            Some(family) => self.distroless_families.get(&family).map(String::as_str),
            None => Some(requested),
        }
    }

    /// `<canonicalName>:<latestTag>`, or an empty string if the image is not tracked
    pub fn image_name_and_version(&self, requested: &str) -> String {
        self.canonical_name(requested)
            .and_then(|name| {
                self.latest_versions
                    .get(name)
                    .map(|tag| format!("{}:{}", name, tag))
            })
            .unwrap_or_default()
    }

    /// Latest tag for `requested`, if tracked
    pub fn image_version(&self, requested: &str) -> Option<&str> {
        let name = self.canonical_name(requested)?;
        self.latest_versions.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.latest_versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest_versions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_split_image_tag_keeps_registry_port() {
        assert_eq!(split_image_tag("debian:bookworm"), ("debian", Some("bookworm")));
        assert_eq!(
            split_image_tag("localhost:5000/img:1.0"),
            ("localhost:5000/img", Some("1.0"))
        );
        assert_eq!(split_image_tag("localhost:5000/img"), ("localhost:5000/img", None));
    }

    #[test]
    fn test_from_image_skips_flags() {
        assert_eq!(
            from_image("FROM --platform=$BUILDPLATFORM golang:1.22 AS build"),
            Some(Some("golang:1.22"))
        );
        assert_eq!(from_image("from scratch"), Some(Some("scratch")));
        assert_eq!(from_image("FROM --platform=x"), Some(None));
        assert_eq!(from_image("RUN echo FROM x"), None);
    }

    #[test]
    fn test_tokens_offsets() {
        assert_eq!(
            tokens("  FROM\tdebian:12 "),
            vec![(2, "FROM"), (7, "debian:12")]
        );
        assert_eq!(
            from_image_token("FROM --platform=x alpine:3 AS b"),
            Some(Some((18, "alpine:3")))
        );
    }

    #[test]
    fn test_distroless_family() {
        assert_eq!(
            distroless_family("gcr.io/distroless/java17-debian11").as_deref(),
            Some("gcr.io/distroless/java-debian")
        );
        assert_eq!(distroless_family("gcr.io/distroless/static"), None);
        assert_eq!(distroless_family("debian12"), None);
    }

    fn catalog_dir(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        for (name, contents) in files {
            fs::write(tmp.path().join(name), contents).unwrap();
        }
        tmp
    }

    #[test]
    fn test_load_and_resolve() {
        let tmp = catalog_dir(&[
            ("Dockerfile.debian", "FROM debian:bookworm-20240601\n"),
            ("Dockerfile.java", "# comment\nFROM gcr.io/distroless/java21-debian12:latest\n"),
            ("Dockerfile.syntax", "FROM --platform=linux/amd64 docker/dockerfile:1.7\n"),
            ("README.md", "FROM ignored:1\n"),
        ]);
        let images = BaseImages::load(tmp.path()).unwrap();
        assert_eq!(images.len(), 3);
        assert_eq!(images.image_name_and_version("debian"), "debian:bookworm-20240601");
        assert_eq!(
            images.image_name_and_version("gcr.io/distroless/java17-debian11"),
            "gcr.io/distroless/java21-debian12:latest"
        );
        assert_eq!(images.image_version("docker/dockerfile"), Some("1.7"));
        assert_eq!(images.image_name_and_version("alpine"), "");
    }

    #[test]
    fn test_duplicate_images_fail() {
        let tmp = catalog_dir(&[
            ("Dockerfile.a", "FROM debian:bookworm\n"),
            ("Dockerfile.b", "FROM debian:bullseye\n"),
        ]);
        let err = BaseImages::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateBaseImage { .. }));
    }

    #[test]
    fn test_duplicate_families_fail() {
        let tmp = catalog_dir(&[
            ("Dockerfile.a", "FROM gcr.io/distroless/java17-debian11:latest\n"),
            ("Dockerfile.b", "FROM gcr.io/distroless/java21-debian12:latest\n"),
        ]);
        let err = BaseImages::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::DuplicateDistrolessFamily { .. }));
    }

    #[test]
    fn test_untagged_from_is_malformed() {
        let tmp = catalog_dir(&[("Dockerfile", "FROM debian\n")]);
        let err = BaseImages::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedBaseImage { .. }));
    }

    #[test]
    fn test_bare_from_line_is_skipped() {
        let tmp = catalog_dir(&[("Dockerfile.debian", "FROM\nFROM debian:bookworm-20240601\n")]);
        let images = BaseImages::load(tmp.path()).unwrap();
        assert_eq!(images.image_version("debian"), Some("bookworm-20240601"));

        let tmp = catalog_dir(&[("Dockerfile", "FROM --platform=linux/amd64\n")]);
        let err = BaseImages::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::MalformedBaseImage { .. }));
    }

    #[test]
    fn test_find_base_image_dir_walks_up() {
        let tmp = TempDir::new().unwrap();
        let docker = tmp.path().join(".github/docker");
        fs::create_dir_all(&docker).unwrap();
        let nested = tmp.path().join("plugins/acme");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_base_image_dir(&nested).unwrap(), docker);
    }
}
