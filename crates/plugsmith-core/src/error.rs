//! Error types for plugsmith-core

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias using plugsmith-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error kinds shared by every plugsmith flow
#[derive(Error, Debug)]
pub enum Error {
    /// Filesystem read or write failed
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Plugin descriptor is missing required fields or is structurally invalid
    #[error("Malformed plugin descriptor {}: {message}", .path.display())]
    MalformedManifest { path: PathBuf, message: String },

    /// Source descriptor failed strict decoding
    #[error("Malformed source descriptor {}: {message}", .path.display())]
    MalformedSource { path: PathBuf, message: String },

    /// No source descriptors were found under the walk root
    #[error("No source.yaml files found under {}", .path.display())]
    SourceFileNotFound { path: PathBuf },

    /// Base-image descriptor has an unusable FROM line
    #[error("Invalid FROM line in {}: {line}", .path.display())]
    MalformedBaseImage { path: PathBuf, line: String },

    /// No `.github/docker` directory above the plugin root
    #[error("Unable to find .github/docker above {}", .path.display())]
    BaseImageDirNotFound { path: PathBuf },

    /// Release tag does not follow the `yyyyMMdd.N` rule
    #[error("Malformed release tag: {tag}")]
    MalformedReleaseTag { tag: String },

    /// The dependency sort made no progress
    #[error("Failed to resolve plugin dependencies, unresolved: {}", .residual.join(", "))]
    DependencyCycle { residual: Vec<String> },

    /// Dependency pins with a nonzero revision are not supported
    #[error("Unsupported dependency revision {revision} on {plugin}")]
    UnsupportedRevision { plugin: String, revision: u32 },

    /// Version string is not valid semver
    #[error("Invalid version format: {version}")]
    InvalidVersion { version: String },

    /// Two base-image descriptors declare the same image
    #[error("Found duplicate dockerfiles for image {image}")]
    DuplicateBaseImage { image: String },

    /// Two distroless images collapse to the same family name
    #[error("Found duplicate distroless dockerfiles for family {family}")]
    DuplicateDistrolessFamily { family: String },

    /// A previous version directory contains a subdirectory
    #[error("Nested directory not supported: {}", .path.display())]
    NestedDirectory { path: PathBuf },

    /// Target directory already exists
    #[error("Already exists: {}", .path.display())]
    AlreadyExists { path: PathBuf },

    /// Upstream registry or API call failed
    #[error("Upstream request to {endpoint} failed: {message}")]
    UpstreamFailure { endpoint: String, message: String },

    /// Upstream reported a prerelease and the source does not allow them
    #[error("Version {version} is a prerelease")]
    SemverPrerelease { version: String },

    /// Nothing usable was found
    #[error("No versions found for {subject}")]
    NoVersions { subject: String },

    /// Manifest bytes do not match their detached signature
    #[error("Signature verification failed for {file}: {message}")]
    SignatureMismatch { file: String, message: String },

    /// Key material could not be loaded or used
    #[error("Signing error: {message}")]
    Signing { message: String },

    /// Digest string is not `sha256:<64 hex>`
    #[error("Malformed digest: {digest}")]
    MalformedDigest { digest: String },

    /// Content digest differs from the expected value
    #[error("Digest mismatch for {subject}: expected {expected}, got {actual}")]
    DigestMismatch {
        subject: String,
        expected: String,
        actual: String,
    },

    /// External command exited unsuccessfully
    #[error("Command `{command}` failed ({status}){}", fmt_output(.output))]
    SubprocessFailure {
        command: String,
        status: String,
        output: String,
    },

    /// The release manifest lists the same plugin version twice
    #[error("Duplicate plugin discovered in releases file: {name}:{version}")]
    DuplicateInReleases { name: String, version: String },

    /// Invalid runtime configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The run was cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

fn fmt_output(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\noutput:\n{}", output.trim_end())
    }
}

impl Error {
    /// Create an I/O error bound to a path
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a malformed plugin descriptor error
    pub fn malformed_manifest(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::MalformedManifest {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a malformed source descriptor error
    pub fn malformed_source(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::MalformedSource {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn malformed_release_tag(tag: impl Into<String>) -> Self {
        Self::MalformedReleaseTag { tag: tag.into() }
    }

    /// Create a dependency cycle error from the unresolved residual set
    pub fn dependency_cycle<I, S>(residual: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::DependencyCycle {
            residual: residual.into_iter().map(Into::into).collect(),
        }
    }

    pub fn unsupported_revision(plugin: impl Into<String>, revision: u32) -> Self {
        Self::UnsupportedRevision {
            plugin: plugin.into(),
            revision,
        }
    }

    /// Create an invalid version error
    pub fn invalid_version(version: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
        }
    }

    pub fn already_exists(path: impl AsRef<Path>) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create an upstream failure error, keeping the endpoint for context
    pub fn upstream(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamFailure {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn no_versions(subject: impl Into<String>) -> Self {
        Self::NoVersions {
            subject: subject.into(),
        }
    }

    pub fn signature_mismatch(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    pub fn malformed_digest(digest: impl Into<String>) -> Self {
        Self::MalformedDigest {
            digest: digest.into(),
        }
    }

    /// Create a digest mismatch error
    pub fn digest_mismatch(
        subject: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::DigestMismatch {
            subject: subject.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a subprocess failure error
    pub fn subprocess(
        command: impl Into<String>,
        status: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self::SubprocessFailure {
            command: command.into(),
            status: status.into(),
            output: output.into(),
        }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether this error is the recoverable prerelease signal
    pub fn is_prerelease(&self) -> bool {
        matches!(self, Self::SemverPrerelease { .. })
    }

    /// Whether this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Attach a path to an `io::Result`
pub trait IoResultExt<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|e| Error::io(path, e))
    }
}
