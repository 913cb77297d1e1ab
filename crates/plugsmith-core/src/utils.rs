//! Digest and filesystem helpers

use crate::error::{Error, IoResultExt, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Digest algorithm prefix used in every recorded digest
pub const SHA256_PREFIX: &str = "sha256:";

/// Compute `sha256:<hex>` over a file's bytes
pub fn digest_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_path(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).with_path(path)?;
    Ok(format!("{}{}", SHA256_PREFIX, hex::encode(hasher.finalize())))
}

/// Compute `sha256:<hex>` over in-memory bytes
pub fn digest_bytes(bytes: &[u8]) -> String {
    format!("{}{}", SHA256_PREFIX, hex::encode(Sha256::digest(bytes)))
}

/// Split a `sha256:<hex>` digest and return the validated hex part
pub fn parse_digest(digest: &str) -> Result<&str> {
    let (kind, value) = digest
        .split_once(':')
        .ok_or_else(|| Error::malformed_digest(digest))?;
    if kind != "sha256" || value.len() != 64 || hex::decode(value).is_err() {
        return Err(Error::malformed_digest(digest));
    }
    Ok(value)
}

/// Write `bytes` to `path` through a temporary sibling file and a rename
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).with_path(dir)?;
    tmp.write_all(bytes).with_path(tmp.path())?;
    tmp.as_file().sync_all().with_path(tmp.path())?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;
    Ok(())
}

/// Convert a path to forward-slash form relative to `root`
pub fn relative_slash_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
