//! Deterministic plugin archives
//!
//! An archive holds exactly two entries, by base name: the plugin descriptor
//! followed by `image.tar`. Entries carry a fixed timestamp and mode so the
//! archive bytes only depend on the inputs.

use plugsmith_core::error::{Error, IoResultExt, Result};
use plugsmith_core::utils::digest_file;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// An archive written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginArchive {
    pub path: PathBuf,
    /// `sha256:<hex>` of the final archive bytes
    pub digest: String,
}

/// Whether an entry of `len` bytes needs ZIP64 sizes
///
/// Leaves room for deflate expanding incompressible input.
fn needs_large_file(len: u64) -> bool {
    len.saturating_add(len / 100) >= u64::from(u32::MAX)
}

fn entry_options(len: u64) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
        .large_file(needs_large_file(len))
}

/// Write `<dir>/<zip_name>` from `files`, in order, then digest it
pub fn create_archive(dir: &Path, zip_name: &str, files: &[&Path]) -> Result<PluginArchive> {
    let path = dir.join(zip_name);
    info!("Creating {}", zip_name);

    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".zip.tmp")
        .tempfile_in(dir)
        .with_path(dir)?;
    {
        let mut writer = ZipWriter::new(tmp.as_file_mut());
        for file in files {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| Error::io(file, io::Error::other("path has no file name")))?;
            let mut source = File::open(file).with_path(file)?;
            let len = source.metadata().with_path(file)?.len();
            writer
                .start_file(name, entry_options(len))
                .map_err(|e| Error::io(&path, io::Error::other(e)))?;
            io::copy(&mut source, &mut writer).with_path(file)?;
        }
        writer
            .finish()
            .map_err(|e| Error::io(&path, io::Error::other(e)))?;
    }
    tmp.as_file().sync_all().with_path(tmp.path())?;
    tmp.persist(&path).map_err(|e| Error::io(&path, e.error))?;

    let digest = digest_file(&path)?;
    Ok(PluginArchive { path, digest })
}
