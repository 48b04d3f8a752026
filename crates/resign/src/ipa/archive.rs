//! IPA archive creation.
//!
//! Packs a resigned `.app` bundle back into an IPA with the standard
//! `Payload/` structure. For the reverse operation, see the
//! [`extract`](super::extract) module.
//!
//! # Examples
//!
//! ```no_run
//! use resign::ipa::{create_ipa, CompressionLevel};
//!
//! create_ipa("Payload/MyApp.app", "output.ipa", CompressionLevel::DEFAULT)?;
//! # Ok::<(), resign::Error>(())
//! ```

use crate::{Error, Result};
use std::fs::{self, File};
use std::io;
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// ZIP compression level for IPA creation.
///
/// ```
/// use resign::ipa::CompressionLevel;
///
/// assert_eq!(CompressionLevel::new(3).level(), 3);
/// assert_eq!(CompressionLevel::new(42).level(), 9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u32);

impl CompressionLevel {
    /// No compression; entries are stored.
    pub const NONE: CompressionLevel = CompressionLevel(0);

    /// Default compression (level 6).
    pub const DEFAULT: CompressionLevel = CompressionLevel(6);

    /// Maximum compression (level 9).
    pub const MAX: CompressionLevel = CompressionLevel(9);

    /// Creates a compression level from 0-9.
    ///
    /// Values greater than 9 are clamped to 9.
    #[must_use]
    pub fn new(level: u32) -> Self {
        CompressionLevel(level.min(9))
    }

    /// Returns the compression level value (0-9).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.0
    }

    fn file_options(self) -> SimpleFileOptions {
        if self.0 == 0 {
            SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
        } else {
            SimpleFileOptions::default()
                .compression_method(CompressionMethod::Deflated)
                .compression_level(Some(i64::from(self.0)))
        }
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for CompressionLevel {
    fn from(level: u32) -> Self {
        CompressionLevel::new(level)
    }
}

/// Creates an IPA file from a signed `.app` bundle.
///
/// The bundle is stored under `Payload/<name>.app/`. Symlinks are stored as
/// symlinks and Unix permissions are kept.
///
/// # Errors
///
/// Returns [`Error::Io`] if the bundle is missing or not a directory, or a
/// file cannot be read, and [`Error::Zip`] if the archive cannot be written.
pub fn create_ipa(
    app_bundle_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    compression_level: CompressionLevel,
) -> Result<()> {
    let app_bundle_path = app_bundle_path.as_ref();
    let output_path = output_path.as_ref();

    if !app_bundle_path.is_dir() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("App bundle not found: {}", app_bundle_path.display()),
        )));
    }

    let app_name = app_bundle_path
        .file_name()
        .ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Invalid app bundle path",
            ))
        })?
        .to_string_lossy();

    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut zip = ZipWriter::new(File::create(output_path)?);
    let options = compression_level.file_options();

    zip.add_directory("Payload/", options)?;

    for entry in WalkDir::new(app_bundle_path).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            Error::Io(io::Error::other(format!("Failed to walk directory: {}", e)))
        })?;

        let relative_path = entry
            .path()
            .strip_prefix(app_bundle_path)
            .map_err(|e| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, e)))?;
        let archive_path = if relative_path.as_os_str().is_empty() {
            format!("Payload/{}", app_name)
        } else {
            format!("Payload/{}/{}", app_name, relative_path.to_string_lossy())
        };

        let file_type = entry.file_type();
        if file_type.is_dir() {
            zip.add_directory(format!("{}/", archive_path), options)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            zip.add_symlink(archive_path, target.to_string_lossy(), options)?;
        } else {
            #[cfg(unix)]
            let options = {
                use std::os::unix::fs::PermissionsExt;
                options.unix_permissions(entry.metadata().map_err(io::Error::from)?.permissions().mode())
            };

            zip.start_file(archive_path, options)?;
            io::copy(&mut File::open(entry.path())?, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}
