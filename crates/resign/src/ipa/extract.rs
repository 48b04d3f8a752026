//! IPA extraction functionality.
//!
//! Extracts IPA archives to a directory and locates the .app bundle.

use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Extract an IPA file to a destination directory.
///
/// IPA files are ZIP archives containing a Payload/ directory with the .app bundle.
/// Unix permissions and symlinks are restored. Entries whose names would
/// escape `dest_dir` are skipped.
///
/// # Returns
///
/// Returns the path to the extracted .app bundle inside Payload/.
///
/// # Errors
///
/// Returns an error if:
/// - The IPA file cannot be opened or read
/// - The IPA is not a valid ZIP archive
/// - No .app bundle is found in Payload/
pub fn extract_ipa(ipa_path: impl AsRef<Path>, dest_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let ipa_path = ipa_path.as_ref();
    let dest_dir = dest_dir.as_ref();

    validate_ipa(ipa_path)?;

    let mut archive = ZipArchive::new(File::open(ipa_path)?)?;
    fs::create_dir_all(dest_dir)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;

        let Some(outpath) = entry.enclosed_name().map(|p| dest_dir.join(p)) else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::{symlink, PermissionsExt};

            let mode = entry.unix_mode();
            if mode.is_some_and(|m| (m & 0o170000) == 0o120000) {
                let mut target = String::new();
                entry.read_to_string(&mut target)?;
                if outpath.symlink_metadata().is_ok() {
                    fs::remove_file(&outpath)?;
                }
                symlink(&target, &outpath)?;
                continue;
            }

            io::copy(&mut entry, &mut File::create(&outpath)?)?;
            if let Some(mode) = mode {
                fs::set_permissions(&outpath, fs::Permissions::from_mode(mode & 0o7777))?;
            }
        }

        #[cfg(not(unix))]
        io::copy(&mut entry, &mut File::create(&outpath)?)?;
    }

    find_app_bundle(dest_dir)
}

/// Find the .app bundle inside a Payload/ directory.
fn find_app_bundle(dest_dir: &Path) -> Result<PathBuf> {
    let payload_dir = dest_dir.join("Payload");

    if !payload_dir.is_dir() {
        return Err(invalid_ipa("No Payload directory found in IPA"));
    }

    let mut apps = Vec::new();
    for entry in fs::read_dir(&payload_dir)? {
        let path = entry?.path();
        if path.is_dir() && path.extension().is_some_and(|ext| ext == "app") {
            apps.push(path);
        }
    }
    apps.sort();

    apps.into_iter()
        .next()
        .ok_or_else(|| invalid_ipa("No .app bundle found in Payload/"))
}

/// Validate that a path is a valid IPA file.
///
/// Checks that the file exists and has a ZIP signature.
pub fn validate_ipa(ipa_path: impl AsRef<Path>) -> Result<()> {
    let ipa_path = ipa_path.as_ref();

    if !ipa_path.exists() {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("IPA file not found: {}", ipa_path.display()),
        )));
    }

    let mut magic = [0u8; 2];
    File::open(ipa_path)?.read_exact(&mut magic)?;

    if &magic != b"PK" {
        return Err(invalid_ipa("Not a valid ZIP/IPA file"));
    }

    Ok(())
}

fn invalid_ipa(msg: &str) -> Error {
    Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg.to_string()))
}
