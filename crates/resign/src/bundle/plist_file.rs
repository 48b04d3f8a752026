//! Property list file access.
//!
//! The resign machinery never touches plist files directly; it goes through
//! a [`PlistCodec`] so tests can observe (or fail) every read and write.
//! [`PlistFile`] is the codec used outside of tests.

use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::io;
use std::path::Path;

/// On-disk encoding used when writing a property list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlistFormat {
    /// `bplist00` binary encoding, used for `Info.plist`.
    Binary,
    /// XML encoding, used for `Entitlements.plist`.
    Xml,
}

/// Reads and writes dictionary-rooted property list files.
pub trait PlistCodec {
    /// Read `path` and return its root dictionary.
    fn read(&self, path: &Path) -> Result<Dictionary>;

    /// Write `dict` to `path`, replacing any existing file.
    fn write(&self, dict: &Dictionary, path: &Path, format: PlistFormat) -> Result<()>;
}

/// [`PlistCodec`] backed by the `plist` crate.
///
/// Reads either binary or XML documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlistFile;

impl PlistCodec for PlistFile {
    fn read(&self, path: &Path) -> Result<Dictionary> {
        Value::from_file(path)?.into_dictionary().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} is not a dictionary", path.display()),
            ))
        })
    }

    fn write(&self, dict: &Dictionary, path: &Path, format: PlistFormat) -> Result<()> {
        let value = Value::Dictionary(dict.clone());
        match format {
            PlistFormat::Binary => value.to_file_binary(path)?,
            PlistFormat::Xml => value.to_file_xml(path)?,
        }
        Ok(())
    }
}
