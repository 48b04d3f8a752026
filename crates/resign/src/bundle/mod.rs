//! App bundle handling for iOS re-signing.
//!
//! This module provides functionality to:
//! - Recognise directories that are native iOS bundles
//! - Track and persist `Info.plist` changes
//! - Rewrite bundle identifiers against a provisioning profile
//! - Model the three bundle variants that are re-signed differently
//!
//! # Bundle variants
//!
//! | Variant | Type | Profile | Entitlements | Signed as |
//! |---------|------|---------|--------------|-----------|
//! | Framework | [`Framework`] | none | none | [`SignTarget::Framework`](crate::signer::SignTarget::Framework) |
//! | App | [`App`] with [`AppKind::App`] | required | written | [`SignTarget::Executable`](crate::signer::SignTarget::Executable) |
//! | App extension | [`App`] with [`AppKind::Extension`] | optional | only with a profile | [`SignTarget::Executable`](crate::signer::SignTarget::Executable) |
//!
//! # Examples
//!
//! ```no_run
//! use resign::bundle::{Bundle, Classified, PlistFile};
//! use std::sync::Arc;
//!
//! match Bundle::classify("Payload/MyApp.app/Frameworks/Foo.framework", Arc::new(PlistFile))? {
//!     Classified::Matched(bundle) => println!("executable: {}", bundle.executable_path()?.display()),
//!     Classified::NotApplicable(why) => println!("skipping: {why}"),
//! }
//! # Ok::<(), resign::Error>(())
//! ```

pub mod app;
pub mod identifier;
pub mod info;
pub mod plist_file;

pub use app::{App, AppKind};
pub use info::InfoPlist;
pub use plist_file::{PlistCodec, PlistFile, PlistFormat};

use crate::{Error, Result};
use info::{BUNDLE_EXECUTABLE, BUNDLE_IDENTIFIER};
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of a bundle's metadata.
pub const INFO_PLIST: &str = "Info.plist";
/// Directory holding nested frameworks and dylibs.
pub const FRAMEWORKS_DIR: &str = "Frameworks";
/// Directory holding app extensions.
pub const PLUGINS_DIR: &str = "PlugIns";

const SUPPORTED_PLATFORMS: &str = "CFBundleSupportedPlatforms";
const NATIVE_PLATFORM: &str = "iPhoneOS";

/// Outcome of checking whether a directory is a bundle of a given kind.
///
/// `NotApplicable` is a normal answer, not an error: directory scans skip
/// such entries. Use [`Classified::into_result`] where the directory must
/// qualify.
#[derive(Debug)]
pub enum Classified<T> {
    /// The directory is a bundle of the requested kind.
    Matched(T),
    /// The directory is not a native iOS bundle; carries the reason.
    NotApplicable(String),
}

impl<T> Classified<T> {
    /// Convert a skip into [`Error::NotApplicable`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Classified::Matched(value) => Ok(value),
            Classified::NotApplicable(reason) => Err(Error::NotApplicable(reason)),
        }
    }

    /// Transform the matched value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Classified<U> {
        match self {
            Classified::Matched(value) => Classified::Matched(f(value)),
            Classified::NotApplicable(reason) => Classified::NotApplicable(reason),
        }
    }
}

/// Whether an `Info.plist` declares the native iOS platform.
pub fn is_info_plist_native(props: &Dictionary) -> bool {
    props
        .get(SUPPORTED_PLATFORMS)
        .and_then(Value::as_array)
        .is_some_and(|platforms| {
            platforms
                .iter()
                .any(|p| p.as_string() == Some(NATIVE_PLATFORM))
        })
}

/// A directory recognised as a signable bundle.
///
/// Holds the bundle's `Info.plist` and, once built, the location of its
/// resource seal.
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    info: InfoPlist,
    seal_path: Option<PathBuf>,
}

impl Bundle {
    /// Inspect `path` and decide whether it is a native iOS bundle.
    ///
    /// A missing `Info.plist` or one without `iPhoneOS` in
    /// `CFBundleSupportedPlatforms` yields [`Classified::NotApplicable`]
    /// with no side effects. Read and decode failures are returned as errors.
    pub fn classify(path: impl AsRef<Path>, codec: Arc<dyn PlistCodec>) -> Result<Classified<Self>> {
        let path = path.as_ref();
        let info_path = path.join(INFO_PLIST);

        if !info_path.is_file() {
            return Ok(Classified::NotApplicable(format!(
                "no {} found in {}; probably not a bundle",
                INFO_PLIST,
                path.display()
            )));
        }

        let info = InfoPlist::load(&info_path, codec)?;
        if !is_info_plist_native(info.props()) {
            return Ok(Classified::NotApplicable(format!(
                "{} is not a native iOS bundle",
                path.display()
            )));
        }

        Ok(Classified::Matched(Self {
            path: path.to_path_buf(),
            info,
            seal_path: None,
        }))
    }

    /// Bundle directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bundle's `Info.plist`.
    pub fn info(&self) -> &InfoPlist {
        &self.info
    }

    /// Mutable access to the bundle's `Info.plist`.
    pub fn info_mut(&mut self) -> &mut InfoPlist {
        &mut self.info
    }

    /// Location of the resource seal, set once the bundle has been sealed.
    pub fn seal_path(&self) -> Option<&Path> {
        self.seal_path.as_deref()
    }

    pub(crate) fn set_seal_path(&mut self, seal_path: PathBuf) {
        self.seal_path = Some(seal_path);
    }

    /// Current `CFBundleIdentifier`, if any.
    pub fn identifier(&self) -> Option<&str> {
        self.info.get_str(BUNDLE_IDENTIFIER)
    }

    /// Path to the main executable.
    ///
    /// Named by `CFBundleExecutable`, or by the directory name without its
    /// extension. Fails with [`Error::MissingExecutable`] if the file does
    /// not exist.
    pub fn executable_path(&self) -> Result<PathBuf> {
        let name = match self.info.get_str(BUNDLE_EXECUTABLE) {
            Some(name) => name.to_string(),
            None => self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        let executable = self.path.join(name);
        if !executable.is_file() {
            return Err(Error::MissingExecutable(executable));
        }
        Ok(executable)
    }
}

/// A framework bundle: reusable code with its own resources.
///
/// Unlike an app it has no provisioning profile, no entitlements and no
/// identifier rewrite.
#[derive(Debug)]
pub struct Framework {
    bundle: Bundle,
}

impl Framework {
    /// Classify `path` as a framework bundle.
    pub fn classify(path: impl AsRef<Path>, codec: Arc<dyn PlistCodec>) -> Result<Classified<Self>> {
        Ok(Bundle::classify(path, codec)?.map(|bundle| Self { bundle }))
    }

    /// Open `path`, failing with [`Error::NotApplicable`] if it is not a bundle.
    pub fn open(path: impl AsRef<Path>, codec: Arc<dyn PlistCodec>) -> Result<Self> {
        Self::classify(path, codec)?.into_result()
    }

    /// The underlying bundle.
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub(crate) fn bundle_mut(&mut self) -> &mut Bundle {
        &mut self.bundle
    }
}
