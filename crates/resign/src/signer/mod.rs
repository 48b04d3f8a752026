//! Signing collaborators.
//!
//! The resign traversal decides *what* gets signed and in which order; the
//! work of hashing resources and producing signatures is delegated to a
//! [`SealBuilder`] and a [`CodeSigner`]. [`Toolchain`] groups them with the
//! plist codec and the signing identity for one run.
//!
//! [`Codesign`] implements both traits on top of a `codesign`-compatible
//! command-line tool.

pub mod codesign;

pub use codesign::Codesign;

use crate::bundle::{Bundle, PlistCodec, PlistFile};
use crate::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Something to be signed.
#[derive(Debug, Clone, Copy)]
pub enum SignTarget<'a> {
    /// A loose dynamic library; it gets a plain binary signature.
    Dylib {
        /// The library file.
        path: &'a Path,
    },
    /// The main executable of a framework bundle.
    Framework {
        /// The framework, already sealed.
        bundle: &'a Bundle,
        /// Resolved main executable.
        executable: &'a Path,
    },
    /// The main executable of an app or app extension.
    Executable {
        /// The app bundle, already sealed.
        bundle: &'a Bundle,
        /// Resolved main executable.
        executable: &'a Path,
        /// Entitlements to embed; `None` means embed none.
        entitlements: Option<&'a Path>,
    },
}

impl SignTarget<'_> {
    /// The binary file whose signature is replaced.
    pub fn binary(&self) -> &Path {
        match self {
            SignTarget::Dylib { path } => *path,
            SignTarget::Framework { executable, .. } | SignTarget::Executable { executable, .. } => {
                *executable
            }
        }
    }

    /// Enclosing bundle, if the target is a bundle's main executable.
    pub fn bundle(&self) -> Option<&Bundle> {
        match self {
            SignTarget::Dylib { .. } => None,
            SignTarget::Framework { bundle, .. } | SignTarget::Executable { bundle, .. } => {
                Some(*bundle)
            }
        }
    }
}

/// Produces and embeds a code signature.
pub trait CodeSigner {
    /// Opaque identity handed through to every call.
    type Identity: ?Sized;

    /// Sign `target` in place.
    fn sign(&self, target: &SignTarget<'_>, identity: &Self::Identity) -> Result<()>;
}

/// Builds a bundle's resource seal (`_CodeSignature/CodeResources`).
pub trait SealBuilder {
    /// Seal `bundle_root`, whose main executable is `executable`, and return
    /// the location of the seal.
    fn build(&self, executable: &Path, bundle_root: &Path) -> Result<PathBuf>;
}

/// Collaborators and identity used for one resign run.
pub struct Toolchain<'a, S: CodeSigner> {
    codec: Arc<dyn PlistCodec>,
    sealer: &'a dyn SealBuilder,
    signer: &'a S,
    identity: &'a S::Identity,
}

impl<'a, S: CodeSigner> Toolchain<'a, S> {
    /// Create a toolchain that reads and writes plists with [`PlistFile`].
    pub fn new(signer: &'a S, sealer: &'a dyn SealBuilder, identity: &'a S::Identity) -> Self {
        Self {
            codec: Arc::new(PlistFile),
            sealer,
            signer,
            identity,
        }
    }

    /// Replace the plist codec.
    pub fn with_codec(mut self, codec: Arc<dyn PlistCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// The plist codec, for opening bundles that this toolchain will resign.
    pub fn codec(&self) -> Arc<dyn PlistCodec> {
        Arc::clone(&self.codec)
    }

    pub(crate) fn seal(&self, executable: &Path, bundle_root: &Path) -> Result<PathBuf> {
        self.sealer.build(executable, bundle_root)
    }

    pub(crate) fn sign(&self, target: &SignTarget<'_>) -> Result<()> {
        self.signer.sign(target, self.identity)
    }
}
