//! `codesign` command-line tool as a signing collaborator.

use super::{CodeSigner, SealBuilder, SignTarget};
use crate::{Error, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Signs by running a `codesign`-compatible tool.
///
/// Dylibs are signed by file; frameworks and apps are signed by bundle
/// directory, which makes the tool write the bundle's resource seal as part
/// of signing. [`SealBuilder::build`] therefore only reports where that seal
/// will live.
///
/// The identity is the name or SHA-1 hash of a keychain signing identity, or
/// `-` for ad-hoc signing.
#[derive(Debug, Clone)]
pub struct Codesign {
    program: PathBuf,
}

impl Codesign {
    /// Use `codesign` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("codesign"),
        }
    }

    /// Use a different executable.
    pub fn program(mut self, program: impl AsRef<Path>) -> Self {
        self.program = program.as_ref().to_path_buf();
        self
    }

    fn run<I, A>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args);
        debug!("running {:?}", command);

        let output = command.output().map_err(|e| {
            Error::Signing(format!("failed to run {}: {}", self.program.display(), e))
        })?;

        if !output.status.success() {
            return Err(Error::Signing(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Default for Codesign {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeSigner for Codesign {
    type Identity = str;

    fn sign(&self, target: &SignTarget<'_>, identity: &str) -> Result<()> {
        let mut args: Vec<&OsStr> = vec![
            OsStr::new("--force"),
            OsStr::new("--sign"),
            OsStr::new(identity),
        ];

        match target {
            SignTarget::Dylib { path } => args.push(path.as_os_str()),
            SignTarget::Framework { bundle, .. } => args.push(bundle.path().as_os_str()),
            SignTarget::Executable {
                bundle,
                entitlements,
                ..
            } => {
                if let Some(entitlements) = entitlements {
                    args.push(OsStr::new("--entitlements"));
                    args.push(entitlements.as_os_str());
                }
                args.push(bundle.path().as_os_str());
            }
        }

        self.run(args)
    }
}

impl SealBuilder for Codesign {
    fn build(&self, _executable: &Path, bundle_root: &Path) -> Result<PathBuf> {
        Ok(bundle_root.join("_CodeSignature").join("CodeResources"))
    }
}
