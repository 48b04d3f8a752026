//! Resign builder API
//!
//! Provides a builder pattern interface over the resign traversal for app
//! directories and IPA files.

use crate::bundle::App;
use crate::ipa::{create_ipa, extract_ipa, validate_ipa, CompressionLevel};
use crate::signer::{CodeSigner, Toolchain};
use crate::{Error, Result};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

/// iOS app re-signing with builder pattern API.
///
/// # Example
///
/// ```no_run
/// use resign::signer::{Codesign, Toolchain};
/// use resign::Resign;
///
/// let codesign = Codesign::new();
/// let tools = Toolchain::new(&codesign, &codesign, "Apple Development: Jane Doe");
///
/// Resign::new()
///     .provisioning_profile("profile.mobileprovision")
///     .bundle_id("TEAMID.com.example.app")
///     .sign_ipa("input.ipa", "output.ipa", &tools)?;
/// # Ok::<(), resign::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Resign {
    provisioning_profile: Option<PathBuf>,
    bundle_id: Option<String>,
    compression_level: CompressionLevel,
}

impl Resign {
    /// Create a new Resign builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set provisioning profile path (.mobileprovision format).
    ///
    /// The profile is embedded in the app and supplies the entitlements and,
    /// unless [`Resign::bundle_id`] is set, the identifier candidate.
    pub fn provisioning_profile(mut self, path: impl AsRef<Path>) -> Self {
        self.provisioning_profile = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set an explicit team-prefixed bundle identifier (`TEAMID.com.example.app`).
    ///
    /// The first segment is dropped before it is compared with the app's
    /// current identifier.
    pub fn bundle_id(mut self, id: impl Into<String>) -> Self {
        self.bundle_id = Some(id.into());
        self
    }

    /// Set ZIP compression level for IPA output (0-9).
    ///
    /// 0 = no compression (fastest), 9 = maximum compression (smallest).
    /// Default is 6 (balanced).
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = CompressionLevel::new(level);
        self
    }

    /// Validate the builder configuration.
    ///
    /// Returns an error if:
    /// - No provisioning profile is configured
    /// - The configured provisioning profile does not exist
    /// - The explicit bundle id is empty or has no segment after the team
    ///   prefix
    pub fn validate(&self) -> Result<()> {
        let profile = self.profile()?;

        if !profile.is_file() {
            return Err(Error::Config(format!(
                "Provisioning profile not found: {}",
                profile.display()
            )));
        }

        if let Some(id) = self.bundle_id.as_deref() {
            if id.trim().is_empty() {
                return Err(Error::Config("Bundle id must not be empty".into()));
            }
            if id.split('.').skip(1).all(str::is_empty) {
                return Err(Error::Config(format!(
                    "Bundle id must be team-prefixed (TEAMID.com.example.app): {}",
                    id
                )));
            }
        }

        Ok(())
    }

    fn profile(&self) -> Result<&Path> {
        self.provisioning_profile.as_deref().ok_or_else(|| {
            Error::MissingCredentials("Must specify a provisioning profile".into())
        })
    }

    /// Resign an `.app` directory in place.
    ///
    /// Returns the resigned app so callers can inspect what changed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The directory is not a native iOS app ([`Error::NotApplicable`])
    /// - Any step of the resign fails; the directory may then be left
    ///   partially modified
    pub fn sign_bundle<S: CodeSigner>(
        &self,
        app_path: impl AsRef<Path>,
        tools: &Toolchain<'_, S>,
    ) -> Result<App> {
        self.validate()?;

        let mut app = App::open(app_path, self.bundle_id.clone(), tools.codec())?;
        app.resign(tools, self.profile()?)?;
        Ok(app)
    }

    /// Resign an IPA file.
    ///
    /// Extracts the IPA to a temporary directory, resigns the app in
    /// `Payload/` and writes a new IPA to `output`. The input is not
    /// modified.
    pub fn sign_ipa<S: CodeSigner>(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        tools: &Toolchain<'_, S>,
    ) -> Result<()> {
        let input = input.as_ref();
        let output = output.as_ref();

        self.validate()?;
        validate_ipa(input)?;

        let temp_dir = TempDir::new()?;
        let app_path = extract_ipa(input, temp_dir.path())?;

        self.sign_bundle(&app_path, tools)?;
        create_ipa(&app_path, output, self.compression_level)?;

        info!("Wrote {}", output.display());
        Ok(())
    }
}
