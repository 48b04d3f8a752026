//! App and app extension bundles.
//!
//! Both carry a provisioning profile, entitlements and a bundle identifier
//! that may need rewriting. They differ only in how strictly the profile
//! steps are applied, which is captured by a [`ProvisionHooks`] record per
//! [`AppKind`].

use super::identifier;
use super::info::BUNDLE_IDENTIFIER;
use super::plist_file::{PlistCodec, PlistFormat};
use super::{Bundle, Classified};
use crate::provision::ProvisioningProfile;
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the provisioning profile is embedded in an app bundle.
pub const EMBEDDED_PROFILE: &str = "embedded.mobileprovision";
/// Where the entitlements used for signing are written.
pub const ENTITLEMENTS_PLIST: &str = "Entitlements.plist";

/// Which flavour of app bundle this is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppKind {
    /// A user-visible `.app`; the provisioning profile is mandatory.
    App,
    /// A `.appex` plug-in; profile and entitlements are used only if present.
    Extension,
}

/// Per-variant provisioning steps, run in declaration order before the
/// bundle's contents are signed.
pub(crate) struct ProvisionHooks {
    pub(crate) load_profile: fn(&mut App, &Path) -> Result<()>,
    pub(crate) copy_profile: fn(&App, &Path) -> Result<()>,
    pub(crate) write_entitlements: fn(&mut App) -> Result<()>,
}

static APP_HOOKS: ProvisionHooks = ProvisionHooks {
    load_profile,
    copy_profile,
    write_entitlements,
};

// An extension may ship without its own embedded profile.
static EXTENSION_HOOKS: ProvisionHooks = ProvisionHooks {
    load_profile: load_profile_if_present,
    copy_profile: copy_profile_if_embedded,
    write_entitlements: write_entitlements_if_embedded,
};

impl AppKind {
    pub(crate) fn hooks(self) -> &'static ProvisionHooks {
        match self {
            AppKind::App => &APP_HOOKS,
            AppKind::Extension => &EXTENSION_HOOKS,
        }
    }
}

/// An app or app extension bundle.
#[derive(Debug)]
pub struct App {
    bundle: Bundle,
    kind: AppKind,
    new_id: Option<String>,
    provision_path: PathBuf,
    entitlements_path: Option<PathBuf>,
    profile: Option<ProvisioningProfile>,
}

impl App {
    /// Classify `path` as an app bundle.
    ///
    /// `new_id` is a team-prefixed identifier (`TEAM.com.acme.App`) that
    /// overrides the profile's `application-identifier` when deciding the
    /// new bundle identifier.
    pub fn classify(
        path: impl AsRef<Path>,
        new_id: Option<String>,
        codec: Arc<dyn PlistCodec>,
    ) -> Result<Classified<Self>> {
        Self::classify_kind(path, AppKind::App, new_id, codec)
    }

    /// Open `path` as an app, failing with [`Error::NotApplicable`] if it is
    /// not a native iOS bundle.
    pub fn open(
        path: impl AsRef<Path>,
        new_id: Option<String>,
        codec: Arc<dyn PlistCodec>,
    ) -> Result<Self> {
        Self::classify(path, new_id, codec)?.into_result()
    }

    /// Classify `path` as an app extension.
    pub fn classify_extension(
        path: impl AsRef<Path>,
        new_id: Option<String>,
        codec: Arc<dyn PlistCodec>,
    ) -> Result<Classified<Self>> {
        Self::classify_kind(path, AppKind::Extension, new_id, codec)
    }

    fn classify_kind(
        path: impl AsRef<Path>,
        kind: AppKind,
        new_id: Option<String>,
        codec: Arc<dyn PlistCodec>,
    ) -> Result<Classified<Self>> {
        Ok(Bundle::classify(path, codec)?.map(|bundle| {
            let provision_path = bundle.path().join(EMBEDDED_PROFILE);
            let entitlements_path = Some(bundle.path().join(ENTITLEMENTS_PLIST));
            Self {
                bundle,
                kind,
                new_id,
                provision_path,
                entitlements_path,
                profile: None,
            }
        }))
    }

    /// The underlying bundle.
    pub fn bundle(&self) -> &Bundle {
        &self.bundle
    }

    pub(crate) fn bundle_mut(&mut self) -> &mut Bundle {
        &mut self.bundle
    }

    /// App or extension.
    pub fn kind(&self) -> AppKind {
        self.kind
    }

    /// The identifier candidate: the explicit override, or after
    /// [`App::change_bundle_id`] the profile's `application-identifier`.
    /// Nested extensions are resigned against it.
    pub fn new_id(&self) -> Option<&str> {
        self.new_id.as_deref()
    }

    /// Path of the embedded provisioning profile inside the bundle.
    pub fn provision_path(&self) -> &Path {
        &self.provision_path
    }

    /// Entitlements file to sign with; `None` if none will be embedded.
    pub fn entitlements_path(&self) -> Option<&Path> {
        self.entitlements_path.as_deref()
    }

    /// The loaded provisioning profile, if any.
    pub fn profile(&self) -> Option<&ProvisioningProfile> {
        self.profile.as_ref()
    }

    /// Load the profile at `path` into this app.
    pub fn load_profile(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.profile = Some(ProvisioningProfile::load(path)?);
        Ok(())
    }

    /// Rewrite `CFBundleIdentifier` to fit the identifier candidate.
    ///
    /// The candidate is the explicit override if one was given, otherwise
    /// the loaded profile's `application-identifier`, which then becomes
    /// this app's [`App::new_id`]. See [`identifier::rewrite`] for the rule.
    /// Returns the new identifier if it changed.
    pub fn change_bundle_id(&mut self) -> Result<Option<String>> {
        let candidate = if let Some(id) = self.new_id.clone() {
            id
        } else if let Some(profile) = &self.profile {
            let id = profile.application_identifier()?.to_string();
            self.new_id = Some(id.clone());
            id
        } else {
            debug!(
                "no identifier source for {}, keeping bundle id",
                self.bundle.path().display()
            );
            return Ok(None);
        };

        let old_id = self
            .bundle
            .identifier()
            .ok_or_else(|| Error::KeyNotFound(BUNDLE_IDENTIFIER.to_string()))?
            .to_string();

        let Some(rewritten) = identifier::rewrite(&old_id, &candidate) else {
            return Ok(None);
        };

        let mut update = Dictionary::new();
        update.insert(BUNDLE_IDENTIFIER.to_string(), Value::String(rewritten.clone()));
        self.bundle.info_mut().update(update)?;
        info!("change bundle id: {} -> {}", old_id, rewritten);

        Ok(Some(rewritten))
    }

    fn write_entitlements_file(&self, path: &Path) -> Result<()> {
        let profile = self.profile.as_ref().ok_or_else(|| {
            Error::MissingCredentials(format!(
                "no provisioning profile loaded for {}",
                self.bundle.path().display()
            ))
        })?;
        let codec = self.bundle.info().codec();
        codec.write(profile.entitlements()?, path, PlistFormat::Xml)?;
        debug!("wrote entitlements to {}", path.display());
        Ok(())
    }
}

fn load_profile(app: &mut App, source: &Path) -> Result<()> {
    app.load_profile(source)
}

fn load_profile_if_present(app: &mut App, source: &Path) -> Result<()> {
    if source.exists() {
        app.load_profile(source)?;
    }
    Ok(())
}

fn copy_profile(app: &App, source: &Path) -> Result<()> {
    fs::copy(source, &app.provision_path)?;
    Ok(())
}

fn copy_profile_if_embedded(app: &App, source: &Path) -> Result<()> {
    if source.exists() && app.provision_path.exists() {
        copy_profile(app, source)?;
    }
    Ok(())
}

fn write_entitlements(app: &mut App) -> Result<()> {
    match app.entitlements_path.clone() {
        Some(path) => app.write_entitlements_file(&path),
        None => Ok(()),
    }
}

fn write_entitlements_if_embedded(app: &mut App) -> Result<()> {
    if app.profile.is_none() || !app.provision_path.exists() {
        // signing must not reference an entitlements file that was never written
        app.entitlements_path = None;
        return Ok(());
    }
    write_entitlements(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::write_info;
    use crate::bundle::PlistFile;
    use tempfile::TempDir;

    const PROFILE: &str = r#"CMS<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0">
<dict>
    <key>Entitlements</key>
    <dict>
        <key>application-identifier</key>
        <string>TEAM.com.acme.*</string>
        <key>get-task-allow</key>
        <true/>
    </dict>
</dict>
</plist>SIG"#;

    fn write_profile(dir: &Path) -> PathBuf {
        let path = dir.join("new.mobileprovision");
        fs::write(&path, PROFILE).unwrap();
        path
    }

    #[test]
    fn test_app_hooks_load_copy_and_write() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Test.app");
        write_info(&dir, "com.acme.App", Some("Test"));
        let source = write_profile(temp_dir.path());

        let mut app = App::open(&dir, None, Arc::new(PlistFile)).unwrap();
        let hooks = app.kind().hooks();
        (hooks.load_profile)(&mut app, &source).unwrap();
        (hooks.copy_profile)(&app, &source).unwrap();
        (hooks.write_entitlements)(&mut app).unwrap();

        assert_eq!(fs::read_to_string(dir.join(EMBEDDED_PROFILE)).unwrap(), PROFILE);
        let entitlements = PlistFile.read(&dir.join(ENTITLEMENTS_PLIST)).unwrap();
        assert_eq!(entitlements.get("get-task-allow"), Some(&Value::Boolean(true)));
        assert_eq!(app.entitlements_path(), Some(dir.join(ENTITLEMENTS_PLIST).as_path()));
    }

    #[test]
    fn test_app_requires_profile() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Test.app");
        write_info(&dir, "com.acme.App", Some("Test"));

        let mut app = App::open(&dir, None, Arc::new(PlistFile)).unwrap();
        let missing = temp_dir.path().join("missing.mobileprovision");
        assert!((app.kind().hooks().load_profile)(&mut app, &missing).is_err());
    }

    #[test]
    fn test_extension_without_profile_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Share.appex");
        write_info(&dir, "com.acme.App.Share", Some("Share"));
        let missing = temp_dir.path().join("missing.mobileprovision");

        let mut appex = App::classify_extension(&dir, None, Arc::new(PlistFile))
            .unwrap()
            .into_result()
            .unwrap();
        let hooks = appex.kind().hooks();
        (hooks.load_profile)(&mut appex, &missing).unwrap();
        (hooks.copy_profile)(&appex, &missing).unwrap();
        (hooks.write_entitlements)(&mut appex).unwrap();

        assert!(appex.profile().is_none());
        assert!(appex.entitlements_path().is_none());
        assert!(!dir.join(ENTITLEMENTS_PLIST).exists());
        assert!(!dir.join(EMBEDDED_PROFILE).exists());
    }

    #[test]
    fn test_extension_with_embedded_profile_is_refreshed() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Share.appex");
        write_info(&dir, "com.acme.App.Share", Some("Share"));
        fs::write(dir.join(EMBEDDED_PROFILE), b"old profile").unwrap();
        let source = write_profile(temp_dir.path());

        let mut appex = App::classify_extension(&dir, None, Arc::new(PlistFile))
            .unwrap()
            .into_result()
            .unwrap();
        let hooks = appex.kind().hooks();
        (hooks.load_profile)(&mut appex, &source).unwrap();
        (hooks.copy_profile)(&appex, &source).unwrap();
        (hooks.write_entitlements)(&mut appex).unwrap();

        assert_eq!(fs::read_to_string(dir.join(EMBEDDED_PROFILE)).unwrap(), PROFILE);
        assert!(dir.join(ENTITLEMENTS_PLIST).exists());
        assert!(appex.entitlements_path().is_some());
    }

    #[test]
    fn test_extension_profile_without_embedded_copy_skips_entitlements() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Share.appex");
        write_info(&dir, "com.acme.App.Share", Some("Share"));
        let source = write_profile(temp_dir.path());

        let mut appex = App::classify_extension(&dir, None, Arc::new(PlistFile))
            .unwrap()
            .into_result()
            .unwrap();
        let hooks = appex.kind().hooks();
        (hooks.load_profile)(&mut appex, &source).unwrap();
        (hooks.copy_profile)(&appex, &source).unwrap();
        (hooks.write_entitlements)(&mut appex).unwrap();

        assert!(appex.profile().is_some());
        assert!(!dir.join(EMBEDDED_PROFILE).exists());
        assert!(appex.entitlements_path().is_none());
    }

    #[test]
    fn test_change_bundle_id_with_wildcard_profile_keeps_id() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Test.app");
        write_info(&dir, "com.acme.App", Some("Test"));
        let source = write_profile(temp_dir.path());

        let mut app = App::open(&dir, None, Arc::new(PlistFile)).unwrap();
        app.load_profile(&source).unwrap();

        assert_eq!(app.change_bundle_id().unwrap(), None);
        assert_eq!(app.new_id(), Some("TEAM.com.acme.*"));
        assert!(!app.bundle().info().has_changes());
    }

    #[test]
    fn test_change_bundle_id_with_explicit_override() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Test.app");
        write_info(&dir, "com.acme.App", Some("Test"));

        let mut app =
            App::open(&dir, Some("TEAM.com.other.App".into()), Arc::new(PlistFile)).unwrap();

        assert_eq!(app.change_bundle_id().unwrap().as_deref(), Some("com.other.App"));
        assert_eq!(app.bundle().identifier(), Some("com.other.App"));
        assert!(app.bundle().info().has_changed(BUNDLE_IDENTIFIER));

        let on_disk = PlistFile.read(&dir.join("Info.plist")).unwrap();
        assert_eq!(
            on_disk.get(BUNDLE_IDENTIFIER).and_then(Value::as_string),
            Some("com.other.App")
        );
    }

    #[test]
    fn test_change_bundle_id_identical_keeps_id() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Test.app");
        write_info(&dir, "com.acme.App", Some("Test"));

        let mut app =
            App::open(&dir, Some("TEAM.com.acme.App".into()), Arc::new(PlistFile)).unwrap();

        assert_eq!(app.change_bundle_id().unwrap(), None);
        assert_eq!(app.bundle().identifier(), Some("com.acme.App"));
    }
}
