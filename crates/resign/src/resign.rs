//! Recursive bundle re-signing.
//!
//! A bundle's signature covers a seal of every file it contains, nested
//! bundles included, so signing runs inside-out:
//!
//! 1. Frameworks under `Frameworks/` are resigned, then loose `*.dylib`
//!    files there get a binary signature.
//! 2. Loose `*.dylib` files in the bundle root are signed.
//! 3. Extensions under `PlugIns/*.appex` are resigned with the parent app's
//!    identifier candidate and provisioning profile.
//! 4. The bundle is sealed.
//! 5. The main executable is signed.
//!
//! Apps first load the provisioning profile, rewrite their identifier,
//! embed the profile and write entitlements (see [`App::resign`]).
//!
//! Nothing is rolled back on failure; run against a disposable copy.

use crate::bundle::{App, Bundle, Classified, Framework, FRAMEWORKS_DIR, INFO_PLIST, PLUGINS_DIR};
use crate::signer::{CodeSigner, SignTarget, Toolchain};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How a bundle's main executable is signed.
#[derive(Clone, Copy)]
enum Role<'a> {
    Framework,
    Executable { entitlements: Option<&'a Path> },
}

/// Identifier candidate and profile handed from an app to its extensions.
struct ExtensionSource<'a> {
    new_id: Option<&'a str>,
    provision_path: &'a Path,
}

impl Framework {
    /// Resign this framework and everything nested in it, in place.
    pub fn resign<S: CodeSigner>(&mut self, tools: &Toolchain<'_, S>) -> Result<()> {
        sign_bundle(self.bundle_mut(), tools, Role::Framework, None)?;
        info!("Resigned framework at <{}>", self.bundle().path().display());
        Ok(())
    }
}

impl App {
    /// Resign this app and everything nested in it, in place, using the
    /// provisioning profile at `provision_path`.
    pub fn resign<S: CodeSigner>(
        &mut self,
        tools: &Toolchain<'_, S>,
        provision_path: impl AsRef<Path>,
    ) -> Result<()> {
        let provision_path = provision_path.as_ref();
        let hooks = self.kind().hooks();

        (hooks.load_profile)(self, provision_path)?;
        self.change_bundle_id()?;
        (hooks.copy_profile)(self, provision_path)?;
        (hooks.write_entitlements)(self)?;

        let new_id = self.new_id().map(str::to_owned);
        let entitlements = self.entitlements_path().map(Path::to_path_buf);
        let extensions = ExtensionSource {
            new_id: new_id.as_deref(),
            provision_path,
        };
        let role = Role::Executable {
            entitlements: entitlements.as_deref(),
        };

        sign_bundle(self.bundle_mut(), tools, role, Some(&extensions))?;
        info!("Resigned bundle at <{}>", self.bundle().path().display());
        Ok(())
    }
}

fn sign_bundle<S: CodeSigner>(
    bundle: &mut Bundle,
    tools: &Toolchain<'_, S>,
    role: Role<'_>,
    extensions: Option<&ExtensionSource<'_>>,
) -> Result<()> {
    debug!("signing bundle {}", bundle.path().display());

    let frameworks_dir = bundle.path().join(FRAMEWORKS_DIR);
    if frameworks_dir.is_dir() {
        sign_frameworks(&frameworks_dir, tools)?;
        sign_dylibs(&frameworks_dir, tools)?;
    }

    // rare, but it happens
    sign_dylibs(bundle.path(), tools)?;

    let plugins_dir = bundle.path().join(PLUGINS_DIR);
    if plugins_dir.is_dir() {
        match extensions {
            Some(source) => sign_extensions(&plugins_dir, tools, source)?,
            None => warn!(
                "ignoring {} in framework {}",
                PLUGINS_DIR,
                bundle.path().display()
            ),
        }
    }

    let executable = bundle.executable_path()?;
    let seal = tools.seal(&executable, bundle.path())?;
    bundle.set_seal_path(seal);

    let target = match role {
        Role::Framework => SignTarget::Framework {
            bundle: &*bundle,
            executable: &executable,
        },
        Role::Executable { entitlements } => SignTarget::Executable {
            bundle: &*bundle,
            executable: &executable,
            entitlements,
        },
    };
    tools.sign(&target)
}

/// Resign every framework bundle directly inside `dir`.
///
/// Entries that are not native bundles are skipped. Any other failure,
/// including an unreadable `Info.plist`, aborts the resign.
fn sign_frameworks<S: CodeSigner>(dir: &Path, tools: &Toolchain<'_, S>) -> Result<()> {
    for entry in sorted_entries(dir)? {
        match Framework::classify(&entry, tools.codec())? {
            Classified::Matched(mut framework) => framework.resign(tools)?,
            Classified::NotApplicable(reason) => debug!("not a framework: {}", reason),
        }
    }
    Ok(())
}

/// Sign every `*.dylib` file directly inside `dir`.
fn sign_dylibs<S: CodeSigner>(dir: &Path, tools: &Toolchain<'_, S>) -> Result<()> {
    for path in sorted_entries(dir)? {
        if path.is_file() && path.extension().is_some_and(|ext| ext == "dylib") {
            tools.sign(&SignTarget::Dylib { path: &path })?;
            debug!("signed dylib {}", path.display());
        }
    }
    Ok(())
}

/// Resign every `*.appex` bundle directly inside `dir` that has an `Info.plist`.
fn sign_extensions<S: CodeSigner>(
    dir: &Path,
    tools: &Toolchain<'_, S>,
    source: &ExtensionSource<'_>,
) -> Result<()> {
    for path in sorted_entries(dir)? {
        if !path.extension().is_some_and(|ext| ext == "appex") || !path.join(INFO_PLIST).exists() {
            continue;
        }
        let mut appex = App::classify_extension(
            &path,
            source.new_id.map(str::to_owned),
            tools.codec(),
        )?
        .into_result()?;
        appex.resign(tools, source.provision_path)?;
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::tests::write_info;
    use crate::signer::SealBuilder;
    use crate::Error;
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        signed: RefCell<Vec<PathBuf>>,
        events: RefCell<Vec<String>>,
    }

    impl CodeSigner for Recorder {
        type Identity = str;

        fn sign(&self, target: &SignTarget<'_>, identity: &str) -> Result<()> {
            assert_eq!(identity, "-");
            self.signed.borrow_mut().push(target.binary().to_path_buf());
            self.events
                .borrow_mut()
                .push(format!("sign {}", target.binary().display()));
            Ok(())
        }
    }

    impl SealBuilder for Recorder {
        fn build(&self, _executable: &Path, bundle_root: &Path) -> Result<PathBuf> {
            self.events
                .borrow_mut()
                .push(format!("seal {}", bundle_root.display()));
            Ok(bundle_root.join("_CodeSignature/CodeResources"))
        }
    }

    #[test]
    fn test_framework_resign_signs_dylibs_then_executable() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Foo.framework");
        write_info(&dir, "com.test.foo", Some("Foo"));
        fs::write(dir.join("libz.dylib"), b"MACHO_PLACEHOLDER").unwrap();
        fs::write(dir.join("README.txt"), b"not a binary").unwrap();

        let recorder = Recorder::default();
        let tools = Toolchain::new(&recorder, &recorder, "-");
        let mut framework = Framework::open(&dir, tools.codec()).unwrap();
        framework.resign(&tools).unwrap();

        assert_eq!(
            *recorder.signed.borrow(),
            vec![dir.join("libz.dylib"), dir.join("Foo")]
        );
        assert_eq!(
            framework.bundle().seal_path(),
            Some(dir.join("_CodeSignature/CodeResources").as_path())
        );
    }

    #[test]
    fn test_non_bundle_entries_in_frameworks_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Foo.framework");
        write_info(&dir, "com.test.foo", Some("Foo"));
        fs::create_dir_all(dir.join("Frameworks/Resources.bundle")).unwrap();
        fs::write(dir.join("Frameworks/notes.txt"), b"text").unwrap();

        let recorder = Recorder::default();
        let tools = Toolchain::new(&recorder, &recorder, "-");
        Framework::open(&dir, tools.codec())
            .unwrap()
            .resign(&tools)
            .unwrap();

        assert_eq!(*recorder.signed.borrow(), vec![dir.join("Foo")]);
    }

    #[test]
    fn test_missing_executable_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Foo.framework");
        write_info(&dir, "com.test.foo", None);

        let recorder = Recorder::default();
        let tools = Toolchain::new(&recorder, &recorder, "-");
        let result = Framework::open(&dir, tools.codec()).unwrap().resign(&tools);

        assert!(matches!(result, Err(Error::MissingExecutable(_))));
        assert!(recorder.signed.borrow().is_empty());
    }

    #[test]
    fn test_malformed_profile_aborts_before_signing() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Test.app");
        write_info(&dir, "com.test.app", Some("Test"));
        let profile = temp_dir.path().join("bad.mobileprovision");
        fs::write(&profile, b"<?xml version=\"1.0\"?><plist><dict>").unwrap();

        let recorder = Recorder::default();
        let tools = Toolchain::new(&recorder, &recorder, "-");
        let mut app = App::open(&dir, None, tools.codec()).unwrap();
        let result = app.resign(&tools, &profile);

        assert!(matches!(result, Err(Error::MalformedCredential(_))));
        assert!(app.profile().is_none());
        assert!(recorder.signed.borrow().is_empty());
        assert!(!dir.join("embedded.mobileprovision").exists());
    }

    #[test]
    fn test_extension_without_profile_resigns_without_entitlements() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("Share.appex");
        write_info(&dir, "com.acme.App.Share", Some("Share"));
        let missing = temp_dir.path().join("missing.mobileprovision");

        let recorder = Recorder::default();
        let tools = Toolchain::new(&recorder, &recorder, "-");
        let mut appex = App::classify_extension(&dir, None, tools.codec())
            .unwrap()
            .into_result()
            .unwrap();
        appex.resign(&tools, &missing).unwrap();

        assert_eq!(
            *recorder.events.borrow(),
            vec![
                format!("seal {}", dir.display()),
                format!("sign {}", dir.join("Share").display()),
            ]
        );
        assert!(appex.profile().is_none());
        assert!(appex.entitlements_path().is_none());
        assert!(!dir.join("Entitlements.plist").exists());
        assert!(!dir.join("embedded.mobileprovision").exists());
    }
}
