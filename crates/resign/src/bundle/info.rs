//! `Info.plist` metadata store with change tracking.

use super::plist_file::{PlistCodec, PlistFormat};
use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Key holding the bundle identifier.
pub const BUNDLE_IDENTIFIER: &str = "CFBundleIdentifier";
/// Key holding the main executable's file name.
pub const BUNDLE_EXECUTABLE: &str = "CFBundleExecutable";
/// Key holding the URL scheme registrations.
pub const BUNDLE_URL_TYPES: &str = "CFBundleURLTypes";
/// Key inside each URL type entry naming the registration.
pub const BUNDLE_URL_NAME: &str = "CFBundleURLName";

/// The property dictionary of a bundle's `Info.plist`.
///
/// Mutations go through [`InfoPlist::update`], which writes the file back
/// (binary encoding) only when a value actually changes.
///
/// # Baseline transitions
///
/// The store keeps an optional baseline: a copy of the dictionary taken
/// right before the first committed change.
///
/// - An update that changes something keeps the existing baseline, or takes
///   one if there is none. If the dictionary then equals the baseline again
///   (a full revert), the baseline is cleared.
/// - An update that changes nothing clears the baseline.
///
/// [`InfoPlist::has_changes`] is true exactly while a baseline is held.
pub struct InfoPlist {
    path: PathBuf,
    props: Dictionary,
    baseline: Option<Dictionary>,
    codec: Arc<dyn PlistCodec>,
}

impl InfoPlist {
    /// Read the property list at `path`.
    pub fn load(path: impl AsRef<Path>, codec: Arc<dyn PlistCodec>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let props = codec.read(&path)?;
        Ok(Self::from_dictionary(path, props, codec))
    }

    /// Wrap an already decoded dictionary that lives at `path`.
    pub fn from_dictionary(
        path: impl Into<PathBuf>,
        props: Dictionary,
        codec: Arc<dyn PlistCodec>,
    ) -> Self {
        Self {
            path: path.into(),
            props,
            baseline: None,
            codec,
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn codec(&self) -> Arc<dyn PlistCodec> {
        Arc::clone(&self.codec)
    }

    /// The current properties.
    pub fn props(&self) -> &Dictionary {
        &self.props
    }

    /// Look up `key`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.props
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Look up `key` as a string; `None` if it is absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_string)
    }

    /// Apply `new_props` and persist the result if anything differs.
    ///
    /// When `CFBundleIdentifier` changes and the update does not set
    /// `CFBundleURLTypes` itself, URL types named after the old identifier
    /// are renamed to the new one.
    ///
    /// Returns whether the file was written.
    pub fn update(&mut self, new_props: Dictionary) -> Result<bool> {
        let snapshot = self.baseline.take().unwrap_or_else(|| self.props.clone());

        let mut changed = self.rename_url_types(&new_props);

        for (key, value) in new_props {
            match self.props.get(&key) {
                Some(current) if *current == value => continue,
                Some(_) => {}
                None => warn!("Adding new Info.plist key: {}", key),
            }
            self.props.insert(key, value);
            changed = true;
        }

        if !changed {
            return Ok(false);
        }

        self.baseline = (snapshot != self.props).then_some(snapshot);

        self.codec
            .write(&self.props, &self.path, PlistFormat::Binary)
            .map_err(|e| Error::Persistence {
                path: self.path.clone(),
                source: Box::new(e),
            })?;
        Ok(true)
    }

    /// Whether a committed change is outstanding against the baseline.
    pub fn has_changes(&self) -> bool {
        self.baseline.is_some()
    }

    /// Whether `key` differs from its baseline value.
    ///
    /// Always false without a baseline. A key missing on either side counts
    /// as changed.
    pub fn has_changed(&self, key: &str) -> bool {
        let Some(baseline) = &self.baseline else {
            return false;
        };
        match (self.props.get(key), baseline.get(key)) {
            (Some(current), Some(original)) => current != original,
            _ => true,
        }
    }

    fn rename_url_types(&mut self, new_props: &Dictionary) -> bool {
        if new_props.contains_key(BUNDLE_URL_TYPES) {
            return false;
        }
        let Some(new_id) = new_props.get(BUNDLE_IDENTIFIER).and_then(Value::as_string) else {
            return false;
        };
        let Some(old_id) = self.get_str(BUNDLE_IDENTIFIER).map(str::to_owned) else {
            return false;
        };
        if old_id == new_id {
            return false;
        }
        let Some(url_types) = self
            .props
            .get_mut(BUNDLE_URL_TYPES)
            .and_then(Value::as_array_mut)
        else {
            return false;
        };

        let mut renamed = false;
        for url_type in url_types.iter_mut().filter_map(Value::as_dictionary_mut) {
            if url_type.get(BUNDLE_URL_NAME).and_then(Value::as_string) == Some(old_id.as_str()) {
                url_type.insert(BUNDLE_URL_NAME.to_string(), Value::String(new_id.to_string()));
                renamed = true;
            }
        }
        renamed
    }
}

impl std::fmt::Debug for InfoPlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfoPlist")
            .field("path", &self.path)
            .field("props", &self.props)
            .field("has_changes", &self.has_changes())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Codec that counts writes and never touches the disk.
    #[derive(Default)]
    struct CountingCodec {
        writes: Cell<usize>,
    }

    impl PlistCodec for CountingCodec {
        fn read(&self, _path: &Path) -> Result<Dictionary> {
            Ok(Dictionary::new())
        }

        fn write(&self, _dict: &Dictionary, _path: &Path, format: PlistFormat) -> Result<()> {
            assert_eq!(format, PlistFormat::Binary);
            self.writes.set(self.writes.get() + 1);
            Ok(())
        }
    }

    struct FailingCodec;

    impl PlistCodec for FailingCodec {
        fn read(&self, _path: &Path) -> Result<Dictionary> {
            Ok(Dictionary::new())
        }

        fn write(&self, _dict: &Dictionary, _path: &Path, _format: PlistFormat) -> Result<()> {
            Err(Error::Io(std::io::Error::other("disk full")))
        }
    }

    fn props(pairs: &[(&str, &str)]) -> Dictionary {
        let mut dict = Dictionary::new();
        for (k, v) in pairs {
            dict.insert(k.to_string(), Value::String(v.to_string()));
        }
        dict
    }

    fn store(initial: Dictionary) -> (InfoPlist, Arc<CountingCodec>) {
        let codec = Arc::new(CountingCodec::default());
        let info = InfoPlist::from_dictionary("Info.plist", initial, codec.clone());
        (info, codec)
    }

    #[test]
    fn test_get_missing_key() {
        let (info, _) = store(props(&[("K", "v0")]));
        assert!(matches!(info.get("Nope"), Err(Error::KeyNotFound(k)) if k == "Nope"));
        assert_eq!(info.get("K").unwrap().as_string(), Some("v0"));
    }

    #[test]
    fn test_update_writes_once_and_tracks_baseline() {
        let (mut info, codec) = store(props(&[("K", "v0")]));

        assert!(info.update(props(&[("K", "v1")])).unwrap());
        assert_eq!(codec.writes.get(), 1);
        assert!(info.has_changes());
        assert!(info.has_changed("K"));
        // absent on both sides still counts once a baseline exists
        assert!(info.has_changed("Other"));
    }

    #[test]
    fn test_repeated_update_is_noop() {
        let (mut info, codec) = store(props(&[("K", "v0")]));

        info.update(props(&[("K", "v1")])).unwrap();
        assert!(!info.update(props(&[("K", "v1")])).unwrap());

        assert_eq!(codec.writes.get(), 1);
        assert!(!info.has_changes());
        assert!(!info.has_changed("K"));
    }

    #[test]
    fn test_revert_clears_baseline() {
        let (mut info, codec) = store(props(&[("K", "v0")]));

        info.update(props(&[("K", "v1")])).unwrap();
        info.update(props(&[("K", "v0")])).unwrap();

        assert_eq!(codec.writes.get(), 2);
        assert!(!info.has_changes());
        assert_eq!(info.get_str("K"), Some("v0"));
    }

    #[test]
    fn test_new_key_counts_as_change() {
        let (mut info, _) = store(Dictionary::new());

        assert!(info.update(props(&[("Added", "yes")])).unwrap());
        assert!(info.has_changed("Added"));
    }

    #[test]
    fn test_bundle_id_change_renames_matching_url_types() {
        let mut initial = props(&[(BUNDLE_IDENTIFIER, "com.acme.App")]);
        let url_types = vec![
            Value::Dictionary(props(&[(BUNDLE_URL_NAME, "com.acme.App")])),
            Value::Dictionary(props(&[(BUNDLE_URL_NAME, "com.acme.Other")])),
            Value::Dictionary(props(&[("CFBundleURLSchemes", "acme")])),
        ];
        initial.insert(BUNDLE_URL_TYPES.into(), Value::Array(url_types));
        let (mut info, _) = store(initial);

        info.update(props(&[(BUNDLE_IDENTIFIER, "com.other.App")])).unwrap();

        let names: Vec<_> = info
            .get(BUNDLE_URL_TYPES)
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|v| {
                v.as_dictionary()
                    .and_then(|d| d.get(BUNDLE_URL_NAME))
                    .and_then(Value::as_string)
            })
            .collect();
        assert_eq!(names, vec![Some("com.other.App"), Some("com.acme.Other"), None]);
        assert!(info.has_changed(BUNDLE_URL_TYPES));
    }

    #[test]
    fn test_explicit_url_types_are_not_renamed() {
        let mut initial = props(&[(BUNDLE_IDENTIFIER, "com.acme.App")]);
        initial.insert(
            BUNDLE_URL_TYPES.into(),
            Value::Array(vec![Value::Dictionary(props(&[(BUNDLE_URL_NAME, "com.acme.App")]))]),
        );
        let (mut info, _) = store(initial);

        let mut update = props(&[(BUNDLE_IDENTIFIER, "com.other.App")]);
        update.insert(BUNDLE_URL_TYPES.into(), Value::Array(Vec::new()));
        info.update(update).unwrap();

        assert_eq!(info.get(BUNDLE_URL_TYPES).unwrap().as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_write_failure_is_persistence_error() {
        let mut info =
            InfoPlist::from_dictionary("Info.plist", props(&[("K", "v0")]), Arc::new(FailingCodec));

        let result = info.update(props(&[("K", "v1")]));
        assert!(matches!(result, Err(Error::Persistence { .. })));
    }
}
