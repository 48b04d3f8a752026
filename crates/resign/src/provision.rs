//! Provisioning profile loading.
//!
//! A `.mobileprovision` file is a CMS signed-data envelope around an XML
//! plist. The envelope is not verified; the payload is located by its
//! `<?xml version=` and `</plist>` markers and decoded.

use crate::{Error, Result};
use plist::{Dictionary, Value};
use std::fs;
use std::path::{Path, PathBuf};

const PLIST_START: &[u8] = b"<?xml version=";
const PLIST_END: &[u8] = b"</plist>";

/// Key of the entitlements dictionary inside a profile.
pub const ENTITLEMENTS: &str = "Entitlements";
/// Entitlement holding the team-prefixed bundle identifier pattern.
pub const APPLICATION_IDENTIFIER: &str = "application-identifier";

/// Decoded payload of a provisioning profile.
#[derive(Debug, Clone)]
pub struct ProvisioningProfile {
    path: PathBuf,
    payload: Dictionary,
}

impl ProvisioningProfile {
    /// Read the profile at `path` and decode its embedded plist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        let payload = Self::extract_payload(&data)?;
        Ok(Self {
            path: path.to_path_buf(),
            payload,
        })
    }

    /// Locate and decode the plist embedded in raw profile bytes.
    ///
    /// Uses the first occurrence of each marker.
    pub fn extract_payload(data: &[u8]) -> Result<Dictionary> {
        let start = find(data, PLIST_START).ok_or_else(|| {
            Error::MalformedCredential("no plist start marker in profile".into())
        })?;
        let end = find(data, PLIST_END)
            .map(|p| p + PLIST_END.len())
            .ok_or_else(|| Error::MalformedCredential("no plist end marker in profile".into()))?;

        if end <= start {
            return Err(Error::MalformedCredential(
                "plist end marker precedes start marker".into(),
            ));
        }

        let value: Value = plist::from_bytes(&data[start..end]).map_err(|e| {
            Error::MalformedCredential(format!("failed to parse embedded plist: {}", e))
        })?;

        value
            .into_dictionary()
            .ok_or_else(|| Error::MalformedCredential("profile payload is not a dictionary".into()))
    }

    /// File the profile was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole decoded payload.
    pub fn payload(&self) -> &Dictionary {
        &self.payload
    }

    /// The `Entitlements` dictionary.
    pub fn entitlements(&self) -> Result<&Dictionary> {
        self.payload
            .get(ENTITLEMENTS)
            .and_then(Value::as_dictionary)
            .ok_or_else(|| Error::KeyNotFound(ENTITLEMENTS.to_string()))
    }

    /// The `application-identifier` entitlement, e.g. `TEAM.com.acme.*`.
    pub fn application_identifier(&self) -> Result<&str> {
        self.entitlements()?
            .get(APPLICATION_IDENTIFIER)
            .and_then(Value::as_string)
            .ok_or_else(|| Error::KeyNotFound(APPLICATION_IDENTIFIER.to_string()))
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
