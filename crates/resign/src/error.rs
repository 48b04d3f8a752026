//! Error types for resign operations.
//!
//! This module defines the [`enum@Error`] enum covering every failure case
//! of a resign: classification mismatches, malformed provisioning profiles,
//! missing executables, persistence failures and collaborator errors.
//!
//! # Skip vs. fatal
//!
//! [`Error::NotApplicable`] is only produced when a caller explicitly asks
//! for a bundle that does not qualify (see
//! [`Classified::into_result`](crate::bundle::Classified::into_result)).
//! Directory scans never see it: they receive
//! [`Classified::NotApplicable`](crate::bundle::Classified::NotApplicable)
//! instead, so a genuine I/O or decode error cannot be mistaken for
//! "not a bundle".
//!
//! # See Also
//!
//! - [`crate::Result`] - Convenience type alias using this error

use std::path::PathBuf;
use thiserror::Error;

/// Error type for resign operations.
///
/// All public functions in this crate return [`crate::Result<T>`], which uses this error type.
///
/// # Examples
///
/// ```no_run
/// use resign::bundle::{App, PlistFile};
/// use resign::Error;
/// use std::sync::Arc;
///
/// match App::open("Payload/MyApp.app", None, Arc::new(PlistFile)) {
///     Ok(app) => println!("bundle id: {:?}", app.bundle().identifier()),
///     Err(Error::NotApplicable(why)) => eprintln!("not an iOS app: {why}"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Property list decoding or encoding failed.
    ///
    /// Raised for `Info.plist`, entitlements and profile payloads.
    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    /// ZIP archive operation failed.
    ///
    /// Occurs during IPA extraction or creation. See [`crate::ipa`] module.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The directory is not a signable native iOS bundle.
    ///
    /// Either `Info.plist` is missing or it does not list `iPhoneOS` among
    /// its supported platforms.
    #[error("Not applicable: {0}")]
    NotApplicable(String),

    /// The provisioning profile does not embed a readable plist payload.
    #[error("Malformed provisioning profile: {0}")]
    MalformedCredential(String),

    /// The bundle's main executable could not be found.
    #[error("Could not find executable: {}", .0.display())]
    MissingExecutable(PathBuf),

    /// A required key is absent from a property list.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// Writing a property list back to disk failed.
    #[error("Failed to persist {}: {source}", path.display())]
    Persistence {
        /// File that could not be written.
        path: PathBuf,
        /// Underlying codec failure.
        #[source]
        source: Box<Error>,
    },

    /// The code signer rejected or failed to sign a target.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Invalid builder configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Required credentials not configured.
    ///
    /// Signing was attempted without first calling
    /// [`crate::Resign::provisioning_profile`].
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}
