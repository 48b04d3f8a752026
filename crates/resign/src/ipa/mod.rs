//! IPA handling module.
//!
//! An IPA is a ZIP archive holding `Payload/<name>.app`. Resigning one means
//! extracting it, resigning the app directory in place and packing the
//! result into a new archive; see [`crate::Resign::sign_ipa`].

pub mod archive;
pub mod extract;

pub use archive::{create_ipa, CompressionLevel};
pub use extract::{extract_ipa, validate_ipa};
