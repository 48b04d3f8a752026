pub mod builder;
pub mod bundle;
pub mod error;
pub mod ipa;
pub mod provision;
pub mod resign;
pub mod signer;

pub use builder::Resign;
pub use bundle::{App, AppKind, Bundle, Classified, Framework, InfoPlist, PlistCodec, PlistFile};
pub use error::Error;
pub use ipa::{create_ipa, extract_ipa, validate_ipa, CompressionLevel};
pub use provision::ProvisioningProfile;
pub use signer::{CodeSigner, Codesign, SealBuilder, SignTarget, Toolchain};

pub type Result<T> = std::result::Result<T, Error>;
