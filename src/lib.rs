pub mod cert;
pub mod cli;
pub mod config;
pub mod keychain;
pub mod native;
pub mod utils;

// Re-export specific items to avoid conflicts
pub use cert::{CertificateParser, ExpiryChecker, ParsedCertificate, ValidityChecker};
pub use cli::{args, commands};
pub use config::Config;
pub use keychain::{
    CertificateExtractor, ExportRequest, Exporter, IdentityLocator, IdentityRecord,
    PartialIdentities, PassphraseMode,
};
pub use native::{Borrowed, FakeKeychain, NativeStore, Owned};
pub use utils::{errors, paths};
