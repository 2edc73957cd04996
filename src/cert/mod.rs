pub mod metadata;
pub mod parser;
pub mod validity;

pub use metadata::{IdentityColumn, IdentitySummary, ParsedCertificate};
pub use parser::CertificateParser;
pub use validity::{validate, ExpiryChecker, InvalidCertificate, ValidityChecker};
