pub mod attributes;
pub mod export;
pub mod extractor;
pub mod locator;
pub mod query;

pub use attributes::AttributeRecord;
pub use export::{ExportRequest, Exporter, PassphraseMode, EXPORT_PROMPT};
pub use extractor::CertificateExtractor;
pub use locator::{label_matches, IdentityLocator, IdentityRecord, PartialIdentities};
pub use query::{identity_search_criteria, ItemClass, MatchLimit, QueryCriteria};
