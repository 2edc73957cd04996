use crate::cert::{validate, ParsedCertificate, ValidityChecker};
use crate::keychain::attributes::AttributeRecord;
use crate::keychain::extractor::CertificateExtractor;
use crate::keychain::query::identity_search_criteria;
use crate::native::{HandleKind, NativeStore, Owned, ERR_SEC_ITEM_NOT_FOUND};
use crate::utils::errors::{KeychainError, Result};
use thiserror::Error;

/// A matched identity, retained so it outlives the search results.
#[derive(Debug)]
pub struct IdentityRecord<'s> {
    handle: Owned<'s>,
    label: String,
    certificate: Option<ParsedCertificate>,
}

impl<'s> IdentityRecord<'s> {
    pub fn handle(&self) -> &Owned<'s> {
        &self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The certificate read during validation, if the record went through it.
    pub fn certificate(&self) -> Option<&ParsedCertificate> {
        self.certificate.as_ref()
    }
}

/// Validation pass aborted by an extraction error.
///
/// `accepted` holds the identities that passed validation before the failure.
#[derive(Debug, Error)]
#[error("{error} ({} identities accepted before the failure)", .accepted.len())]
pub struct PartialIdentities<'s> {
    pub accepted: Vec<IdentityRecord<'s>>,
    #[source]
    pub error: KeychainError,
}

/// Exact match or case-sensitive substring match.
pub fn label_matches(candidate: &str, label: &str, full_match: bool) -> bool {
    if full_match {
        candidate == label
    } else {
        candidate.contains(label)
    }
}

pub struct IdentityLocator<'s> {
    store: &'s dyn NativeStore,
}

impl<'s> IdentityLocator<'s> {
    pub fn new(store: &'s dyn NativeStore) -> Self {
        Self { store }
    }

    /// Find identities whose label matches, in store order.
    ///
    /// Fails with `NotFound` when the keychain holds no identity at all, before
    /// any label filtering. Any attribute that cannot be read aborts the whole
    /// search; records collected so far are released.
    pub fn find_identities(&self, label: &str, full_match: bool) -> Result<Vec<IdentityRecord<'s>>> {
        let criteria = identity_search_criteria();
        let results = match self.store.copy_matching(&criteria) {
            Ok(raw) => Owned::adopt(self.store, raw),
            Err(ERR_SEC_ITEM_NOT_FOUND) => return Err(KeychainError::NotFound),
            Err(status) => return Err(KeychainError::Query { status }),
        };

        let results_view = results.borrow();
        if results_view.kind() != HandleKind::Array {
            return Err(KeychainError::Extraction(
                "search result is not an array".to_string(),
            ));
        }

        let count = results_view.array_len();
        if count == 0 {
            return Err(KeychainError::NotFound);
        }
        tracing::debug!("Keychain returned {} identities", count);

        let mut matches = Vec::new();
        for index in 0..count {
            let entry = results_view.array_get(index).ok_or_else(|| {
                KeychainError::Extraction(format!("search result entry {index} is missing"))
            })?;
            let record = AttributeRecord::new(entry)?;

            let candidate = record.label()?;
            tracing::trace!("Checking identity label: '{}'", candidate);
            if !label_matches(&candidate, label, full_match) {
                continue;
            }
            tracing::debug!("Found identity with label: {}", candidate);

            let handle = record.value_ref()?.retain();
            matches.push(IdentityRecord {
                handle,
                label: candidate,
                certificate: None,
            });
        }

        tracing::debug!(
            "{} of {} identities match label '{}'",
            matches.len(),
            count,
            label
        );
        Ok(matches)
    }

    /// Find matching identities and keep those whose certificate is valid.
    ///
    /// Invalid certificates are logged and skipped. A certificate that cannot
    /// be read aborts the pass; the error carries what was accepted so far.
    pub fn find_and_validate_identities(
        &self,
        label: &str,
        full_match: bool,
        checker: &dyn ValidityChecker,
    ) -> std::result::Result<Vec<IdentityRecord<'s>>, PartialIdentities<'s>> {
        let candidates =
            self.find_identities(label, full_match)
                .map_err(|error| PartialIdentities {
                    accepted: Vec::new(),
                    error,
                })?;

        let extractor = CertificateExtractor::new(self.store);
        let mut accepted = Vec::new();
        for mut candidate in candidates {
            let cert = match extractor.certificate_from_identity(candidate.handle.borrow()) {
                Ok(cert) => cert,
                Err(error) => return Err(PartialIdentities { accepted, error }),
            };

            if let Err(reason) = validate(&cert, checker) {
                tracing::warn!(
                    "Certificate of '{}' is not valid, skipping: {}",
                    candidate.label,
                    reason
                );
                continue;
            }

            candidate.certificate = Some(cert);
            accepted.push(candidate);
        }

        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::FakeKeychain;

    const DER: &[u8] = include_bytes!("../../tests/fixtures/test_cert.der");

    #[test]
    fn test_label_matches() {
        assert!(label_matches("iPhone Developer: A", "iPhone Developer", false));
        assert!(!label_matches("iPhone Developer: A", "iPhone Developer", true));
        assert!(label_matches("iPhone Developer: A", "iPhone Developer: A", true));
        assert!(!label_matches("iphone developer: a", "iPhone Developer", false));
        assert!(label_matches("anything", "", false));
    }

    #[test]
    fn test_empty_result_array_is_not_found() {
        let store = FakeKeychain::new().empty_search_array();
        let err = IdentityLocator::new(&store)
            .find_identities("x", false)
            .unwrap_err();

        assert!(matches!(err, KeychainError::NotFound));
        assert!(store.is_balanced());
    }

    #[test]
    fn test_no_label_match_is_empty_list() {
        let store = FakeKeychain::new().with_identity("Other", DER);
        let records = IdentityLocator::new(&store)
            .find_identities("iPhone", false)
            .unwrap();

        assert!(records.is_empty());
        assert!(store.is_balanced());
    }

    #[test]
    fn test_missing_label_aborts_and_releases_matches() {
        let store = FakeKeychain::new()
            .with_identity("Match 1", DER)
            .with_unlabelled_entry(DER);
        let err = IdentityLocator::new(&store)
            .find_identities("Match", false)
            .unwrap_err();

        assert!(matches!(err, KeychainError::Extraction(ref msg) if msg.contains("labl")));
        assert!(store.is_balanced());
    }

    #[test]
    fn test_missing_reference_aborts_and_releases_matches() {
        let store = FakeKeychain::new()
            .with_identity("Match 1", DER)
            .with_reference_missing("Match 2");
        let err = IdentityLocator::new(&store)
            .find_identities("Match", false)
            .unwrap_err();

        assert!(matches!(err, KeychainError::Extraction(ref msg) if msg.contains("v_Ref")));
        assert!(store.is_balanced());
    }

    #[test]
    fn test_search_failure_carries_status() {
        let store = FakeKeychain::new()
            .with_identity("Match 1", DER)
            .failing_search(-25293);
        let err = IdentityLocator::new(&store)
            .find_identities("Match", false)
            .unwrap_err();

        assert!(matches!(err, KeychainError::Query { status: -25293 }));
        assert!(store.is_balanced());
    }

    #[test]
    fn test_validation_keeps_parsed_certificate() {
        let store = FakeKeychain::new().with_identity("Match 1", DER);
        let records = IdentityLocator::new(&store)
            .find_and_validate_identities("Match", false, &crate::cert::ExpiryChecker::default())
            .unwrap();

        assert_eq!(records[0].certificate().unwrap().subject, "CN=Test");
        assert!(IdentityLocator::new(&store)
            .find_identities("Match", false)
            .unwrap()[0]
            .certificate()
            .is_none());
    }

    #[test]
    fn test_records_survive_result_release() {
        let store = FakeKeychain::new().with_identity("Keep", DER);
        let identity = store.identity_handles()[0];

        let records = IdentityLocator::new(&store).find_identities("Keep", true).unwrap();
        // Store reference plus the retained record.
        assert_eq!(store.ref_count(identity), 2);

        drop(records);
        assert_eq!(store.ref_count(identity), 1);
        assert!(store.is_balanced());
    }
}
