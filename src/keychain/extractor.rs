use crate::cert::{CertificateParser, ParsedCertificate};
use crate::native::{Borrowed, NativeStore, Owned};
use crate::utils::errors::{KeychainError, Result};

/// Reads the certificate half of keychain identities.
pub struct CertificateExtractor<'s> {
    store: &'s dyn NativeStore,
}

impl<'s> CertificateExtractor<'s> {
    pub fn new(store: &'s dyn NativeStore) -> Self {
        Self { store }
    }

    /// Parse the certificate paired with an identity.
    pub fn certificate_from_identity(&self, identity: Borrowed<'_, '_>) -> Result<ParsedCertificate> {
        let der = self.certificate_der(identity)?;
        CertificateParser::parse_der(&der)
    }

    /// Raw DER bytes of the identity's certificate.
    ///
    /// Both the certificate and its data object are released before returning.
    pub fn certificate_der(&self, identity: Borrowed<'_, '_>) -> Result<Vec<u8>> {
        let certificate = self
            .store
            .copy_identity_certificate(identity.raw())
            .map(|raw| Owned::adopt(self.store, raw))
            .map_err(|status| {
                KeychainError::Extraction(format!(
                    "failed to copy certificate for identity (OSStatus: {status})"
                ))
            })?;

        let data = self
            .store
            .copy_certificate_data(certificate.raw())
            .map(|raw| Owned::adopt(self.store, raw))
            .ok_or_else(|| {
                KeychainError::Extraction("failed to copy certificate data".to_string())
            })?;

        let bytes = data.borrow().data_bytes();
        drop(data);
        drop(certificate);

        if bytes.is_empty() {
            return Err(KeychainError::EmptyData);
        }
        tracing::trace!("Copied {} certificate bytes", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keychain::IdentityLocator;
    use crate::native::FakeKeychain;

    const DER: &[u8] = include_bytes!("../../tests/fixtures/test_cert.der");

    #[test]
    fn test_extract_known_subject() {
        let store = FakeKeychain::new().with_identity("Test identity", DER);
        {
            let records = IdentityLocator::new(&store)
                .find_identities("Test identity", true)
                .unwrap();
            let cert = CertificateExtractor::new(&store)
                .certificate_from_identity(records[0].handle().borrow())
                .unwrap();

            assert_eq!(cert.subject, "CN=Test");
        }
        assert!(store.is_balanced());
    }

    #[test]
    fn test_copy_failure_is_extraction_error() {
        let store = FakeKeychain::new().with_broken_identity("Broken");
        {
            let records = IdentityLocator::new(&store)
                .find_identities("Broken", true)
                .unwrap();
            let err = CertificateExtractor::new(&store)
                .certificate_from_identity(records[0].handle().borrow())
                .unwrap_err();

            assert!(matches!(err, KeychainError::Extraction(ref msg) if msg.contains("-26275")));
        }
        assert!(store.is_balanced());
    }

    #[test]
    fn test_empty_certificate_data() {
        let store = FakeKeychain::new().with_identity("Empty", &[]);
        {
            let records = IdentityLocator::new(&store).find_identities("Empty", true).unwrap();
            let err = CertificateExtractor::new(&store)
                .certificate_from_identity(records[0].handle().borrow())
                .unwrap_err();

            assert!(matches!(err, KeychainError::EmptyData));
        }
        assert!(store.is_balanced());
    }

    #[test]
    fn test_malformed_certificate_is_parse_error() {
        let store = FakeKeychain::new().with_identity("Garbage", b"\x30\x03\x02\x01\x00");
        {
            let records = IdentityLocator::new(&store).find_identities("Garbage", true).unwrap();
            let err = CertificateExtractor::new(&store)
                .certificate_from_identity(records[0].handle().borrow())
                .unwrap_err();

            assert!(matches!(err, KeychainError::Parse(_)));
        }
        assert!(store.is_balanced());
    }
}
