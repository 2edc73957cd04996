use crate::cert::metadata::ParsedCertificate;
use crate::utils::errors::{KeychainError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use x509_parser::der_parser::oid;
use x509_parser::prelude::*;

// X.509 Extension OIDs
const EXTENDED_KEY_USAGE_OID: oid::Oid = oid!(2.5.29 .37);

pub struct CertificateParser;

impl CertificateParser {
    /// Parse a DER encoded certificate
    pub fn parse_der(der_bytes: &[u8]) -> Result<ParsedCertificate> {
        let (_, cert) = X509Certificate::from_der(der_bytes)
            .map_err(|e| KeychainError::Parse(format!("DER parsing error: {e}")))?;

        Ok(Self::extract_fields(&cert, der_bytes))
    }

    fn extract_fields(cert: &X509Certificate, der_bytes: &[u8]) -> ParsedCertificate {
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        ParsedCertificate {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            common_name,
            serial: hex::encode(cert.serial.to_bytes_be()),
            not_before,
            not_after,
            sha256_fingerprint: hex::encode(Sha256::digest(der_bytes)),
            extended_key_usage: Self::extended_key_usage(cert),
            der: der_bytes.to_vec(),
        }
    }

    fn extended_key_usage(cert: &X509Certificate) -> Vec<String> {
        let mut usages = Vec::new();
        for ext in cert.extensions() {
            if ext.oid == EXTENDED_KEY_USAGE_OID {
                if let Ok((_rem, eku)) = ExtendedKeyUsage::from_der(ext.value) {
                    let known = [
                        (eku.any, "Any"),
                        (eku.server_auth, "ServerAuth"),
                        (eku.client_auth, "ClientAuth"),
                        (eku.code_signing, "CodeSigning"),
                        (eku.email_protection, "EmailProtection"),
                        (eku.time_stamping, "TimeStamping"),
                        (eku.ocsp_signing, "OCSPSigning"),
                    ];
                    usages.extend(
                        known
                            .iter()
                            .filter(|(present, _)| *present)
                            .map(|(_, name)| name.to_string()),
                    );
                    usages.extend(eku.other.iter().map(|oid| oid.to_string()));
                }
                break;
            }
        }
        usages
    }
}
