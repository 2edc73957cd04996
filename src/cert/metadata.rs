use crate::utils::output::GetColumnValue;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{fmt, str::FromStr};

/// Certificate fields copied out of native memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedCertificate {
    pub subject: String,
    pub issuer: String,
    pub common_name: String,
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub sha256_fingerprint: String,
    pub extended_key_usage: Vec<String>,
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl ParsedCertificate {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.not_after
    }
}

impl fmt::Display for ParsedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subject: {}, Serial: {}, Expires: {}",
            self.subject,
            self.serial,
            self.not_after.format("%Y-%m-%d %H:%M")
        )
    }
}

/// One keychain identity as shown by `list`.
#[derive(Debug, Clone, Serialize)]
pub struct IdentitySummary {
    pub label: String,
    pub certificate: ParsedCertificate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityColumn {
    Label,
    Subject,
    Cn,
    Issuer,
    Serial,
    NotBefore,
    NotAfter,
    Fingerprint,
    ExtendedKeyUsage,
    Expired,
}

impl FromStr for IdentityColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "label" => Ok(Self::Label),
            "subject" => Ok(Self::Subject),
            "cn" => Ok(Self::Cn),
            "issuer" => Ok(Self::Issuer),
            "serial" => Ok(Self::Serial),
            "not_before" => Ok(Self::NotBefore),
            "not_after" => Ok(Self::NotAfter),
            "fingerprint" | "sha256" => Ok(Self::Fingerprint),
            "extended_key_usage" | "ext_key_usage" => Ok(Self::ExtendedKeyUsage),
            "expired" | "e" => Ok(Self::Expired),
            _ => Err(format!("Invalid column: {s}")),
        }
    }
}

impl IdentityColumn {
    pub fn header(&self) -> &'static str {
        match self {
            Self::Label => "Label",
            Self::Subject => "Subject",
            Self::Cn => "CN",
            Self::Issuer => "Issuer",
            Self::Serial => "Serial",
            Self::NotBefore => "Not Before",
            Self::NotAfter => "Not After",
            Self::Fingerprint => "SHA-256",
            Self::ExtendedKeyUsage => "Ext Key Usage",
            Self::Expired => "E",
        }
    }
}

impl GetColumnValue for IdentitySummary {
    fn get_column_value(&self, column: &IdentityColumn) -> String {
        let cert = &self.certificate;
        match column {
            IdentityColumn::Label => self.label.clone(),
            IdentityColumn::Subject => cert.subject.clone(),
            IdentityColumn::Cn => cert.common_name.clone(),
            IdentityColumn::Issuer => cert.issuer.clone(),
            IdentityColumn::Serial => cert.serial.clone(),
            IdentityColumn::NotBefore => cert.not_before.format("%Y-%m-%d %H:%M").to_string(),
            IdentityColumn::NotAfter => cert.not_after.format("%Y-%m-%d %H:%M").to_string(),
            IdentityColumn::Fingerprint => cert.sha256_fingerprint.clone(),
            IdentityColumn::ExtendedKeyUsage => cert.extended_key_usage.join(","),
            IdentityColumn::Expired => {
                if cert.is_expired() {
                    "✗".to_string()
                } else {
                    " ".to_string()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::CertificateParser;

    const TEST_CERT: &[u8] = include_bytes!("../../tests/fixtures/test_cert.der");
    const EXPIRED_CERT: &[u8] = include_bytes!("../../tests/fixtures/expired_cert.der");

    #[test]
    fn test_column_parsing() {
        assert_eq!("label".parse::<IdentityColumn>(), Ok(IdentityColumn::Label));
        assert_eq!("SHA256".parse::<IdentityColumn>(), Ok(IdentityColumn::Fingerprint));
        assert!("bogus".parse::<IdentityColumn>().is_err());
    }

    #[test]
    fn test_column_values() {
        let summary = IdentitySummary {
            label: "Test identity".to_string(),
            certificate: CertificateParser::parse_der(TEST_CERT).unwrap(),
        };

        assert_eq!(summary.get_column_value(&IdentityColumn::Label), "Test identity");
        assert_eq!(summary.get_column_value(&IdentityColumn::Subject), "CN=Test");
        assert_eq!(summary.get_column_value(&IdentityColumn::NotAfter), "2099-12-31 00:00");
        assert_eq!(summary.get_column_value(&IdentityColumn::Expired), " ");
    }

    #[test]
    fn test_expired_marker() {
        let summary = IdentitySummary {
            label: "Old".to_string(),
            certificate: CertificateParser::parse_der(EXPIRED_CERT).unwrap(),
        };
        assert_eq!(summary.get_column_value(&IdentityColumn::Expired), "✗");
    }
}
