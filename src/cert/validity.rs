use crate::cert::metadata::ParsedCertificate;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Why a certificate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidCertificate {
    #[error("certificate expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("certificate is not valid before {0}")]
    NotYetValid(DateTime<Utc>),

    #[error("{0}")]
    Rejected(String),
}

/// Decides whether a certificate is usable.
pub trait ValidityChecker {
    fn check(&self, cert: &ParsedCertificate) -> Result<(), InvalidCertificate>;
}

impl<F> ValidityChecker for F
where
    F: Fn(&ParsedCertificate) -> Result<(), InvalidCertificate>,
{
    fn check(&self, cert: &ParsedCertificate) -> Result<(), InvalidCertificate> {
        self(cert)
    }
}

pub fn validate(
    cert: &ParsedCertificate,
    checker: &dyn ValidityChecker,
) -> Result<(), InvalidCertificate> {
    checker.check(cert)
}

/// Largest accepted leeway: ten years.
pub const MAX_LEEWAY_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

/// Accepts certificates whose validity window contains the current time.
#[derive(Debug, Clone)]
pub struct ExpiryChecker {
    leeway: Duration,
    now: Option<DateTime<Utc>>,
}

impl ExpiryChecker {
    /// `leeway_seconds` is clamped to `0..=MAX_LEEWAY_SECONDS`.
    pub fn new(leeway_seconds: i64) -> Self {
        Self {
            leeway: Duration::seconds(leeway_seconds.clamp(0, MAX_LEEWAY_SECONDS)),
            now: None,
        }
    }

    /// Checks against a fixed instant instead of the wall clock.
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            leeway: Duration::zero(),
            now: Some(now),
        }
    }
}

impl Default for ExpiryChecker {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ValidityChecker for ExpiryChecker {
    fn check(&self, cert: &ParsedCertificate) -> Result<(), InvalidCertificate> {
        let now = self.now.unwrap_or_else(Utc::now);
        // An edge pushed past the representable range never rejects.
        let expires = cert.not_after.checked_add_signed(self.leeway);
        if expires.is_some_and(|expires| now > expires) {
            return Err(InvalidCertificate::Expired(cert.not_after));
        }
        let latest_now = now.checked_add_signed(self.leeway);
        if latest_now.is_some_and(|latest| latest < cert.not_before) {
            return Err(InvalidCertificate::NotYetValid(cert.not_before));
        }
        Ok(())
    }
}
