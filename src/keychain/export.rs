use crate::keychain::locator::IdentityRecord;
use crate::native::{
    to_native_string, Borrowed, ContainerFormat, ExportParameters, NativeStore, Owned,
    ERR_SEC_ALLOCATE,
};
use crate::utils::errors::{KeychainError, Result};
use crate::utils::files::FileWriter;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Prompt shown by the keychain when it asks for the export passphrase.
pub const EXPORT_PROMPT: &str = "Enter a password which will be used to protect the exported items";

/// How the exported container is protected.
#[derive(ValueEnum, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PassphraseMode {
    /// No protection; falls back to an empty passphrase when the format needs one
    #[value(name = "none")]
    #[serde(rename = "none")]
    NoPassphrase,
    /// Let the keychain prompt for a passphrase
    #[default]
    #[value(name = "prompt")]
    #[serde(rename = "prompt")]
    InteractivePrompt,
    /// Protect with an empty passphrase
    #[value(name = "empty")]
    #[serde(rename = "empty")]
    FixedEmpty,
}

impl PassphraseMode {
    fn effective(self, format: ContainerFormat) -> Self {
        if self == Self::NoPassphrase && format.requires_passphrase() {
            tracing::debug!("{format:?} requires a passphrase, using an empty one");
            Self::FixedEmpty
        } else {
            self
        }
    }
}

pub struct ExportRequest<'r, 's> {
    pub identities: Vec<Borrowed<'r, 's>>,
    pub destination: PathBuf,
    pub passphrase: PassphraseMode,
}

impl<'r, 's> ExportRequest<'r, 's> {
    pub fn from_records(
        records: &'r [IdentityRecord<'s>],
        destination: impl Into<PathBuf>,
        passphrase: PassphraseMode,
    ) -> Self {
        Self {
            identities: records.iter().map(|r| r.handle().borrow()).collect(),
            destination: destination.into(),
            passphrase,
        }
    }
}

/// Native objects referenced by the export parameters.
struct PassphraseParams<'s> {
    secure_passphrase: bool,
    passphrase: Option<Owned<'s>>,
    prompt: Option<Owned<'s>>,
}

impl<'s> PassphraseParams<'s> {
    fn build(store: &'s dyn NativeStore, mode: PassphraseMode) -> Result<Self> {
        Ok(match mode {
            PassphraseMode::InteractivePrompt => Self {
                secure_passphrase: true,
                passphrase: None,
                prompt: Some(to_native_string(store, EXPORT_PROMPT)?),
            },
            PassphraseMode::FixedEmpty => Self {
                secure_passphrase: false,
                passphrase: Some(to_native_string(store, "")?),
                prompt: None,
            },
            PassphraseMode::NoPassphrase => Self {
                secure_passphrase: false,
                passphrase: None,
                prompt: None,
            },
        })
    }

    fn native(&self) -> ExportParameters {
        ExportParameters {
            secure_passphrase: self.secure_passphrase,
            passphrase: self.passphrase.as_ref().map(Owned::raw),
            alert_prompt: self.prompt.as_ref().map(Owned::raw),
            pem_armour: false,
        }
    }
}

/// Bundles identities into a PKCS#12 container.
pub struct Exporter<'s> {
    store: &'s dyn NativeStore,
    format: ContainerFormat,
}

impl<'s> Exporter<'s> {
    pub fn new(store: &'s dyn NativeStore) -> Self {
        Self {
            store,
            format: ContainerFormat::Pkcs12,
        }
    }

    /// Export the requested identities and write the container.
    pub fn export(&self, request: &ExportRequest<'_, '_>, writer: &dyn FileWriter) -> Result<()> {
        let bytes = self.export_bytes(&request.identities, request.passphrase)?;

        writer
            .write(&request.destination, &bytes)
            .map_err(KeychainError::FileWrite)?;

        tracing::info!(
            "Exported {} identities to {}",
            request.identities.len(),
            request.destination.display()
        );
        Ok(())
    }

    /// Export the identities and return the container bytes.
    ///
    /// Every transient native object is released before this returns,
    /// whatever the outcome.
    pub fn export_bytes(
        &self,
        identities: &[Borrowed<'_, '_>],
        mode: PassphraseMode,
    ) -> Result<Vec<u8>> {
        if identities.is_empty() {
            return Err(KeychainError::InvalidArgument(
                "at least one identity is required for export".to_string(),
            ));
        }

        let raws: Vec<_> = identities.iter().map(Borrowed::raw).collect();
        let items = self
            .store
            .create_array(&raws)
            .map(|raw| Owned::adopt(self.store, raw))
            .ok_or(KeychainError::Export {
                status: ERR_SEC_ALLOCATE,
            })?;

        let params = PassphraseParams::build(self.store, mode.effective(self.format))?;
        tracing::debug!(
            "Exporting {} identities (interactive passphrase: {})",
            raws.len(),
            params.secure_passphrase
        );

        let exported = self
            .store
            .export_items(items.raw(), self.format, &params.native())
            .map(|raw| Owned::adopt(self.store, raw))
            .map_err(|status| KeychainError::Export { status })?;

        let bytes = exported.borrow().data_bytes();
        drop(exported);

        if bytes.is_empty() {
            return Err(KeychainError::EmptyExport);
        }

        tracing::debug!("Export - success ({} bytes)", bytes.len());
        Ok(bytes)
    }
}
