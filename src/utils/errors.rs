use crate::native::OsStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeychainError {
    #[error("No identity (certificate + related private key) found in the keychain")]
    NotFound,

    #[error("Keychain search failed (OSStatus: {status})")]
    Query { status: OsStatus },

    #[error("String conversion error: {0}")]
    Conversion(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Certificate parsing error: {0}")]
    Parse(String),

    #[error("Certificate data is empty")]
    EmptyData,

    #[error("Keychain export failed (OSStatus: {status})")]
    Export { status: OsStatus },

    #[error("Exported data is empty")]
    EmptyExport,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to write export file: {0}")]
    FileWrite(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),
}

pub type Result<T> = std::result::Result<T, KeychainError>;
