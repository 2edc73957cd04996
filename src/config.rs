use crate::cert::validity::MAX_LEEWAY_SECONDS;
use crate::keychain::PassphraseMode;
use crate::utils::errors::{KeychainError, Result};
use crate::utils::paths::KeychainP12Paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Settings read from `~/.config/keychain-p12/config.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default label filter
    #[serde(default)]
    pub label: Option<String>,

    /// Require the whole label to match instead of a substring
    #[serde(default)]
    pub full_match: bool,

    /// Passphrase handling for exported containers
    #[serde(default)]
    pub passphrase: PassphraseMode,

    /// Skip identities whose certificate is not currently valid
    #[serde(default = "default_validate")]
    pub validate: bool,

    /// Leeway in seconds for the validity window check
    #[serde(default)]
    pub leeway_seconds: i64,

    /// Directory for exports when no output path is given
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_validate() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: None,
            full_match: false,
            passphrase: PassphraseMode::default(),
            validate: true,
            leeway_seconds: 0,
            output_dir: None,
        }
    }
}

impl Config {
    /// Load from `path`, or the default location. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => KeychainP12Paths::config_file()?,
        };

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(&path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(contents)?;
        if !(0..=MAX_LEEWAY_SECONDS).contains(&config.leeway_seconds) {
            return Err(KeychainError::Config(format!(
                "leeway_seconds must be between 0 and {MAX_LEEWAY_SECONDS} (got {})",
                config.leeway_seconds
            )));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.passphrase, PassphraseMode::InteractivePrompt);
        assert!(config.validate);
        assert!(!config.full_match);
        assert_eq!(config.leeway_seconds, 0);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml("label: \"iPhone Distribution\"\npassphrase: empty\n").unwrap();
        assert_eq!(config.label.as_deref(), Some("iPhone Distribution"));
        assert_eq!(config.passphrase, PassphraseMode::FixedEmpty);
        assert!(config.validate);
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_negative_leeway_rejected() {
        let err = Config::from_yaml("leeway_seconds: -5").unwrap_err();
        assert!(matches!(err, KeychainError::Config(_)));
    }

    #[test]
    fn test_oversized_leeway_rejected() {
        for yaml in [
            "leeway_seconds: 1000000000000000",
            "leeway_seconds: 9223372036854775807",
        ] {
            let err = Config::from_yaml(yaml).unwrap_err();
            assert!(matches!(err, KeychainError::Config(_)));
        }
        assert_eq!(
            Config::from_yaml(&format!("leeway_seconds: {MAX_LEEWAY_SECONDS}"))
                .unwrap()
                .leeway_seconds,
            MAX_LEEWAY_SECONDS
        );
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.yaml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "full_match: true\nvalidate: false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(config.full_match);
        assert!(!config.validate);
    }
}
