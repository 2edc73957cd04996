use crate::utils::errors::{KeychainError, Result};
use dirs;
use std::path::{Path, PathBuf};

pub struct KeychainP12Paths;
const PROGRAM_NAME: &str = "keychain-p12";

impl KeychainP12Paths {
    /// Get the config directory: ~/.config/keychain-p12/
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join(PROGRAM_NAME))
            .ok_or_else(|| KeychainError::Config("Cannot determine config directory".to_string()))
    }

    /// Get the config file path: ~/.config/keychain-p12/config.yaml
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.yaml"))
    }

    /// Expand a leading `~/` to the home directory
    pub fn expand_home(path: &str) -> Result<PathBuf> {
        match path.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .ok_or_else(|| KeychainError::Config("Cannot determine home directory".to_string())),
            None => Ok(Path::new(path).to_path_buf()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_home_plain_path() {
        assert_eq!(
            KeychainP12Paths::expand_home("/tmp/out.p12").unwrap(),
            PathBuf::from("/tmp/out.p12")
        );
    }

    #[test]
    fn test_config_file_name() {
        if let Ok(path) = KeychainP12Paths::config_file() {
            assert!(path.ends_with("keychain-p12/config.yaml"));
        }
    }
}
