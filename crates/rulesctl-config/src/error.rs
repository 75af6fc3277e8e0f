//! Error types for configuration loading and validation.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
///
/// Configuration errors are raised before any network call and are never retried.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The server URL could not be used as an entitlement endpoint.
    #[error("invalid server URL '{value}': {reason}")]
    InvalidServerUrl {
        /// URL as provided.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The RC file contained keys outside the supported set.
    #[error(
        "the RC file '{}' does not support these settings: {}",
        path.display(),
        keys.join(", ")
    )]
    UnsupportedSettings {
        /// RC file that was read.
        path: PathBuf,
        /// Every offending key, sorted.
        keys: Vec<String>,
    },
    /// A supported RC key carried a value of the wrong type.
    #[error("setting '{key}' in '{}' must be {expected}", path.display())]
    InvalidSetting {
        /// RC file that was read.
        path: PathBuf,
        /// Offending key.
        key: String,
        /// Expected value type.
        expected: &'static str,
    },
    /// The RC file is not valid TOML.
    #[error("failed to parse RC file '{}': {source}", path.display())]
    ParseRcFile {
        /// RC file that was read.
        path: PathBuf,
        /// Parser error.
        #[source]
        source: toml::de::Error,
    },
    /// A configured file could not be read.
    #[error("failed to read '{}': {source}", path.display())]
    ReadFile {
        /// File that was read.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// Credential flags were incomplete or contradictory.
    #[error("invalid credentials: {reason}")]
    InvalidCredentials {
        /// What was wrong with the combination.
        reason: &'static str,
    },
}

impl ConfigError {
    /// Creates a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid server URL error.
    pub fn invalid_server_url(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidServerUrl {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_settings_lists_every_key() {
        let err = ConfigError::UnsupportedSettings {
            path: PathBuf::from("/home/user/.rulesctlrc"),
            keys: vec!["colour".into(), "server_url".into()],
        };
        let message = err.to_string();
        assert!(message.contains("/home/user/.rulesctlrc"));
        assert!(message.contains("colour, server_url"));
    }
}
