//! RC file loading and the settings whitelist.
//!
//! # Design
//! - The RC file is TOML and may only carry the keys enumerated by [`RcKey`].
//! - Unknown keys are collected and rejected together so users fix them in one pass.
//! - A missing RC file is not an error; the caller decides how loudly to warn.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// Keys accepted in the RC file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RcKey {
    Verbose,
    Debug,
}

impl RcKey {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "verbose" => Some(Self::Verbose),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

/// One configuration layer; `None` means "not set at this layer".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RcSettings {
    /// Informational output.
    pub verbose: Option<bool>,
    /// Diagnostic output including per-request detail.
    pub debug: Option<bool>,
}

impl RcSettings {
    /// Stack `upper` on top of `self`; values set in `upper` win.
    #[must_use]
    pub fn overlay(self, upper: Self) -> Self {
        Self {
            verbose: upper.verbose.or(self.verbose),
            debug: upper.debug.or(self.debug),
        }
    }

    /// Collapse the layer stack into concrete settings.
    #[must_use]
    pub fn resolve(self) -> Settings {
        Settings {
            verbose: self.verbose.unwrap_or(false),
            debug: self.debug.unwrap_or(false),
        }
    }
}

/// Fully resolved output settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Settings {
    /// Informational output enabled.
    pub verbose: bool,
    /// Diagnostic output enabled.
    pub debug: bool,
}

impl Settings {
    /// Log level implied by the settings: `debug` beats `verbose`, which beats quiet.
    #[must_use]
    pub const fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }
}

/// Result of looking for the RC file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcFile {
    /// Path that was consulted.
    pub path: PathBuf,
    /// Whether the file existed.
    pub found: bool,
    /// Settings read from the file; empty when it was missing.
    pub settings: RcSettings,
}

/// Load the RC file at `path`.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file exists but cannot be read, is not valid
/// TOML, or carries unsupported keys. A missing file yields empty settings.
pub fn load_rc_file(path: &Path) -> ConfigResult<RcFile> {
    if !path.exists() {
        return Ok(RcFile {
            path: path.to_path_buf(),
            found: false,
            settings: RcSettings::default(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    let settings = parse_rc_settings(&content, path)?;
    debug!(path = %path.display(), "loaded RC file");

    Ok(RcFile {
        path: path.to_path_buf(),
        found: true,
        settings,
    })
}

/// Parse RC file contents; `path` is only used for error reporting.
///
/// # Errors
///
/// Returns [`ConfigError::ParseRcFile`] for malformed TOML,
/// [`ConfigError::InvalidSetting`] for non-boolean values and
/// [`ConfigError::UnsupportedSettings`] listing every unknown key.
pub fn parse_rc_settings(content: &str, path: &Path) -> ConfigResult<RcSettings> {
    let table: toml::Table = toml::from_str(content).map_err(|source| ConfigError::ParseRcFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut settings = RcSettings::default();
    let mut unsupported = Vec::new();
    for (key, value) in &table {
        match RcKey::parse(key) {
            Some(RcKey::Verbose) => settings.verbose = Some(expect_bool(path, key, value)?),
            Some(RcKey::Debug) => settings.debug = Some(expect_bool(path, key, value)?),
            None => unsupported.push(key.clone()),
        }
    }

    if !unsupported.is_empty() {
        unsupported.sort();
        return Err(ConfigError::UnsupportedSettings {
            path: path.to_path_buf(),
            keys: unsupported,
        });
    }

    Ok(settings)
}

fn expect_bool(path: &Path, key: &str, value: &toml::Value) -> ConfigResult<bool> {
    value.as_bool().ok_or_else(|| ConfigError::InvalidSetting {
        path: path.to_path_buf(),
        key: key.to_string(),
        expected: "a boolean",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rc_path() -> PathBuf {
        PathBuf::from("/tmp/.rulesctlrc")
    }

    #[test]
    fn parse_accepts_whitelisted_keys() -> ConfigResult<()> {
        let settings = parse_rc_settings("verbose = true\ndebug = false\n", &rc_path())?;
        assert_eq!(
            settings,
            RcSettings {
                verbose: Some(true),
                debug: Some(false),
            }
        );
        Ok(())
    }

    #[test]
    fn parse_rejects_all_unknown_keys_at_once() {
        let err = parse_rc_settings(
            "verbose = true\nserver_url = \"x\"\ncolour = 1\n",
            &rc_path(),
        )
        .expect_err("unknown keys must fail");
        match err {
            ConfigError::UnsupportedSettings { keys, .. } => {
                assert_eq!(keys, vec!["colour".to_string(), "server_url".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_rejects_non_boolean_values() {
        let err = parse_rc_settings("debug = \"yes\"\n", &rc_path()).expect_err("type error");
        assert!(matches!(err, ConfigError::InvalidSetting { key, .. } if key == "debug"));
    }

    #[test]
    fn parse_reports_malformed_toml() {
        let err = parse_rc_settings("verbose = = true", &rc_path()).expect_err("parse error");
        assert!(matches!(err, ConfigError::ParseRcFile { .. }));
    }

    #[test]
    fn missing_file_yields_empty_settings() -> ConfigResult<()> {
        let rc = load_rc_file(Path::new("/definitely/missing/.rulesctlrc"))?;
        assert!(!rc.found);
        assert_eq!(rc.settings, RcSettings::default());
        Ok(())
    }

    #[test]
    fn overlay_prefers_upper_layer() {
        let file = RcSettings {
            verbose: Some(true),
            debug: Some(true),
        };
        let flags = RcSettings {
            verbose: None,
            debug: Some(false),
        };
        let merged = file.overlay(flags).resolve();
        assert!(merged.verbose);
        assert!(!merged.debug);
    }

    #[test]
    fn log_level_follows_settings() {
        assert_eq!(Settings::default().log_level(), "warn");
        let verbose = Settings {
            verbose: true,
            debug: false,
        };
        assert_eq!(verbose.log_level(), "info");
        let debug = Settings {
            verbose: true,
            debug: true,
        };
        assert_eq!(debug.log_level(), "debug");
    }
}
