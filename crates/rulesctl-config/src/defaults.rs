//! Compiled-in defaults, the lowest configuration layer.

use std::path::PathBuf;

/// Server base URL used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "https://localhost:8443/api";
/// CA bundle consulted when no explicit `--server-ca` is given and the file exists.
pub const DEFAULT_SERVER_CA: &str = "/etc/rulesctl/certs/server-ca.crt";
/// HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// File name of the per-user RC file.
pub const RC_FILE_NAME: &str = ".rulesctlrc";

/// Default RC file location inside the user's home directory.
#[must_use]
pub fn default_rc_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(RC_FILE_NAME)
}
