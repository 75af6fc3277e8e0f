//! Server connection settings: target URL, TLS trust and credentials.
//!
//! # Design
//! - `insecure` defaults to `true` only for loopback targets; an explicit
//!   value always wins.
//! - The URL path is the entitlement context; endpoints resolve beneath it.
//! - Everything is validated here, before a client is built or a request sent.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;
use url::{Host, Url};

use crate::defaults::{DEFAULT_SERVER_CA, DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_SECS};
use crate::error::{ConfigError, ConfigResult};

/// Raw connection inputs gathered from flags and environment.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Server base URL including the entitlement context path.
    pub server_url: String,
    /// CA bundle to trust; `None` falls back to the default path when present.
    pub server_ca: Option<PathBuf>,
    /// Explicit TLS verification override.
    pub insecure: Option<bool>,
    /// Basic-auth user name.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// PEM client certificate.
    pub client_cert: Option<PathBuf>,
    /// PEM private key for the client certificate; may be bundled in `client_cert`.
    pub client_key: Option<PathBuf>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            server_ca: None,
            insecure: None,
            username: None,
            password: None,
            client_cert: None,
            client_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Credentials presented to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Anonymous requests.
    None,
    /// HTTP basic authentication.
    Basic {
        /// User name.
        username: String,
        /// Password.
        password: String,
    },
    /// TLS client certificate.
    ClientCert {
        /// PEM certificate (optionally bundling the key).
        cert: PathBuf,
        /// Separate PEM key, if not bundled.
        key: Option<PathBuf>,
    },
}

/// Validated connection configuration handed to the rules client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL, always ending in `/`.
    pub server_url: Url,
    /// CA bundle to trust in addition to system roots.
    pub server_ca: Option<PathBuf>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Credentials to present.
    pub credentials: Credentials,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ConnectionOptions {
    /// Validate the inputs and produce a [`ClientConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServerUrl`] for unusable URLs,
    /// [`ConfigError::ReadFile`] when an explicit CA bundle or certificate is
    /// missing, and [`ConfigError::InvalidCredentials`] for incomplete or
    /// conflicting credential flags.
    pub fn resolve(self) -> ConfigResult<ClientConfig> {
        let server_url = parse_server_url(&self.server_url)?;
        let insecure = self
            .insecure
            .unwrap_or_else(|| is_loopback_host(&server_url));
        let server_ca = resolve_server_ca(self.server_ca)?;
        let credentials = resolve_credentials(
            self.username,
            self.password,
            self.client_cert,
            self.client_key,
        )?;

        Ok(ClientConfig {
            server_url,
            server_ca,
            insecure,
            credentials,
            timeout: Duration::from_secs(self.timeout_secs),
        })
    }
}

impl ClientConfig {
    /// Resolve an endpoint beneath the configured context path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidServerUrl`] if `path` cannot be joined.
    pub fn endpoint(&self, path: &str) -> ConfigResult<Url> {
        self.server_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ConfigError::invalid_server_url(self.server_url.as_str(), err.to_string()))
    }
}

/// Whether the URL targets this machine (`localhost` or a loopback literal).
#[must_use]
pub fn is_loopback_host(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => {
            domain.eq_ignore_ascii_case("localhost")
                || domain.to_ascii_lowercase().ends_with(".localhost")
        }
        Some(Host::Ipv4(addr)) => IpAddr::V4(addr).is_loopback(),
        Some(Host::Ipv6(addr)) => IpAddr::V6(addr).is_loopback(),
        None => false,
    }
}

fn parse_server_url(input: &str) -> ConfigResult<Url> {
    let trimmed = input.trim();
    let mut url =
        Url::parse(trimmed).map_err(|err| ConfigError::invalid_server_url(trimmed, err.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid_server_url(
            trimmed,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if !url.has_host() {
        return Err(ConfigError::invalid_server_url(trimmed, "missing host"));
    }

    url.set_query(None);
    url.set_fragment(None);
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn resolve_server_ca(explicit: Option<PathBuf>) -> ConfigResult<Option<PathBuf>> {
    if let Some(path) = explicit {
        ensure_file(&path)?;
        return Ok(Some(path));
    }

    let fallback = Path::new(DEFAULT_SERVER_CA);
    if fallback.is_file() {
        Ok(Some(fallback.to_path_buf()))
    } else {
        debug!(path = DEFAULT_SERVER_CA, "default CA bundle not present; using system roots");
        Ok(None)
    }
}

fn resolve_credentials(
    username: Option<String>,
    password: Option<String>,
    client_cert: Option<PathBuf>,
    client_key: Option<PathBuf>,
) -> ConfigResult<Credentials> {
    let username = username.filter(|value| !value.trim().is_empty());
    match (username, client_cert) {
        (Some(_), Some(_)) => Err(ConfigError::InvalidCredentials {
            reason: "basic auth and client certificate cannot be combined",
        }),
        (Some(username), None) => {
            let password = password.ok_or(ConfigError::InvalidCredentials {
                reason: "a password is required with --username",
            })?;
            Ok(Credentials::Basic { username, password })
        }
        (None, Some(cert)) => {
            ensure_file(&cert)?;
            if let Some(key) = &client_key {
                ensure_file(key)?;
            }
            Ok(Credentials::ClientCert {
                cert,
                key: client_key,
            })
        }
        (None, None) => {
            if password.is_some() {
                return Err(ConfigError::InvalidCredentials {
                    reason: "--password requires --username",
                });
            }
            if client_key.is_some() {
                return Err(ConfigError::InvalidCredentials {
                    reason: "--client-key requires --client-cert",
                });
            }
            Ok(Credentials::None)
        }
    }
}

fn ensure_file(path: &Path) -> ConfigResult<()> {
    std::fs::metadata(path)
        .map(|_| ())
        .map_err(|err| ConfigError::read_file(path, err))
}
