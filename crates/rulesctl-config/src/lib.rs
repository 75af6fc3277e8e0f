#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Layered client configuration: compiled-in defaults, the RC file, then
//! explicit flags.
//!
//! Layout: `defaults.rs` (compiled-in values), `rc.rs` (RC file whitelist and
//! loader), `connection.rs` (server URL, TLS trust and credential resolution),
//! `error.rs` (`ConfigError`).

pub mod connection;
pub mod defaults;
pub mod error;
pub mod rc;

pub use connection::{ClientConfig, ConnectionOptions, Credentials, is_loopback_host};
pub use error::{ConfigError, ConfigResult};
pub use rc::{RcFile, RcSettings, Settings, load_rc_file, parse_rc_settings};
