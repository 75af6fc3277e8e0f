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
#![allow(clippy::redundant_pub_crate)]

//! Command-line client for an entitlement server's rules subsystem.
//!
//! Layout:
//! - `cli.rs`: argument parsing, settings layering and command dispatch
//! - `commands/`: command handlers grouped by concern
//! - `client.rs`: CLI errors, application context and outcome telemetry
//! - `transport.rs`: reqwest-backed `RulesApi` implementation
//! - `harness.rs`: upload/list/delete/revert verification with guaranteed cleanup
//! - `output.rs`: renderers and formatting helpers
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod cli;
pub(crate) mod client;
pub(crate) mod commands;
pub(crate) mod harness;
pub(crate) mod output;
pub(crate) mod transport;

pub use cli::run;
