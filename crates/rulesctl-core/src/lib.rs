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

//! Transport-agnostic core of the rules deployment protocol.
//!
//! Layout: `codec.rs` (rules blob encoding and version marker extraction),
//! `version.rs` (numeric `MAJOR.MINOR` ordering), `model.rs` (server status DTO),
//! `service.rs` (`RulesApi` trait implemented by transports and fakes),
//! `error.rs` (`RulesError` taxonomy).

pub mod codec;
pub mod error;
pub mod model;
pub mod service;
pub mod version;

pub use codec::{EncodedRulesBlob, RulesBlob, VERSION_MARKER_PREFIX};
pub use error::{RulesError, RulesResult};
pub use model::ServerStatus;
pub use service::RulesApi;
pub use version::{SYNTHETIC_MINOR_OFFSET, Version};
