//! Rules blob codec and version marker extraction.
//!
//! # Design
//! - Blobs are opaque bytes; only the first line is ever inspected.
//! - The wire form is standard base64. Decoding ignores ASCII whitespace so
//!   line-wrapped payloads produced by other clients still round-trip.
//! - The marker line must read exactly `//Version: MAJOR.MINOR`; spacing
//!   variants are treated as versionless.

use std::fmt::{self, Display, Formatter};

use base64::{Engine as _, engine::general_purpose};

use crate::error::{RulesError, RulesResult};
use crate::version::Version;

/// Leading text of the marker line, as written by [`RulesBlob::with_version`].
pub const VERSION_MARKER_PREFIX: &str = "//Version: ";

/// Raw rules script as stored and evaluated by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RulesBlob {
    raw: Vec<u8>,
}

impl RulesBlob {
    /// Wrap raw rules bytes.
    #[must_use]
    pub fn new(raw: impl Into<Vec<u8>>) -> Self {
        Self { raw: raw.into() }
    }

    /// Build a blob whose first line carries `version`, followed by `body`.
    #[must_use]
    pub fn with_version(version: Version, body: &str) -> Self {
        Self::new(format!("{VERSION_MARKER_PREFIX}{version}\n{body}"))
    }

    /// Raw bytes of the script.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Consume the blob, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.raw
    }

    /// Script text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.raw).into_owned()
    }

    /// Whether the blob has no content at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Encode for transport.
    #[must_use]
    pub fn encode(&self) -> EncodedRulesBlob {
        EncodedRulesBlob(general_purpose::STANDARD.encode(&self.raw))
    }

    /// Version marker from the first line, or `None` for versionless blobs.
    ///
    /// Only line 1 is considered; a marker further down is ignored.
    #[must_use]
    pub fn extract_version(&self) -> Option<Version> {
        let first_line = self
            .raw
            .split(|byte| *byte == b'\n')
            .next()
            .unwrap_or_default();
        let first_line = first_line.strip_suffix(b"\r").unwrap_or(first_line);
        let marker = std::str::from_utf8(first_line)
            .ok()?
            .strip_prefix(VERSION_MARKER_PREFIX)?;
        if marker.trim() != marker {
            return None;
        }
        marker.parse().ok()
    }

    /// Like [`Self::extract_version`] but reports versionless blobs as errors.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::VersionParse`] carrying the first line when no
    /// marker is present.
    pub fn require_version(&self) -> RulesResult<Version> {
        self.extract_version()
            .ok_or_else(|| RulesError::VersionParse {
                value: self.text_lossy().lines().next().unwrap_or_default().to_string(),
            })
    }
}

impl From<&str> for RulesBlob {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes())
    }
}

impl From<String> for RulesBlob {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

/// Base64 text form of a [`RulesBlob`] as exchanged with the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncodedRulesBlob(String);

impl EncodedRulesBlob {
    /// Wrap text received from the server or read from disk.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Encoded text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the wrapper, returning the encoded text.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Whether the payload carries no rules (only whitespace, or nothing).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Decode back into the raw blob.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError::Decode`] when the text is not valid base64.
    pub fn decode(&self) -> RulesResult<RulesBlob> {
        let compact: String = self
            .0
            .chars()
            .filter(|ch| !ch.is_ascii_whitespace())
            .collect();
        general_purpose::STANDARD
            .decode(compact.as_bytes())
            .map(RulesBlob::new)
            .map_err(|source| RulesError::Decode { source })
    }
}

impl Display for EncodedRulesBlob {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
