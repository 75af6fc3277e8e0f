//! Data transfer objects returned by the entitlement server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RulesResult;
use crate::version::Version;

/// Server status snapshot; fetched fresh for every query, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatus {
    /// Version of the rules the server is currently evaluating.
    pub rules_version: String,
    /// Where the active rules came from (for example `database` or `default`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_source: Option<String>,
    /// Overall health flag reported by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<bool>,
    /// Server software version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Server software release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    /// Whether the server runs in standalone mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standalone: Option<bool>,
    /// Server clock at the time of the query.
    #[serde(
        default,
        rename = "timeUTC",
        skip_serializing_if = "Option::is_none"
    )]
    pub time_utc: Option<String>,
    /// Capabilities advertised to managers.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manager_capabilities: Vec<String>,
    /// Remaining fields, kept verbatim for display.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServerStatus {
    /// Minimal status carrying only a rules version.
    #[must_use]
    pub fn with_rules_version(rules_version: impl Into<String>) -> Self {
        Self {
            rules_version: rules_version.into(),
            rules_source: None,
            result: None,
            version: None,
            release: None,
            standalone: None,
            time_utc: None,
            manager_capabilities: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Parse the reported rules version for numeric comparison.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RulesError::VersionParse`] when the server reports a
    /// value that is not `MAJOR.MINOR`.
    pub fn parsed_rules_version(&self) -> RulesResult<Version> {
        self.rules_version.parse()
    }
}
