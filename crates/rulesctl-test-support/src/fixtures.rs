//! Sample rules blobs.

use rulesctl_core::{RulesBlob, Version};

/// Built-in version reported by the in-memory server unless configured otherwise.
pub const DEFAULT_RULES_VERSION: Version = Version::new(5, 3);

/// Body of the built-in ruleset served by the in-memory server.
pub const DEFAULT_RULES_BODY: &str = "var builtin = true;\n";

/// A custom ruleset an operator might have deployed before a test run.
#[must_use]
pub fn operator_rules() -> RulesBlob {
    RulesBlob::with_version(Version::new(5, 7), "var operatorPolicy = 'strict';\n")
}

/// Built-in ruleset at `version`.
#[must_use]
pub fn default_rules(version: Version) -> RulesBlob {
    RulesBlob::with_version(version, DEFAULT_RULES_BODY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_carry_version_markers() {
        assert_eq!(operator_rules().extract_version(), Some(Version::new(5, 7)));
        assert_eq!(
            default_rules(DEFAULT_RULES_VERSION).extract_version(),
            Some(DEFAULT_RULES_VERSION)
        );
    }
}
