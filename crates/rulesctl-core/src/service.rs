//! Rules service trait implemented by transports and test doubles.

use async_trait::async_trait;

use crate::codec::EncodedRulesBlob;
use crate::error::RulesResult;
use crate::model::ServerStatus;

/// Client view of the server's single active rules record.
///
/// Implementations hold no rules state of their own. The server serialises
/// concurrent writers and the last upload wins.
#[async_trait]
pub trait RulesApi: Send + Sync {
    /// Fetch a fresh server status.
    async fn get_status(&self) -> RulesResult<ServerStatus>;

    /// Fetch the active encoded rules (possibly the built-in default, possibly empty).
    async fn list_rules(&self) -> RulesResult<EncodedRulesBlob>;

    /// Replace the active rules with `encoded`; no history is kept.
    async fn upload_rules(&self, encoded: &EncodedRulesBlob) -> RulesResult<()>;

    /// Drop custom rules so the server reverts to its default; idempotent.
    async fn delete_rules(&self) -> RulesResult<()>;
}
