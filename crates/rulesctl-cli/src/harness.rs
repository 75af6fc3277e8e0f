//! Upload/list/delete/revert verification against a rules server.
//!
//! # Design
//! - Captures the active rules before anything is mutated and restores them on
//!   every exit path once the capture succeeded.
//! - Restore failures are logged and reported, never substituted for the
//!   primary outcome.
//! - An optional settle delay is slept before each write. It exists only for
//!   storage layers whose change timestamps are coarser than the gap between
//!   two writes; leave it at zero unless the server is known to need it.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use rulesctl_core::{EncodedRulesBlob, RulesApi, RulesBlob, RulesError, ServerStatus, Version};
use serde::Serialize;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Script body carried by the synthetic rules blob.
pub(crate) const SYNTHETIC_RULES_BODY: &str = "var a=1.0;";

/// Tunables for a verification run.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct HarnessOptions {
    /// Wait before each write.
    pub(crate) settle: Duration,
}

/// Individual assertion performed by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Check {
    ListRules,
    BaselineVersion,
    SyntheticVersionOrdering,
    UploadRoundtrip,
    UploadVersion,
    DeleteRevertsVersion,
    DeleteIdempotent,
}

impl Check {
    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::ListRules => "list_rules",
            Self::BaselineVersion => "baseline_version",
            Self::SyntheticVersionOrdering => "synthetic_version_ordering",
            Self::UploadRoundtrip => "upload_roundtrip",
            Self::UploadVersion => "upload_version",
            Self::DeleteRevertsVersion => "delete_reverts_version",
            Self::DeleteIdempotent => "delete_idempotent",
        }
    }
}

impl Display for Check {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How the originally active rules were put back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub(crate) enum RestoreOutcome {
    /// The captured blob was uploaded again.
    Reuploaded,
    /// Nothing was active before, so custom rules were deleted.
    Deleted,
    /// Restoration failed; the server may still hold test rules.
    Failed { detail: String },
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct VerificationReport {
    pub(crate) baseline_version: String,
    pub(crate) synthetic_version: String,
    pub(crate) passed: Vec<Check>,
    pub(crate) restore: RestoreOutcome,
}

/// Reasons a verification run did not pass.
#[derive(Debug, Error)]
pub(crate) enum HarnessError {
    #[error("could not capture the active rules")]
    Setup(#[source] RulesError),
    #[error("check '{check}' failed: {detail}")]
    Check { check: Check, detail: String },
    #[error("{operation} failed during verification")]
    Api {
        operation: &'static str,
        #[source]
        source: RulesError,
    },
    #[error("verification passed but the original rules could not be restored: {detail}")]
    Restore { detail: String },
}

impl HarnessError {
    fn check(check: Check, detail: impl Into<String>) -> Self {
        Self::Check {
            check,
            detail: detail.into(),
        }
    }

    fn api(operation: &'static str) -> impl FnOnce(RulesError) -> Self {
        move |source| Self::Api { operation, source }
    }
}

/// Run the full verification sequence against `api`.
///
/// # Errors
///
/// Returns [`HarnessError::Setup`] if the active rules cannot be captured,
/// [`HarnessError::Check`] or [`HarnessError::Api`] for the first failing
/// step, and [`HarnessError::Restore`] if every check passed but cleanup did not.
pub(crate) async fn verify_rules_roundtrip<R>(
    api: &R,
    options: HarnessOptions,
) -> Result<VerificationReport, HarnessError>
where
    R: RulesApi + ?Sized,
{
    info!("capturing active rules");
    let original = api.list_rules().await.map_err(HarnessError::Setup)?;

    let mut session = Session {
        api,
        settle: options.settle,
        passed: Vec::new(),
    };
    session.pass(Check::ListRules);

    let outcome = session.run().await;
    let restore = session.restore(&original).await;

    match outcome {
        Ok((baseline_version, synthetic_version)) => {
            if let RestoreOutcome::Failed { detail } = restore {
                return Err(HarnessError::Restore { detail });
            }
            Ok(VerificationReport {
                baseline_version,
                synthetic_version: synthetic_version.to_string(),
                passed: session.passed,
                restore,
            })
        }
        Err(err) => {
            warn!(error = %err, restore = ?restore, "verification failed");
            Err(err)
        }
    }
}

struct Session<'a, R: ?Sized> {
    api: &'a R,
    settle: Duration,
    passed: Vec<Check>,
}

impl<R> Session<'_, R>
where
    R: RulesApi + ?Sized,
{
    fn pass(&mut self, check: Check) {
        info!(check = %check, "check passed");
        self.passed.push(check);
    }

    async fn settle(&self) {
        if !self.settle.is_zero() {
            debug!(settle = ?self.settle, "waiting before write");
            sleep(self.settle).await;
        }
    }

    async fn current_status(&self) -> Result<ServerStatus, HarnessError> {
        self.api
            .get_status()
            .await
            .map_err(HarnessError::api("get_status"))
    }

    async fn expect_version(&self, check: Check, expected: &str) -> Result<(), HarnessError> {
        let reported = self.current_status().await?.rules_version;
        if reported == expected {
            Ok(())
        } else {
            Err(HarnessError::check(
                check,
                format!("server reports rules version '{reported}', expected '{expected}'"),
            ))
        }
    }

    async fn run(&mut self) -> Result<(String, Version), HarnessError> {
        info!("clearing leftover custom rules");
        self.settle().await;
        self.api
            .delete_rules()
            .await
            .map_err(HarnessError::api("delete_rules"))?;

        let status = self.current_status().await?;
        let baseline = status
            .parsed_rules_version()
            .map_err(|err| HarnessError::check(Check::BaselineVersion, err.to_string()))?;
        let baseline_text = status.rules_version;
        self.pass(Check::BaselineVersion);

        let synthetic = baseline
            .synthetic_successor()
            .map_err(|err| HarnessError::check(Check::SyntheticVersionOrdering, err.to_string()))?;
        if synthetic.compare(&baseline) != Ordering::Greater {
            return Err(HarnessError::check(
                Check::SyntheticVersionOrdering,
                format!("{synthetic} does not sort after {baseline}"),
            ));
        }
        self.pass(Check::SyntheticVersionOrdering);

        let blob = RulesBlob::with_version(synthetic, SYNTHETIC_RULES_BODY);
        info!(version = %synthetic, "uploading synthetic rules");
        self.settle().await;
        self.api
            .upload_rules(&blob.encode())
            .await
            .map_err(HarnessError::api("upload_rules"))?;

        let listed = self
            .api
            .list_rules()
            .await
            .map_err(HarnessError::api("list_rules"))?;
        let decoded = listed
            .decode()
            .map_err(|err| HarnessError::check(Check::UploadRoundtrip, err.to_string()))?;
        if decoded != blob {
            return Err(HarnessError::check(
                Check::UploadRoundtrip,
                format!(
                    "listed rules ({} bytes) differ from the uploaded rules ({} bytes)",
                    decoded.as_bytes().len(),
                    blob.as_bytes().len()
                ),
            ));
        }
        self.pass(Check::UploadRoundtrip);

        self.expect_version(Check::UploadVersion, &synthetic.to_string())
            .await?;
        self.pass(Check::UploadVersion);

        info!("deleting synthetic rules");
        self.settle().await;
        self.api
            .delete_rules()
            .await
            .map_err(HarnessError::api("delete_rules"))?;
        self.expect_version(Check::DeleteRevertsVersion, &baseline_text)
            .await?;
        self.pass(Check::DeleteRevertsVersion);

        self.settle().await;
        self.api
            .delete_rules()
            .await
            .map_err(|err| HarnessError::check(Check::DeleteIdempotent, err.to_string()))?;
        self.expect_version(Check::DeleteIdempotent, &baseline_text)
            .await?;
        self.pass(Check::DeleteIdempotent);

        Ok((baseline_text, synthetic))
    }

    async fn restore(&self, original: &EncodedRulesBlob) -> RestoreOutcome {
        self.settle().await;
        if original.is_empty() {
            info!("no rules were active before verification; deleting custom rules");
            match self.api.delete_rules().await {
                Ok(()) => RestoreOutcome::Deleted,
                Err(err) => {
                    error!(error = %err, "failed to clear rules after verification");
                    RestoreOutcome::Failed {
                        detail: err.to_string(),
                    }
                }
            }
        } else {
            info!("re-uploading the originally active rules");
            match self.api.upload_rules(original).await {
                Ok(()) => RestoreOutcome::Reuploaded,
                Err(err) => {
                    error!(error = %err, "failed to restore the original rules");
                    RestoreOutcome::Failed {
                        detail: err.to_string(),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use rulesctl_test_support::fixtures::{DEFAULT_RULES_VERSION, default_rules, operator_rules};
    use rulesctl_test_support::mocks::{ApiCall, InMemoryRulesServer};

    #[tokio::test]
    async fn fresh_upload_passes_every_check() -> Result<()> {
        let server = InMemoryRulesServer::new(DEFAULT_RULES_VERSION);
        let report = verify_rules_roundtrip(&server, HarnessOptions::default()).await?;

        assert_eq!(report.baseline_version, "5.3");
        assert_eq!(report.synthetic_version, "5.10003");
        assert_eq!(report.passed.len(), 7);
        assert_eq!(report.restore, RestoreOutcome::Reuploaded);

        let synthetic = RulesBlob::from("//Version: 5.10003\nvar a=1.0;").encode();
        assert!(server.calls().await.contains(&ApiCall::UploadRules(synthetic)));

        let restored = server.custom_rules().await.map(|encoded| encoded.decode());
        assert_eq!(restored.transpose()?, Some(default_rules(DEFAULT_RULES_VERSION)));
        Ok(())
    }

    #[tokio::test]
    async fn empty_baseline_is_restored_by_deleting() -> Result<()> {
        let server = InMemoryRulesServer::default().serving_empty_default();
        let report = verify_rules_roundtrip(&server, HarnessOptions::default()).await?;

        assert_eq!(report.restore, RestoreOutcome::Deleted);
        assert!(server.custom_rules().await.is_none());
        assert_eq!(server.calls().await.last(), Some(&ApiCall::DeleteRules));
        Ok(())
    }

    #[tokio::test]
    async fn failed_check_still_restores_original_rules() -> Result<()> {
        let server = InMemoryRulesServer::default().with_custom_rules(operator_rules().encode());
        server.misreport_version_after_upload("9.9").await;

        let err = verify_rules_roundtrip(&server, HarnessOptions::default())
            .await
            .expect_err("misreported version must fail");
        assert!(matches!(
            err,
            HarnessError::Check {
                check: Check::UploadVersion,
                ..
            }
        ));
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn api_failure_mid_run_still_restores_original_rules() -> Result<()> {
        let server = InMemoryRulesServer::default().with_custom_rules(operator_rules().encode());
        server.fail_listing_after_upload().await;

        let err = verify_rules_roundtrip(&server, HarnessOptions::default())
            .await
            .expect_err("listing fails after upload");
        assert!(matches!(
            err,
            HarnessError::Api {
                operation: "list_rules",
                ..
            }
        ));
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn altered_listing_fails_roundtrip_and_restores() -> Result<()> {
        let server = InMemoryRulesServer::default().with_custom_rules(operator_rules().encode());
        server.alter_listing_after_upload().await;

        let err = verify_rules_roundtrip(&server, HarnessOptions::default())
            .await
            .expect_err("listed bytes differ from the upload");
        assert!(matches!(
            err,
            HarnessError::Check {
                check: Check::UploadRoundtrip,
                ..
            }
        ));
        assert_eq!(
            server.calls().await.last(),
            Some(&ApiCall::UploadRules(operator_rules().encode()))
        );
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn stale_version_after_delete_fails_and_restores() -> Result<()> {
        let server = InMemoryRulesServer::default().with_custom_rules(operator_rules().encode());
        server.keep_uploaded_version_after_delete().await;

        let err = verify_rules_roundtrip(&server, HarnessOptions::default())
            .await
            .expect_err("version must revert after delete");
        assert!(matches!(
            err,
            HarnessError::Check {
                check: Check::DeleteRevertsVersion,
                ..
            }
        ));
        assert_eq!(
            server.calls().await.last(),
            Some(&ApiCall::UploadRules(operator_rules().encode()))
        );
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn restore_failure_does_not_mask_primary_error() -> Result<()> {
        let server = InMemoryRulesServer::default().with_custom_rules(operator_rules().encode());
        server.fail_uploads().await;

        let err = verify_rules_roundtrip(&server, HarnessOptions::default())
            .await
            .expect_err("uploads are rejected");
        assert!(matches!(
            err,
            HarnessError::Api {
                operation: "upload_rules",
                ..
            }
        ));
        assert_eq!(
            server.calls().await.last(),
            Some(&ApiCall::UploadRules(operator_rules().encode()))
        );
        Ok(())
    }

    #[tokio::test]
    async fn healed_server_passes_after_faults_are_cleared() -> Result<()> {
        let server = InMemoryRulesServer::default().with_custom_rules(operator_rules().encode());
        server.fail_listing_after_upload().await;
        server.heal().await;

        let report = verify_rules_roundtrip(&server, HarnessOptions::default()).await?;
        assert_eq!(report.restore, RestoreOutcome::Reuploaded);
        assert_eq!(report.baseline_version, DEFAULT_RULES_VERSION.to_string());
        Ok(())
    }

    #[tokio::test]
    async fn settle_delay_is_applied_before_writes() -> Result<()> {
        let server = InMemoryRulesServer::default();
        let started = std::time::Instant::now();
        let options = HarnessOptions {
            settle: Duration::from_millis(10),
        };

        verify_rules_roundtrip(&server, options).await?;
        // Leading delete, upload, two deletes, restore.
        assert!(started.elapsed() >= Duration::from_millis(50));
        Ok(())
    }

    #[test]
    fn check_names_are_snake_case() {
        assert_eq!(Check::SyntheticVersionOrdering.to_string(), "synthetic_version_ordering");
        assert_eq!(HarnessOptions::default().settle, Duration::ZERO);
    }
}
