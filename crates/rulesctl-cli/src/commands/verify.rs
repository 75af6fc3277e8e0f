use std::time::Duration;

use crate::cli::VerifyArgs;
use crate::client::{AppContext, CliError, CliResult};
use crate::harness::{HarnessError, HarnessOptions, verify_rules_roundtrip};
use crate::output::render_report;

pub(crate) async fn handle_verify(ctx: &AppContext, args: &VerifyArgs) -> CliResult<()> {
    let options = HarnessOptions {
        settle: Duration::from_millis(args.settle_ms),
    };
    let report = verify_rules_roundtrip(ctx.rules.as_ref(), options)
        .await
        .map_err(|err| match err {
            HarnessError::Setup(source) => CliError::rules(source),
            other => CliError::failure(other),
        })?;
    render_report(&report, ctx.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use anyhow::Result;
    use rulesctl_test_support::fixtures::operator_rules;
    use rulesctl_test_support::mocks::InMemoryRulesServer;

    use crate::commands::test_context::context;

    #[tokio::test]
    async fn verify_passes_against_consistent_server() -> Result<()> {
        let server = Arc::new(
            InMemoryRulesServer::default().with_custom_rules(operator_rules().encode()),
        );
        handle_verify(&context(&server), &VerifyArgs { settle_ms: 0 })
            .await
            .map_err(|err| anyhow::anyhow!(err.display_message()))?;
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn failed_check_exits_with_failure_code() -> Result<()> {
        let server = Arc::new(InMemoryRulesServer::default());
        server.misreport_version_after_upload("5.4").await;

        let err = handle_verify(&context(&server), &VerifyArgs { settle_ms: 0 })
            .await
            .expect_err("misreported version");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("upload_version"));
        Ok(())
    }
}
