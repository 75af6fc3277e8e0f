use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use rulesctl_core::{EncodedRulesBlob, RulesBlob};
use tracing::{info, warn};

use crate::cli::{OutputFormat, RulesListArgs, RulesUploadArgs, RulesVersionArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{format_marker, render_local_version, render_rules_change};

pub(crate) async fn handle_rules_list(ctx: &AppContext, args: &RulesListArgs) -> CliResult<()> {
    let encoded = ctx.rules.list_rules().await.map_err(CliError::rules)?;
    if encoded.is_empty() {
        println!("No rules are active.");
        return Ok(());
    }

    let contents = if args.raw {
        if let Ok(blob) = encoded.decode() {
            log_marker(&blob);
        }
        encoded.into_inner().into_bytes()
    } else {
        let blob = encoded.decode().map_err(CliError::rules)?;
        log_marker(&blob);
        blob.into_bytes()
    };

    match &args.out {
        Some(path) => {
            fs::write(path, &contents)
                .with_context(|| format!("failed to write {}", path.display()))
                .map_err(CliError::failure)?;
            println!("Wrote {} bytes to {}.", contents.len(), path.display());
        }
        None => write_stdout(&contents)?,
    }
    Ok(())
}

pub(crate) async fn handle_rules_upload(ctx: &AppContext, args: &RulesUploadArgs) -> CliResult<()> {
    let contents = read_rules_file(&args.file)?;
    let (blob, encoded) = if args.encoded {
        let text = String::from_utf8(contents).map_err(|_| {
            CliError::validation(format!("{} is not valid UTF-8 text", args.file.display()))
        })?;
        let encoded = EncodedRulesBlob::new(text.trim());
        let blob = encoded.decode().map_err(|err| {
            CliError::validation(format!("{} is not valid base64: {err}", args.file.display()))
        })?;
        (blob, encoded)
    } else {
        let blob = RulesBlob::new(contents);
        let encoded = blob.encode();
        (blob, encoded)
    };

    if blob.is_empty() {
        return Err(CliError::validation(format!(
            "{} contains no rules",
            args.file.display()
        )));
    }

    let marker = match blob.require_version() {
        Ok(version) => Some(version),
        Err(err) => {
            warn!(
                file = %args.file.display(),
                error = %err,
                "rules carry no version marker; the server cannot report a new version"
            );
            None
        }
    };

    ctx.rules
        .upload_rules(&encoded)
        .await
        .map_err(CliError::rules)?;
    let status = ctx.rules.get_status().await.map_err(CliError::rules)?;
    render_rules_change("upload", marker, &status, ctx.output)
}

pub(crate) async fn handle_rules_delete(ctx: &AppContext) -> CliResult<()> {
    ctx.rules.delete_rules().await.map_err(CliError::rules)?;
    let status = ctx.rules.get_status().await.map_err(CliError::rules)?;
    render_rules_change("delete", None, &status, ctx.output)
}

/// Local-only: inspects a rules file without contacting the server.
pub(crate) fn handle_rules_version(args: &RulesVersionArgs, format: OutputFormat) -> CliResult<()> {
    let blob = RulesBlob::new(read_rules_file(&args.file)?);
    render_local_version(&args.file, blob.extract_version(), format)
}

fn read_rules_file(path: &Path) -> CliResult<Vec<u8>> {
    fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(CliError::failure)
}

fn log_marker(blob: &RulesBlob) {
    info!(
        version = %format_marker(blob.extract_version()),
        bytes = blob.as_bytes().len(),
        "active rules"
    );
}

fn write_stdout(contents: &[u8]) -> CliResult<()> {
    write_verbatim(&mut io::stdout().lock(), contents)
        .context("failed to write rules to stdout")
        .map_err(CliError::failure)
}

/// Redirected output must re-upload byte-for-byte, so nothing is appended.
fn write_verbatim(out: &mut impl Write, contents: &[u8]) -> io::Result<()> {
    out.write_all(contents)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use anyhow::Result;
    use rulesctl_test_support::fixtures::operator_rules;
    use rulesctl_test_support::mocks::{ApiCall, InMemoryRulesServer};

    use crate::commands::test_context::context;

    fn cli_err(err: CliError) -> anyhow::Error {
        anyhow::anyhow!(err.display_message())
    }

    #[tokio::test]
    async fn list_writes_decoded_rules_to_file() -> Result<()> {
        let server = Arc::new(
            InMemoryRulesServer::default().with_custom_rules(operator_rules().encode()),
        );
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("active.js");

        handle_rules_list(
            &context(&server),
            &RulesListArgs {
                raw: false,
                out: Some(out.clone()),
            },
        )
        .await
        .map_err(cli_err)?;
        assert_eq!(fs::read(&out)?, operator_rules().into_bytes());

        handle_rules_list(
            &context(&server),
            &RulesListArgs {
                raw: true,
                out: Some(out.clone()),
            },
        )
        .await
        .map_err(cli_err)?;
        assert_eq!(fs::read_to_string(&out)?, operator_rules().encode().into_inner());
        Ok(())
    }

    #[tokio::test]
    async fn list_with_nothing_active_succeeds() -> Result<()> {
        let server = Arc::new(InMemoryRulesServer::default().serving_empty_default());
        handle_rules_list(
            &context(&server),
            &RulesListArgs {
                raw: false,
                out: None,
            },
        )
        .await
        .map_err(cli_err)?;
        Ok(())
    }

    #[tokio::test]
    async fn upload_encodes_plain_files() -> Result<()> {
        let server = Arc::new(InMemoryRulesServer::default());
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("rules.js");
        fs::write(&file, operator_rules().as_bytes())?;

        handle_rules_upload(
            &context(&server),
            &RulesUploadArgs {
                file,
                encoded: false,
            },
        )
        .await
        .map_err(cli_err)?;
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn upload_sends_pre_encoded_files_verbatim() -> Result<()> {
        let server = Arc::new(InMemoryRulesServer::default());
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("rules.b64");
        fs::write(&file, format!("{}\n", operator_rules().encode()))?;

        handle_rules_upload(&context(&server), &RulesUploadArgs { file, encoded: true })
            .await
            .map_err(cli_err)?;
        assert_eq!(server.custom_rules().await, Some(operator_rules().encode()));
        Ok(())
    }

    #[tokio::test]
    async fn upload_rejects_malformed_encoded_files() -> Result<()> {
        let server = Arc::new(InMemoryRulesServer::default());
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("rules.b64");
        fs::write(&file, "not*base64")?;

        let err = handle_rules_upload(&context(&server), &RulesUploadArgs { file, encoded: true })
            .await
            .expect_err("malformed input");
        assert_eq!(err.exit_code(), 2);
        assert!(server.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn upload_of_missing_file_fails_before_any_request() -> Result<()> {
        let server = Arc::new(InMemoryRulesServer::default());
        let err = handle_rules_upload(
            &context(&server),
            &RulesUploadArgs {
                file: PathBuf::from("/definitely/missing/rules.js"),
                encoded: false,
            },
        )
        .await
        .expect_err("missing file");
        assert_eq!(err.exit_code(), 3);
        assert!(server.calls().await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_reverts_to_default() -> Result<()> {
        let server = Arc::new(
            InMemoryRulesServer::default().with_custom_rules(operator_rules().encode()),
        );
        handle_rules_delete(&context(&server))
            .await
            .map_err(cli_err)?;
        assert!(server.custom_rules().await.is_none());
        assert_eq!(
            server.calls().await,
            vec![ApiCall::DeleteRules, ApiCall::GetStatus]
        );
        Ok(())
    }

    #[test]
    fn stdout_output_is_byte_identical() -> Result<()> {
        let mut buffer = Vec::new();
        write_verbatim(&mut buffer, b"//Version: 5.10003\nvar a=1.0;")?;
        assert_eq!(buffer, b"//Version: 5.10003\nvar a=1.0;");
        Ok(())
    }

    #[tokio::test]
    async fn listed_rules_reupload_unchanged() -> Result<()> {
        let original = RulesBlob::from("//Version: 5.10003\nvar a=1.0;");
        let server = Arc::new(InMemoryRulesServer::default().with_custom_rules(original.encode()));
        let dir = tempfile::tempdir()?;
        let saved = dir.path().join("saved.js");

        let listed = context(&server).rules.list_rules().await?.decode()?;
        let mut buffer = Vec::new();
        write_verbatim(&mut buffer, listed.as_bytes())?;
        fs::write(&saved, &buffer)?;

        handle_rules_delete(&context(&server)).await.map_err(cli_err)?;
        handle_rules_upload(
            &context(&server),
            &RulesUploadArgs {
                file: saved,
                encoded: false,
            },
        )
        .await
        .map_err(cli_err)?;
        assert_eq!(server.custom_rules().await, Some(original.encode()));
        Ok(())
    }

    #[test]
    fn version_reads_local_marker() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("rules.js");
        fs::write(&file, "//Version: 2.10\nvar a=1.0;")?;
        handle_rules_version(&RulesVersionArgs { file }, OutputFormat::Json).map_err(cli_err)?;

        let missing = RulesVersionArgs {
            file: dir.path().join("absent.js"),
        };
        assert!(handle_rules_version(&missing, OutputFormat::Table).is_err());
        Ok(())
    }
}
