//! Argument parsing, settings layering and command dispatch.

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rulesctl_config::defaults::{DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_SECS, default_rc_path};
use rulesctl_config::{ConnectionOptions, RcSettings, load_rc_file};
use rulesctl_telemetry::{LogFormat, LoggingConfig, command_span, init_logging};
use tracing::{Instrument, debug, warn};
use uuid::Uuid;

use crate::client::{AppContext, CliError, CliResult, TelemetryEmitter};
use crate::commands::rules::{
    handle_rules_delete, handle_rules_list, handle_rules_upload, handle_rules_version,
};
use crate::commands::status::handle_status;
use crate::commands::verify::handle_verify;
use crate::transport::HttpRulesClient;

/// Parses CLI arguments, executes the requested command, and handles
/// user-facing telemetry emission. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let command_name = command_label(&cli.command);
    let trace_id = Uuid::new_v4().to_string();
    let telemetry = TelemetryEmitter::from_env();

    let result = execute(cli, &trace_id).await;

    let (exit_code, message, outcome) = match result {
        Ok(()) => (0, None, "success"),
        Err(err) => {
            let exit_code = err.exit_code();
            let message = err.display_message();
            eprintln!("error: {message}");
            (exit_code, Some(message), "error")
        }
    };

    if let Some(emitter) = &telemetry {
        emitter
            .emit(
                &trace_id,
                command_name,
                outcome,
                exit_code,
                message.as_deref(),
            )
            .await;
    }

    exit_code
}

async fn execute(cli: Cli, trace_id: &str) -> CliResult<()> {
    let rc_path = cli.config.clone().unwrap_or_else(default_rc_path);
    let rc = load_rc_file(&rc_path).map_err(CliError::config)?;
    let settings = RcSettings::default()
        .overlay(rc.settings)
        .overlay(cli.flag_settings())
        .resolve();

    let logging = LoggingConfig {
        level: settings.log_level(),
        format: cli.log_format.map_or_else(LogFormat::infer, LogFormat::from),
        build_sha: option_env!("RULESCTL_BUILD_SHA").unwrap_or("dev"),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let span = command_span(command_label(&cli.command), trace_id);
    async {
        if !rc.found {
            warn!(path = %rc.path.display(), "RC file not found; continuing with default settings");
        }
        debug!("starting command");

        if let Command::Rules(RulesCommand::Version(args)) = &cli.command {
            return handle_rules_version(args, cli.output);
        }

        let config = connection_options(&cli)?
            .resolve()
            .map_err(CliError::config)?;
        debug!(
            server_url = %config.server_url,
            insecure = config.insecure,
            "resolved connection settings"
        );
        let ctx = AppContext {
            rules: Arc::new(HttpRulesClient::new(&config, trace_id)?),
            output: cli.output,
        };

        dispatch(&cli.command, &ctx).await
    }
    .instrument(span)
    .await
}

async fn dispatch(command: &Command, ctx: &AppContext) -> CliResult<()> {
    match command {
        Command::Status => handle_status(ctx).await,
        Command::Rules(rules) => match rules {
            RulesCommand::List(args) => handle_rules_list(ctx, args).await,
            RulesCommand::Upload(args) => handle_rules_upload(ctx, args).await,
            RulesCommand::Delete => handle_rules_delete(ctx).await,
            RulesCommand::Version(args) => handle_rules_version(args, ctx.output),
        },
        Command::Verify(args) => handle_verify(ctx, args).await,
    }
}

#[derive(Parser)]
#[command(
    name = "rulesctl",
    version,
    about = "Manage and verify the rules of an entitlement server"
)]
pub(crate) struct Cli {
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        env = "RULESCTL_CONFIG",
        help = "RC file to load instead of ~/.rulesctlrc"
    )]
    config: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log progress at info level")]
    verbose: bool,
    #[arg(long, global = true, help = "Log protocol detail at debug level")]
    debug: bool,
    #[arg(
        long,
        global = true,
        env = "RULESCTL_SERVER_URL",
        default_value = DEFAULT_SERVER_URL,
        help = "Server base URL including the entitlement context path"
    )]
    server_url: String,
    #[arg(long, global = true, env = "RULESCTL_SERVER_CA", value_name = "PEM")]
    server_ca: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL",
        help = "Skip TLS verification (defaults to true for loopback hosts)"
    )]
    insecure: Option<bool>,
    #[arg(long, global = true, env = "RULESCTL_USERNAME")]
    username: Option<String>,
    #[arg(long, global = true, env = "RULESCTL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, global = true, value_name = "PEM")]
    client_cert: Option<PathBuf>,
    #[arg(long, global = true, value_name = "PEM")]
    client_key: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        env = "RULESCTL_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    timeout: u64,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    output: OutputFormat,
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Flags only ever switch settings on; absent flags defer to the RC file.
    fn flag_settings(&self) -> RcSettings {
        RcSettings {
            verbose: self.verbose.then_some(true),
            debug: self.debug.then_some(true),
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Show server status, including the active rules version.
    Status,
    /// Inspect or change the active rules.
    #[command(subcommand)]
    Rules(RulesCommand),
    /// Run the upload/list/delete round trip and restore the original rules.
    Verify(VerifyArgs),
}

#[derive(Subcommand)]
pub(crate) enum RulesCommand {
    /// Print or save the active rules.
    List(RulesListArgs),
    /// Replace the active rules with a local file.
    Upload(RulesUploadArgs),
    /// Drop custom rules so the server reverts to its default.
    Delete,
    /// Print the version marker of a local rules file.
    Version(RulesVersionArgs),
}

#[derive(Args)]
pub(crate) struct RulesListArgs {
    #[arg(long, help = "Keep the rules base64-encoded")]
    pub(crate) raw: bool,
    #[arg(long, value_name = "FILE")]
    pub(crate) out: Option<PathBuf>,
}

#[derive(Args)]
pub(crate) struct RulesUploadArgs {
    #[arg(help = "Rules file to upload")]
    pub(crate) file: PathBuf,
    #[arg(long, help = "The file is already base64-encoded")]
    pub(crate) encoded: bool,
}

#[derive(Args)]
pub(crate) struct RulesVersionArgs {
    #[arg(help = "Rules file to inspect")]
    pub(crate) file: PathBuf,
}

#[derive(Args)]
pub(crate) struct VerifyArgs {
    #[arg(
        long,
        env = "RULESCTL_SETTLE_MS",
        default_value_t = 0,
        help = "Wait before each write, for servers with coarse change timestamps"
    )]
    pub(crate) settle_ms: u64,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Status => "status",
        Command::Rules(RulesCommand::List(_)) => "rules_list",
        Command::Rules(RulesCommand::Upload(_)) => "rules_upload",
        Command::Rules(RulesCommand::Delete) => "rules_delete",
        Command::Rules(RulesCommand::Version(_)) => "rules_version",
        Command::Verify(_) => "verify",
    }
}

fn connection_options(cli: &Cli) -> CliResult<ConnectionOptions> {
    let password = match (&cli.username, &cli.password) {
        (Some(_), None) if io::stdin().is_terminal() => Some(prompt_password()?),
        _ => cli.password.clone(),
    };

    Ok(ConnectionOptions {
        server_url: cli.server_url.clone(),
        server_ca: cli.server_ca.clone(),
        insecure: cli.insecure,
        username: cli.username.clone(),
        password,
        client_cert: cli.client_cert.clone(),
        client_key: cli.client_key.clone(),
        timeout_secs: cli.timeout,
    })
}

fn prompt_password() -> CliResult<String> {
    let password = rpassword::prompt_password("Password: ").map_err(|err| {
        CliError::failure(anyhow!("failed to read password from the terminal: {err}"))
    })?;
    if password.is_empty() {
        return Err(CliError::validation("password cannot be empty"));
    }
    Ok(password)
}
