//! Root span carried by every command run.

use tracing::Span;

use crate::init::build_sha;

/// Span wrapping one command invocation, tagged with the build and trace ids.
///
/// Enter it (or instrument the command future with it) after
/// [`crate::init_logging`] so the recorded build SHA is the configured one.
#[must_use]
pub fn command_span(command: &str, trace_id: &str) -> Span {
    tracing::info_span!("rulesctl", command, trace_id, build_sha = %build_sha())
}
