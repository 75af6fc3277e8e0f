use crate::client::{AppContext, CliError, CliResult};
use crate::output::render_status;

pub(crate) async fn handle_status(ctx: &AppContext) -> CliResult<()> {
    let status = ctx.rules.get_status().await.map_err(CliError::rules)?;
    render_status(&status, ctx.output)
}
