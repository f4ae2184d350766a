//! `whoami`: load the session once and show the signed-in user.

use perfdesk_core::{CurrentUser, SessionContext};

use crate::error::CliError;
use crate::output;

use super::Context;

fn detail(session: &SessionContext, user: &CurrentUser) -> String {
    output::detail_lines(&[
        ("ID", user.id.to_string()),
        ("Username", user.username.clone()),
        ("Name", user.display_name().to_owned()),
        ("Roles", user.roles.join(", ")),
        (
            "Loaded",
            session.loaded_at().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
    ])
}

pub async fn handle(ctx: &Context) -> Result<(), CliError> {
    let client = ctx.client.clone();
    let session = SessionContext::init_with(|| async move { client.current_user().await })
        .await
        .map_err(|e| CliError::from_core(&e, &ctx.profile))?;

    let out = output::render_single(
        ctx.output,
        session.user(),
        |u| detail(session, u),
        |u| u.username.clone(),
    )?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}
