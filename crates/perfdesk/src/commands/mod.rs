//! Command dispatch: bridges CLI args to the API client, the data
//! controllers, and output formatting.

pub mod config_cmd;
pub mod employees;
pub mod evaluations;
pub mod list;
pub mod projects;
pub mod qualifications;
pub mod util;
pub mod whoami;

use perfdesk_api::ApiClient;
use perfdesk_core::{LoaderDefaults, QueryCache};

use crate::cli::{Command, OutputFormat};
use crate::error::CliError;

/// Everything a server-bound command needs.
pub struct Context {
    pub client: ApiClient,
    /// One cache per invocation; list commands and `--all` walks share it.
    pub cache: QueryCache,
    pub defaults: LoaderDefaults,
    pub output: OutputFormat,
    pub profile: String,
    pub quiet: bool,
    pub yes: bool,
}

/// Dispatch a server-bound command to its handler.
pub async fn dispatch(cmd: Command, ctx: &Context) -> Result<(), CliError> {
    match cmd {
        Command::Projects(args) => projects::handle(ctx, args).await,
        Command::Employees(args) => employees::handle(ctx, args).await,
        Command::Qualifications(args) => qualifications::handle(ctx, args).await,
        Command::Evaluations(args) => evaluations::handle(ctx, args).await,
        Command::Whoami => whoami::handle(ctx).await,
        Command::Config(_) | Command::Completions(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "handled without a server connection".into(),
        }),
    }
}
