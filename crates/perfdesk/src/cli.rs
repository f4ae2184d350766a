//! Clap derive structures for the `perfdesk` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// perfdesk -- browse projects, employees, and performance evaluations
#[derive(Debug, Parser)]
#[command(
    name = "perfdesk",
    version,
    about = "Work with perfdesk performance evaluations from the command line",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "PERFDESK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, env = "PERFDESK_API_URL", global = true)]
    pub api_url: Option<String>,

    /// API bearer token
    #[arg(long, env = "PERFDESK_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format [default: from config, else table]
    #[arg(long, short = 'o', env = "PERFDESK_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', env = "PERFDESK_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "PERFDESK_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Browse and create projects
    #[command(alias = "proj")]
    Projects(ProjectsArgs),

    /// Browse employees
    #[command(alias = "emp")]
    Employees(EmployeesArgs),

    /// Browse qualification results
    #[command(alias = "qual")]
    Qualifications(QualificationsArgs),

    /// Browse, submit, and select evaluations
    #[command(alias = "eval")]
    Evaluations(EvaluationsArgs),

    /// Show the signed-in user
    Whoami,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared List Arguments ────────────────────────────────────────────

/// Paging, filtering, and sorting shared by every list command.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Page number, starting at 1
    #[arg(long, default_value = "1")]
    pub page: u32,

    /// Rows per page [default: from config]
    #[arg(long, short = 'l')]
    pub page_size: Option<u32>,

    /// Filter as key=value (repeatable)
    #[arg(long = "filter", short = 'f', value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Free-text search
    #[arg(long, short = 'K')]
    pub keyword: Option<String>,

    /// Sort as field[:asc|desc]
    #[arg(long, short = 's', value_name = "FIELD[:DIR]")]
    pub sort: Option<String>,

    /// Fetch all pages automatically
    #[arg(long, short = 'a')]
    pub all: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PROJECTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ProjectsArgs {
    #[command(subcommand)]
    pub command: ProjectsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProjectsCommand {
    /// List projects
    #[command(alias = "ls")]
    List(ListArgs),

    /// Show one project
    Show {
        /// Project ID
        id: i64,
    },

    /// Create a project
    Create(ProjectCreateArgs),
}

#[derive(Debug, Args)]
pub struct ProjectCreateArgs {
    /// Project name
    #[arg(long)]
    pub name: Option<String>,

    /// Short project code (letters, digits, dashes)
    #[arg(long)]
    pub code: Option<String>,

    /// Managing employee ID
    #[arg(long)]
    pub manager_id: Option<i64>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<String>,

    /// Read the project from a JSON file; flags override its fields
    #[arg(long, short = 'F', value_name = "PATH")]
    pub from_file: Option<PathBuf>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  EMPLOYEES / QUALIFICATIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct EmployeesArgs {
    #[command(subcommand)]
    pub command: EmployeesCommand,
}

#[derive(Debug, Subcommand)]
pub enum EmployeesCommand {
    /// List employees
    #[command(alias = "ls")]
    List(ListArgs),
}

#[derive(Debug, Args)]
pub struct QualificationsArgs {
    #[command(subcommand)]
    pub command: QualificationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum QualificationsCommand {
    /// List qualification results
    #[command(alias = "ls")]
    List(ListArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  EVALUATIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct EvaluationsArgs {
    #[command(subcommand)]
    pub command: EvaluationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum EvaluationsCommand {
    /// List evaluations
    #[command(alias = "ls")]
    List(ListArgs),

    /// Submit an evaluation
    Submit(EvaluationSubmitArgs),

    /// Pick evaluations by ID across pages and print them
    Select {
        /// Evaluation IDs to pick (repeatable or comma-separated)
        #[arg(long = "id", required = true, value_delimiter = ',')]
        ids: Vec<i64>,

        #[command(flatten)]
        list: ListArgs,
    },
}

#[derive(Debug, Args)]
pub struct EvaluationSubmitArgs {
    /// Employee being evaluated
    #[arg(long)]
    pub employee: i64,

    /// Project the evaluation belongs to
    #[arg(long)]
    pub project: i64,

    /// Evaluation period, e.g. 2026-Q3
    #[arg(long)]
    pub period: String,

    /// Criterion rating as name=1..5 (repeatable)
    #[arg(long = "rating", short = 'r', value_name = "NAME=SCORE")]
    pub ratings: Vec<String>,

    /// Free-form comment
    #[arg(long)]
    pub comment: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create a profile with guided setup
    Init,

    /// Display the resolved configuration (tokens masked)
    Show,

    /// Store an API token in the system keyring
    SetToken {
        /// Profile name [default: active profile]
        #[arg(long)]
        profile: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }
}
