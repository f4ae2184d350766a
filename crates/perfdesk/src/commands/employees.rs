//! Employee command handlers.

use tabled::Tabled;

use perfdesk_api::Employee;
use perfdesk_core::PageParams;

use crate::cli::{EmployeesArgs, EmployeesCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, list};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EmployeeRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Department")]
    department: String,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Active")]
    active: String,
}

impl From<&Employee> for EmployeeRow {
    fn from(e: &Employee) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            department: e.department.clone().unwrap_or_default(),
            position: e.position.clone().unwrap_or_default(),
            active: if e.active { "yes" } else { "no" }.into(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: EmployeesArgs) -> Result<(), CliError> {
    match args.command {
        EmployeesCommand::List(list_args) => {
            let client = ctx.client.clone();
            let listing = list::collect(ctx, "employees", &list_args, move |params: PageParams| {
                let client = client.clone();
                async move { client.list_employees(&params).await }
            })
            .await?;

            let out = output::render_list(
                ctx.output,
                &listing.rows,
                |e| EmployeeRow::from(e),
                |e| e.id.to_string(),
            )?;
            output::print_output(&out, ctx.quiet);
            list::print_footer(ctx, &listing);
            Ok(())
        }
    }
}
