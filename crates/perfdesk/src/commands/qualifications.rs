//! Qualification command handlers.

use tabled::Tabled;

use perfdesk_api::Qualification;
use perfdesk_core::PageParams;

use crate::cli::{QualificationsArgs, QualificationsCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, list};

#[derive(Tabled)]
struct QualificationRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Employee")]
    employee: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Qualified")]
    qualified: String,
}

impl From<&Qualification> for QualificationRow {
    fn from(q: &Qualification) -> Self {
        Self {
            id: q.id,
            employee: q
                .employee_name
                .clone()
                .unwrap_or_else(|| q.employee_id.to_string()),
            period: q.period.clone().unwrap_or_default(),
            level: q.level.clone(),
            qualified: if q.qualified { "yes" } else { "no" }.into(),
        }
    }
}

pub async fn handle(ctx: &Context, args: QualificationsArgs) -> Result<(), CliError> {
    match args.command {
        QualificationsCommand::List(list_args) => {
            let client = ctx.client.clone();
            let listing =
                list::collect(ctx, "qualifications", &list_args, move |params: PageParams| {
                    let client = client.clone();
                    async move { client.list_qualifications(&params).await }
                })
                .await?;

            let out = output::render_list(
                ctx.output,
                &listing.rows,
                |q| QualificationRow::from(q),
                |q| q.id.to_string(),
            )?;
            output::print_output(&out, ctx.quiet);
            list::print_footer(ctx, &listing);
            Ok(())
        }
    }
}
