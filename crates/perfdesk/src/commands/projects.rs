//! Project command handlers.

use std::io::IsTerminal;

use chrono::NaiveDate;
use serde_json::Value;
use tabled::Tabled;
use tracing::info;

use perfdesk_api::{NewProject, Project};
use perfdesk_core::{
    CoreError, FieldErrors, FieldValues, FormController, FormOptions, PageParams, SubmitOutcome,
};

use crate::cli::{ProjectCreateArgs, ProjectsArgs, ProjectsCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, list, util};

const NAME_MAX: usize = 100;
const CODE_MAX: usize = 20;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct ProjectRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Manager")]
    manager: String,
    #[tabled(rename = "Members")]
    members: u32,
}

impl From<&Project> for ProjectRow {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            code: p.code.clone().unwrap_or_default(),
            status: p.status.clone(),
            manager: p.manager_name.clone().unwrap_or_default(),
            members: p.member_count,
        }
    }
}

fn detail(p: &Project) -> String {
    let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "-".into());
    output::detail_lines(&[
        ("ID", p.id.to_string()),
        ("Name", p.name.clone()),
        ("Code", p.code.clone().unwrap_or_else(|| "-".into())),
        ("Status", p.status.clone()),
        ("Manager", p.manager_name.clone().unwrap_or_else(|| "-".into())),
        ("Start", date(p.start_date)),
        ("End", date(p.end_date)),
        ("Members", p.member_count.to_string()),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: ProjectsArgs) -> Result<(), CliError> {
    match args.command {
        ProjectsCommand::List(list_args) => {
            let client = ctx.client.clone();
            let listing = list::collect(ctx, "projects", &list_args, move |params: PageParams| {
                let client = client.clone();
                async move { client.list_projects(&params).await }
            })
            .await?;

            let out = output::render_list(
                ctx.output,
                &listing.rows,
                |p| ProjectRow::from(p),
                |p| p.id.to_string(),
            )?;
            output::print_output(&out, ctx.quiet);
            list::print_footer(ctx, &listing);
            Ok(())
        }

        ProjectsCommand::Show { id } => {
            let project = ctx.client.get_project(id).await?;
            let out = output::render_single(ctx.output, &project, detail, |p| p.id.to_string())?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }

        ProjectsCommand::Create(create_args) => create(ctx, create_args).await,
    }
}

// ── Create ──────────────────────────────────────────────────────────

async fn create(ctx: &Context, args: ProjectCreateArgs) -> Result<(), CliError> {
    let initial: FieldValues = match &args.from_file {
        Some(path) => util::read_json_object(path)?.into_iter().collect(),
        None => FieldValues::new(),
    };

    let client = ctx.client.clone();
    let cache = ctx.cache.clone();
    let options = FormOptions::new(initial, move |values: FieldValues| {
        let client = client.clone();
        async move {
            let project: NewProject = serde_json::to_value(&values)
                .and_then(serde_json::from_value)
                .map_err(|e| CoreError::Validation {
                    message: e.to_string(),
                })?;
            client.create_project(&project).await.map_err(CoreError::from)
        }
    })
    .validate(validate_project)
    .on_success(move |project: &Project, _| {
        info!(id = project.id, name = %project.name, "project created");
        list::invalidate(&cache, "projects");
    });

    let mut form = FormController::new(options);
    if let Some(name) = args.name {
        form.handle_change("name", name);
    }
    if let Some(code) = args.code {
        form.handle_change("code", code);
    }
    if let Some(manager_id) = args.manager_id {
        form.handle_change("managerId", manager_id);
    }
    if let Some(start) = args.start_date {
        form.handle_change("startDate", start);
    }
    if let Some(end) = args.end_date {
        form.handle_change("endDate", end);
    }

    if is_blank(form.value("name")) && std::io::stdin().is_terminal() && !ctx.yes {
        let name: String = dialoguer::Input::new()
            .with_prompt("Project name")
            .interact_text()
            .map_err(util::prompt_err)?;
        form.handle_change("name", name);
    }

    match form.handle_submit().await {
        SubmitOutcome::Submitted(project) => {
            let out = output::render_single(ctx.output, &*project, detail, |p| p.id.to_string())?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
        SubmitOutcome::Invalid(errors) => Err(CliError::invalid_form(&errors)),
        SubmitOutcome::Failed(err) => Err(CliError::from_core(&err, &ctx.profile)),
        SubmitOutcome::Busy => Err(CliError::Busy),
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn parse_date(values: &FieldValues, field: &str, errors: &mut FieldErrors) -> Option<NaiveDate> {
    match values.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => {
            let parsed = NaiveDate::parse_from_str(raw, "%Y-%m-%d");
            if parsed.is_err() {
                errors.insert(field.into(), "must be a date like 2026-01-31".into());
            }
            parsed.ok()
        }
        Some(_) => {
            errors.insert(field.into(), "must be a date string".into());
            None
        }
    }
}

/// Client-side checks run before anything is sent.
pub fn validate_project(values: &FieldValues) -> FieldErrors {
    let mut errors = FieldErrors::new();

    match values.get("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => {
            if name.chars().count() > NAME_MAX {
                errors.insert("name".into(), format!("must be at most {NAME_MAX} characters"));
            }
        }
        _ => {
            errors.insert("name".into(), "is required".into());
        }
    }

    match values.get("code") {
        None | Some(Value::Null) => {}
        Some(Value::String(code))
            if !code.is_empty()
                && code.len() <= CODE_MAX
                && code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {}
        Some(_) => {
            errors.insert(
                "code".into(),
                format!("must be 1-{CODE_MAX} letters, digits, or dashes"),
            );
        }
    }

    match values.get("managerId") {
        None | Some(Value::Null) => {}
        Some(v) if v.as_i64().is_some_and(|id| id > 0) => {}
        Some(_) => {
            errors.insert("managerId".into(), "must be a positive employee ID".into());
        }
    }

    let start = parse_date(values, "startDate", &mut errors);
    let end = parse_date(values, "endDate", &mut errors);
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.insert("endDate".into(), "must not be before the start date".into());
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn values(pairs: &[(&str, Value)]) -> FieldValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), v.clone()))
            .collect()
    }

    #[test]
    fn name_is_required() {
        let errors = validate_project(&values(&[("name", json!("  "))]));
        assert_eq!(errors.get("name").map(String::as_str), Some("is required"));
    }

    #[test]
    fn valid_project_has_no_errors() {
        let errors = validate_project(&values(&[
            ("name", json!("Atlas")),
            ("code", json!("ATL-1")),
            ("managerId", json!(9)),
            ("startDate", json!("2026-01-01")),
            ("endDate", json!("2026-06-30")),
        ]));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn bad_code_and_reversed_dates() {
        let errors = validate_project(&values(&[
            ("name", json!("Atlas")),
            ("code", json!("has space")),
            ("startDate", json!("2026-06-30")),
            ("endDate", json!("2026-01-01")),
        ]));
        assert!(errors.contains_key("code"));
        assert!(errors.contains_key("endDate"));
        assert!(!errors.contains_key("startDate"));
    }

    #[test]
    fn malformed_date_and_manager() {
        let errors = validate_project(&values(&[
            ("name", json!("Atlas")),
            ("managerId", json!(-3)),
            ("startDate", json!("01/02/2026")),
        ]));
        assert!(errors.contains_key("managerId"));
        assert!(errors.contains_key("startDate"));
    }

    #[test]
    fn blank_detection() {
        assert!(is_blank(None));
        assert!(is_blank(Some(&Value::Null)));
        assert!(is_blank(Some(&json!(" "))));
        assert!(!is_blank(Some(&json!("x"))));
    }
}
