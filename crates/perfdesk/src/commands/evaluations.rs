//! Evaluation command handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};
use tabled::Tabled;
use tracing::{debug, info};

use perfdesk_api::{Evaluation, EvaluationSubmission};
use perfdesk_core::{
    CoreError, FieldErrors, FieldValues, FormController, FormOptions, KeyPart, PageParams, RowKey,
    SelectionController, SelectionOptions, StaleKeys, SubmitOutcome,
};

use crate::cli::{EvaluationSubmitArgs, EvaluationsArgs, EvaluationsCommand, ListArgs};
use crate::error::CliError;
use crate::output;

use super::list::{self, PageWalker};
use super::{Context, util};

const RATING_MIN: i64 = 1;
const RATING_MAX: i64 = 5;
const COMMENT_MAX: usize = 500;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct EvaluationRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Employee")]
    employee: String,
    #[tabled(rename = "Project")]
    project: String,
    #[tabled(rename = "Period")]
    period: String,
    #[tabled(rename = "Score")]
    score: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Evaluation> for EvaluationRow {
    fn from(e: &Evaluation) -> Self {
        Self {
            id: e.id,
            employee: e
                .employee_name
                .clone()
                .unwrap_or_else(|| e.employee_id.to_string()),
            project: e
                .project_name
                .clone()
                .unwrap_or_else(|| e.project_id.to_string()),
            period: e.period.clone(),
            score: e.score.map(|s| format!("{s:.1}")).unwrap_or_default(),
            status: e.status.clone(),
        }
    }
}

fn detail(e: &Evaluation) -> String {
    let row = EvaluationRow::from(e);
    output::detail_lines(&[
        ("ID", e.id.to_string()),
        ("Employee", row.employee),
        ("Project", row.project),
        ("Period", e.period.clone()),
        ("Score", e.score.map_or_else(|| "-".into(), |s| format!("{s:.1}"))),
        ("Status", e.status.clone()),
        (
            "Submitted",
            e.submitted_at
                .map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
        ),
    ])
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(ctx: &Context, args: EvaluationsArgs) -> Result<(), CliError> {
    match args.command {
        EvaluationsCommand::List(list_args) => {
            let client = ctx.client.clone();
            let listing =
                list::collect(ctx, "evaluations", &list_args, move |params: PageParams| {
                    let client = client.clone();
                    async move { client.list_evaluations(&params).await }
                })
                .await?;

            let out = output::render_list(
                ctx.output,
                &listing.rows,
                |e| EvaluationRow::from(e),
                |e| e.id.to_string(),
            )?;
            output::print_output(&out, ctx.quiet);
            list::print_footer(ctx, &listing);
            Ok(())
        }
        EvaluationsCommand::Submit(submit_args) => submit(ctx, submit_args).await,
        EvaluationsCommand::Select { ids, list } => select(ctx, &ids, &list).await,
    }
}

// ── Submit ──────────────────────────────────────────────────────────

/// Ratings that don't parse as integers are kept as strings so the
/// validator can report them by name.
fn ratings_value(raw: &[String]) -> Result<Value, CliError> {
    let mut ratings = serde_json::Map::new();
    for entry in raw {
        let (name, score) = util::parse_key_value("rating", entry)?;
        let value = score
            .parse::<i64>()
            .map_or_else(|_| Value::from(score), Value::from);
        ratings.insert(name.to_owned(), value);
    }
    Ok(Value::Object(ratings))
}

async fn submit(ctx: &Context, args: EvaluationSubmitArgs) -> Result<(), CliError> {
    let mut initial = FieldValues::new();
    initial.insert("employeeId".into(), json!(args.employee));
    initial.insert("projectId".into(), json!(args.project));
    initial.insert("period".into(), json!(args.period));
    initial.insert("ratings".into(), ratings_value(&args.ratings)?);
    if let Some(comment) = args.comment {
        initial.insert("comment".into(), json!(comment));
    }

    let client = ctx.client.clone();
    let cache = ctx.cache.clone();
    let options = FormOptions::new(initial, move |values: FieldValues| {
        let client = client.clone();
        async move {
            let submission: EvaluationSubmission = serde_json::to_value(&values)
                .and_then(serde_json::from_value)
                .map_err(|e| CoreError::Validation {
                    message: e.to_string(),
                })?;
            client
                .submit_evaluation(&submission)
                .await
                .map_err(CoreError::from)
        }
    })
    .validate(validate_evaluation)
    .on_success(move |evaluation: &Evaluation, _| {
        info!(id = evaluation.id, status = %evaluation.status, "evaluation submitted");
        list::invalidate(&cache, "evaluations");
    });

    let mut form = FormController::new(options);
    match form.handle_submit().await {
        SubmitOutcome::Submitted(evaluation) => {
            let out =
                output::render_single(ctx.output, &*evaluation, detail, |e| e.id.to_string())?;
            output::print_output(&out, ctx.quiet);
            Ok(())
        }
        SubmitOutcome::Invalid(errors) => Err(CliError::invalid_form(&errors)),
        SubmitOutcome::Failed(err) => Err(CliError::from_core(&err, &ctx.profile)),
        SubmitOutcome::Busy => Err(CliError::Busy),
    }
}

fn valid_period(period: &str) -> bool {
    let Some((year, rest)) = period.split_once('-') else {
        return false;
    };
    if year.len() != 4 || !year.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match rest.as_bytes() {
        [b'Q', q] => (b'1'..=b'4').contains(q),
        [m1, m2] if m1.is_ascii_digit() && m2.is_ascii_digit() => {
            let month = (m1 - b'0') * 10 + (m2 - b'0');
            (1..=12).contains(&month)
        }
        _ => false,
    }
}

/// Client-side checks run before anything is sent.
pub fn validate_evaluation(values: &FieldValues) -> FieldErrors {
    let mut errors = FieldErrors::new();

    for field in ["employeeId", "projectId"] {
        if !values
            .get(field)
            .and_then(Value::as_i64)
            .is_some_and(|id| id > 0)
        {
            errors.insert(field.into(), "must be a positive ID".into());
        }
    }

    if !values
        .get("period")
        .and_then(Value::as_str)
        .is_some_and(valid_period)
    {
        errors.insert("period".into(), "must look like 2026-Q3 or 2026-09".into());
    }

    match values.get("ratings").and_then(Value::as_object) {
        Some(ratings) if !ratings.is_empty() => {
            for (name, score) in ratings {
                let in_range = score
                    .as_i64()
                    .is_some_and(|s| (RATING_MIN..=RATING_MAX).contains(&s));
                if !in_range {
                    errors.insert(
                        format!("ratings.{name}"),
                        format!("must be a whole number from {RATING_MIN} to {RATING_MAX}"),
                    );
                }
            }
        }
        _ => {
            errors.insert("ratings".into(), "at least one --rating is required".into());
        }
    }

    if let Some(comment) = values.get("comment").and_then(Value::as_str) {
        if comment.chars().count() > COMMENT_MAX {
            errors.insert(
                "comment".into(),
                format!("must be at most {COMMENT_MAX} characters"),
            );
        }
    }

    errors
}

// ── Select ──────────────────────────────────────────────────────────

/// Walk every page with a sticky selection keyed by `id` and return the
/// picked rows in the order they were found.
async fn select(ctx: &Context, ids: &[i64], list_args: &ListArgs) -> Result<(), CliError> {
    let options = list::pagination_options(ctx, list_args)?;
    let client = ctx.client.clone();
    let fetch = move |params: PageParams| {
        let client = client.clone();
        async move { client.list_evaluations(&params).await }
    };
    let mut walker = PageWalker::new(ctx, "evaluations", options, true, fetch);

    let mut selection = SelectionController::<Evaluation>::new(
        Arc::new(Vec::new()),
        RowKey::field("id"),
        SelectionOptions::default()
            .selected(ids.iter().copied())
            .stale_keys(StaleKeys::Retain),
    );

    let mut picked: BTreeMap<i64, Evaluation> = BTreeMap::new();
    let mut order: Vec<i64> = Vec::new();
    while let Some(view) = walker.next_page().await? {
        selection.set_data(Arc::new(view.data().to_vec()));
        for row in selection.selected_rows() {
            if picked.insert(row.id, row.clone()).is_none() {
                order.push(row.id);
            }
        }
        debug!(
            page = view.pagination.page,
            picked = picked.len(),
            wanted = ids.len(),
            "selection page scanned"
        );
        if picked.len() >= selection.selected_row_keys().len() {
            break;
        }
    }

    let missing: Vec<String> = selection
        .selected_row_keys()
        .into_iter()
        .filter(|key| !matches!(key, KeyPart::Int(id) if picked.contains_key(id)))
        .map(|key| key.to_string())
        .collect();
    if !missing.is_empty() && !ctx.quiet {
        eprintln!("not found: {}", missing.join(", "));
    }

    let rows: Vec<Evaluation> = order
        .iter()
        .filter_map(|id| picked.remove(id))
        .collect();
    let out = output::render_list(
        ctx.output,
        &rows,
        |e| EvaluationRow::from(e),
        |e| e.id.to_string(),
    )?;
    output::print_output(&out, ctx.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form(pairs: Value) -> FieldValues {
        pairs
            .as_object()
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default()
    }

    #[test]
    fn periods() {
        assert!(valid_period("2026-Q3"));
        assert!(valid_period("2026-09"));
        assert!(!valid_period("2026-Q5"));
        assert!(!valid_period("2026-13"));
        assert!(!valid_period("26-Q1"));
    }

    #[test]
    fn complete_submission_is_valid() {
        let errors = validate_evaluation(&form(json!({
            "employeeId": 7,
            "projectId": 1,
            "period": "2026-Q3",
            "ratings": { "delivery": 4, "teamwork": 5 }
        })));
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn ratings_are_checked_by_name() {
        let errors = validate_evaluation(&form(json!({
            "employeeId": 7,
            "projectId": 1,
            "period": "2026-Q3",
            "ratings": { "delivery": 9, "teamwork": "great" }
        })));
        assert!(errors.contains_key("ratings.delivery"));
        assert!(errors.contains_key("ratings.teamwork"));
    }

    #[test]
    fn missing_ratings_and_ids() {
        let errors = validate_evaluation(&form(json!({
            "employeeId": 0,
            "period": "2026-Q3",
            "ratings": {}
        })));
        assert!(errors.contains_key("employeeId"));
        assert!(errors.contains_key("projectId"));
        assert!(errors.contains_key("ratings"));
    }

    #[test]
    fn rating_flags_keep_unparsed_values() {
        let value = ratings_value(&["delivery=4".into(), "teamwork=great".into()]).unwrap();
        assert_eq!(value, json!({ "delivery": 4, "teamwork": "great" }));
        assert!(ratings_value(&["oops".into()]).is_err());
    }
}
