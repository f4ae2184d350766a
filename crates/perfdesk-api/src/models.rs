//! Request and response payloads for the perfdesk REST API.
//!
//! Field names use camelCase on the wire via `#[serde(rename_all = "camelCase")]`.
//! Scores and qualification results are computed server-side; they are
//! carried here as opaque values.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Projects ─────────────────────────────────────────────────────────

/// Project overview, from `GET /projects` and `GET /projects/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    /// One of `PLANNED`, `ACTIVE`, `CLOSED`.
    pub status: String,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub member_count: u32,
    /// Catch-all for fields not modeled above.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Body of `POST /projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

// ── Employees ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub active: bool,
}

// ── Qualifications ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualification {
    pub id: i64,
    pub employee_id: i64,
    #[serde(default)]
    pub employee_name: Option<String>,
    /// Qualification level as reported by the server (e.g. `A`, `B`).
    pub level: String,
    #[serde(default)]
    pub period: Option<String>,
    /// Whether the employee met the qualification rules for the period.
    #[serde(default)]
    pub qualified: bool,
}

// ── Evaluations ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub id: i64,
    pub employee_id: i64,
    #[serde(default)]
    pub employee_name: Option<String>,
    pub project_id: i64,
    #[serde(default)]
    pub project_name: Option<String>,
    /// Evaluation period, e.g. `2026-Q3`.
    pub period: String,
    /// Weighted score; absent until the evaluation is finalized.
    #[serde(default)]
    pub score: Option<f64>,
    /// One of `DRAFT`, `SUBMITTED`, `FINAL`.
    pub status: String,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Body of `POST /evaluations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationSubmission {
    pub employee_id: i64,
    pub project_id: i64,
    pub period: String,
    /// Criterion name -> raw rating. Weighting happens on the server.
    pub ratings: HashMap<String, u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}
