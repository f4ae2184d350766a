// ── Form controller ──
//
// Field values, per-field errors, and touched flags for one form, with
// submission delegated to a `Mutation`. Values are JSON so one controller
// type serves every form; `values_as` recovers a typed payload.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::CoreError;
use crate::mutation::{Mutation, MutationState};

pub type FieldValues = BTreeMap<String, Value>;
pub type FieldErrors = BTreeMap<String, String>;

type Validator = Arc<dyn Fn(&FieldValues) -> FieldErrors + Send + Sync>;
type SuccessFn<R> = Arc<dyn Fn(&R, &FieldValues) + Send + Sync>;
type ErrorFn = Arc<dyn Fn(&CoreError, &FieldValues) + Send + Sync>;

/// Serialize a struct into form values. Anything that is not a JSON object
/// is rejected.
pub fn field_values<V: Serialize>(value: &V) -> Result<FieldValues, CoreError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map.into_iter().collect()),
        Ok(other) => Err(CoreError::Validation {
            message: format!("form values must be an object, got {other}"),
        }),
        Err(e) => Err(CoreError::Validation {
            message: e.to_string(),
        }),
    }
}

/// Result of [`FormController::handle_submit`].
#[derive(Debug)]
pub enum SubmitOutcome<R> {
    /// Validation produced errors; nothing was submitted.
    Invalid(FieldErrors),
    Submitted(Arc<R>),
    Failed(Arc<CoreError>),
    /// Another submission through the same mutation is still pending.
    Busy,
}

pub struct FormOptions<R> {
    initial_values: FieldValues,
    mutation: Mutation<FieldValues, R>,
    on_success: Option<SuccessFn<R>>,
    on_error: Option<ErrorFn>,
    validate: Option<Validator>,
    reset_on_success: bool,
}

impl<R: Send + Sync + 'static> FormOptions<R> {
    pub fn new<F, Fut, E>(initial_values: FieldValues, on_submit: F) -> Self
    where
        F: Fn(FieldValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        E: Into<CoreError> + 'static,
    {
        Self::with_mutation(initial_values, Mutation::new(on_submit))
    }

    /// Submit through an existing mutation, sharing its single-flight guard.
    pub fn with_mutation(initial_values: FieldValues, mutation: Mutation<FieldValues, R>) -> Self {
        Self {
            initial_values,
            mutation,
            on_success: None,
            on_error: None,
            validate: None,
            reset_on_success: true,
        }
    }

    pub fn on_success(mut self, f: impl Fn(&R, &FieldValues) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&CoreError, &FieldValues) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn validate(mut self, f: impl Fn(&FieldValues) -> FieldErrors + Send + Sync + 'static) -> Self {
        self.validate = Some(Arc::new(f));
        self
    }

    pub fn reset_on_success(mut self, reset: bool) -> Self {
        self.reset_on_success = reset;
        self
    }
}

pub struct FormController<R> {
    values: FieldValues,
    errors: FieldErrors,
    touched: BTreeSet<String>,
    options: FormOptions<R>,
}

impl<R: Send + Sync + 'static> FormController<R> {
    pub fn new(options: FormOptions<R>) -> Self {
        Self {
            values: options.initial_values.clone(),
            errors: FieldErrors::new(),
            touched: BTreeSet::new(),
            options,
        }
    }

    // ── State ────────────────────────────────────────────────────────

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Deserialize the current values into `V`.
    pub fn values_as<V: DeserializeOwned>(&self) -> Result<V, CoreError> {
        let object = self.values.clone().into_iter().collect();
        serde_json::from_value(Value::Object(object)).map_err(|e| CoreError::Validation {
            message: e.to_string(),
        })
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn get_field_error(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn touched(&self) -> &BTreeSet<String> {
        &self.touched
    }

    pub fn is_field_touched(&self, field: &str) -> bool {
        self.touched.contains(field)
    }

    pub fn submission(&self) -> MutationState<R> {
        self.options.mutation.state()
    }

    pub fn is_submitting(&self) -> bool {
        self.options.mutation.is_pending()
    }

    pub fn is_success(&self) -> bool {
        self.submission().is_success()
    }

    pub fn is_error(&self) -> bool {
        self.submission().is_error()
    }

    pub fn error(&self) -> Option<Arc<CoreError>> {
        self.submission().error
    }

    // ── Mutators ─────────────────────────────────────────────────────

    /// User edit: set the value, mark touched, clear that field's error.
    pub fn handle_change(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        self.errors.remove(&field);
        self.touched.insert(field.clone());
        self.values.insert(field, value.into());
    }

    /// Merge `partial` into the current values.
    pub fn set_values(&mut self, partial: FieldValues) {
        self.values.extend(partial);
    }

    /// Programmatic set. Errors and touched flags are left alone.
    pub fn set_field_value(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(field.into(), value.into());
    }

    pub fn set_field_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.insert(field.into(), message.into());
    }

    /// Restore initial values and clear errors and touched flags.
    pub fn reset(&mut self) {
        self.values = self.options.initial_values.clone();
        self.errors.clear();
        self.touched.clear();
    }

    // ── Submission ───────────────────────────────────────────────────

    /// Validate, then submit the current values.
    ///
    /// On success the form is reset (unless disabled) before `on_success`
    /// sees the values that were actually submitted. On failure state is
    /// kept so the user can correct and resubmit.
    pub async fn handle_submit(&mut self) -> SubmitOutcome<R> {
        if let Some(validate) = &self.options.validate {
            let errors = validate(&self.values);
            if !errors.is_empty() {
                debug!(fields = ?errors.keys().collect::<Vec<_>>(), "validation blocked submission");
                self.errors.clone_from(&errors);
                return SubmitOutcome::Invalid(errors);
            }
            self.errors.clear();
        }

        let submitted = self.values.clone();
        match self.options.mutation.mutate(submitted.clone()).await {
            Ok(data) => {
                if self.options.reset_on_success {
                    self.reset();
                }
                if let Some(cb) = &self.options.on_success {
                    cb(&data, &submitted);
                }
                SubmitOutcome::Submitted(data)
            }
            Err(error) if matches!(*error, CoreError::MutationInFlight) => SubmitOutcome::Busy,
            Err(error) => {
                if let Some(cb) = &self.options.on_error {
                    cb(&error, &submitted);
                }
                SubmitOutcome::Failed(error)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::*;

    fn name_form(name: &str) -> FieldValues {
        let mut values = FieldValues::new();
        values.insert("name".into(), json!(name));
        values
    }

    fn echo() -> impl Fn(FieldValues) -> std::future::Ready<Result<FieldValues, CoreError>>
    + Send
    + Sync
    + 'static {
        |values| std::future::ready(Ok(values))
    }

    #[tokio::test]
    async fn successful_submit_resets_by_default() {
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut form = FormController::new(
            FormOptions::new(name_form(""), echo())
                .on_success(move |_, submitted| *sink.lock().unwrap() = Some(submitted.clone())),
        );

        form.handle_change("name", "X");
        let outcome = form.handle_submit().await;

        assert!(matches!(outcome, SubmitOutcome::Submitted(_)));
        assert_eq!(form.values(), &name_form(""));
        assert!(form.touched().is_empty());
        assert!(form.is_success());
        // on_success sees the pre-reset values.
        assert_eq!(seen.lock().unwrap().clone(), Some(name_form("X")));
    }

    #[tokio::test]
    async fn reset_on_success_can_be_disabled() {
        let mut form =
            FormController::new(FormOptions::new(name_form(""), echo()).reset_on_success(false));

        form.handle_change("name", "X");
        form.handle_submit().await;

        assert_eq!(form.value("name"), Some(&json!("X")));
        assert!(form.is_field_touched("name"));
    }

    #[tokio::test]
    async fn validation_blocks_submission() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let mut form = FormController::new(
            FormOptions::new(name_form(""), move |values: FieldValues| {
                counter.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<_, CoreError>(values))
            })
            .validate(|values| {
                let mut errors = FieldErrors::new();
                if values.get("name").and_then(Value::as_str).unwrap_or("").is_empty() {
                    errors.insert("name".into(), "Required".into());
                }
                errors
            }),
        );

        let outcome = form.handle_submit().await;
        assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
        assert_eq!(form.get_field_error("name"), Some("Required"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Editing clears the error; a valid resubmit goes through.
        form.handle_change("name", "Ada");
        assert_eq!(form.get_field_error("name"), None);
        assert!(matches!(form.handle_submit().await, SubmitOutcome::Submitted(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn edit_clears_error_and_marks_touched() {
        let mut form = FormController::new(FormOptions::new(name_form(""), echo()));
        form.set_field_error("name", "Required");
        assert_eq!(form.get_field_error("name"), Some("Required"));

        form.handle_change("name", "A");
        assert_eq!(form.get_field_error("name"), None);
        assert!(form.is_field_touched("name"));
    }

    #[test]
    fn programmatic_setters_do_not_touch() {
        let mut form = FormController::new(FormOptions::new(name_form(""), echo()));
        form.set_field_error("name", "Required");
        form.set_field_value("name", "B");
        form.set_values(name_form("C"));

        assert_eq!(form.value("name"), Some(&json!("C")));
        assert_eq!(form.get_field_error("name"), Some("Required"));
        assert!(!form.is_field_touched("name"));
    }

    #[tokio::test]
    async fn failed_submit_keeps_state_and_calls_on_error() {
        let errors = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&errors);
        let mut form = FormController::new(
            FormOptions::new(name_form(""), |_values: FieldValues| {
                std::future::ready(Err::<(), _>(CoreError::Submit {
                    message: "duplicate name".into(),
                }))
            })
            .on_error(move |e, submitted| {
                assert_eq!(e.to_string(), "Submission failed: duplicate name");
                assert_eq!(submitted, &name_form("X"));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        form.handle_change("name", "X");
        let outcome = form.handle_submit().await;

        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert_eq!(form.value("name"), Some(&json!("X")));
        assert!(form.is_error());
        assert!(form.error().is_some());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_submit_through_shared_mutation_is_busy() {
        let gate = Arc::new(Notify::new());
        let mutation = {
            let gate = Arc::clone(&gate);
            Mutation::new(move |values: FieldValues| {
                let gate = Arc::clone(&gate);
                async move {
                    gate.notified().await;
                    Ok::<_, CoreError>(values)
                }
            })
        };

        let mut first = FormController::new(FormOptions::with_mutation(
            name_form("a"),
            mutation.clone(),
        ));
        let mut second = FormController::new(FormOptions::with_mutation(name_form("b"), mutation));

        let pending = tokio::spawn(async move { first.handle_submit().await });
        tokio::task::yield_now().await;

        assert!(second.is_submitting());
        assert!(matches!(second.handle_submit().await, SubmitOutcome::Busy));

        gate.notify_waiters();
        assert!(matches!(pending.await.unwrap(), SubmitOutcome::Submitted(_)));
    }

    #[test]
    fn typed_values_round_through_serde() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct NewProject {
            name: String,
            budget: u32,
        }

        let initial = field_values(&NewProject {
            name: "Apollo".into(),
            budget: 10,
        })
        .unwrap();
        let mut form = FormController::new(FormOptions::new(initial, echo()));
        form.handle_change("budget", 25);

        let project: NewProject = form.values_as().unwrap();
        assert_eq!(
            project,
            NewProject {
                name: "Apollo".into(),
                budget: 25
            }
        );
        assert!(field_values(&3_u32).is_err());
    }
}
