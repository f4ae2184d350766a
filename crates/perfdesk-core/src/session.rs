// ── Session context ──
//
// The signed-in user, loaded once per process and handed to consumers by
// reference. Nothing reads it from ambient storage after startup.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::CoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl CurrentUser {
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// Read-only view of the current session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    user: Arc<CurrentUser>,
    loaded_at: DateTime<Utc>,
}

static SESSION: OnceCell<SessionContext> = OnceCell::const_new();

impl SessionContext {
    pub fn new(user: CurrentUser) -> Self {
        Self {
            user: Arc::new(user),
            loaded_at: Utc::now(),
        }
    }

    /// Load the process-wide session exactly once.
    ///
    /// The first caller runs `fetch`; concurrent and later callers get the
    /// same context without fetching. A failed fetch leaves the session
    /// unset so a later call can try again.
    pub async fn init_with<F, Fut, E>(fetch: F) -> Result<&'static Self, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CurrentUser, E>>,
        E: Into<CoreError>,
    {
        SESSION
            .get_or_try_init(|| async move {
                let user = fetch().await.map_err(Into::<CoreError>::into)?;
                debug!(user = %user.username, "session loaded");
                Ok::<_, CoreError>(Self::new(user))
            })
            .await
    }

    /// The session loaded by [`init_with`](Self::init_with), if any.
    pub fn current() -> Option<&'static Self> {
        SESSION.get()
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn user() -> CurrentUser {
        CurrentUser {
            id: 7,
            username: "ada".into(),
            display_name: None,
            roles: vec!["Manager".into()],
        }
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let session = SessionContext::new(user());
        assert_eq!(session.user().display_name(), "ada");
        assert_eq!(session.user().roles, vec!["Manager".to_owned()]);
    }

    #[test]
    fn user_deserializes_from_camel_case() {
        let user: CurrentUser = serde_json::from_value(serde_json::json!({
            "id": 3,
            "username": "grace",
            "displayName": "Grace H."
        }))
        .unwrap();
        assert_eq!(user.display_name(), "Grace H.");
        assert!(user.roles.is_empty());
    }

    // The only test touching the process-wide cell.
    #[tokio::test]
    async fn global_session_loads_once() {
        let calls = AtomicU32::new(0);

        let failed = SessionContext::init_with(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<CurrentUser, _>(CoreError::AuthenticationFailed {
                message: "expired".into(),
            })
        })
        .await;
        assert!(failed.is_err());
        assert!(SessionContext::current().is_none());

        for _ in 0..2 {
            let session = SessionContext::init_with(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CoreError>(user())
            })
            .await
            .unwrap();
            assert_eq!(session.user().id, 7);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(SessionContext::current().is_some());
    }
}
