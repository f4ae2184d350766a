// Async HTTP client for the perfdesk REST API.
//
// Auth: `Authorization: Bearer <token>` default header.
// List endpoints take paging/filter/sort as query parameters and return
// `{ data, total, pages }`.

use perfdesk_core::{CurrentUser, Page, PageParams};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{Employee, Evaluation, EvaluationSubmission, NewProject, Project, Qualification};
use crate::transport::TransportConfig;

// ── Error response shape ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

// ── Connection settings ──────────────────────────────────────────────

/// Everything needed to open an authenticated client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: Url,
    pub token: SecretString,
    pub transport: TransportConfig,
}

// ── Client ───────────────────────────────────────────────────────────

/// Async client for the perfdesk API.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build from a bearer token and transport config.
    pub fn new(
        base_url: &str,
        token: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::Authentication {
                message: format!("invalid token header value: {e}"),
            })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);

        let http = transport.build_client_with_headers(headers)?;
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, Error> {
        Self::new(config.url.as_str(), &config.token, &config.transport)
    }

    /// Wrap an existing `reqwest::Client` (caller manages auth headers).
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: Self::normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ensure a trailing slash so relative joins append instead of
    /// replacing the last path segment.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        let path = url.path().trim_end_matches('/').to_owned();
        url.set_path(&format!("{path}/"));
        Ok(url)
    }

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    // ── HTTP verbs ───────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let resp = self.http.get(url).send().await?;
        self.handle_response(resp).await
    }

    async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url} params={params:?}");

        let resp = self.http.get(url).query(params).send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {url}");

        let resp = self.http.post(url).json(body).send().await?;
        self.handle_response(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, Error> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            serde_json::from_str(&body).map_err(|e| {
                let preview: String = body.chars().take(200).collect();
                Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }
            })
        } else {
            Err(self.parse_error(status, resp).await)
        }
    }

    async fn parse_error(&self, status: reqwest::StatusCode, resp: reqwest::Response) -> Error {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Error::InvalidToken;
        }

        let raw = resp.text().await.unwrap_or_default();
        let (message, code) = match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(err) => (err.message, err.code),
            Err(_) => ((!raw.is_empty()).then_some(raw), None),
        };

        if status == reqwest::StatusCode::FORBIDDEN {
            return Error::Authentication {
                message: message.unwrap_or_else(|| "access denied".into()),
            };
        }

        Error::Api {
            status: status.as_u16(),
            message: message.unwrap_or_else(|| status.to_string()),
            code,
        }
    }

    // ━━ Public API ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    // ── Session ──────────────────────────────────────────────────────

    pub async fn current_user(&self) -> Result<CurrentUser, Error> {
        self.get("me").await
    }

    // ── Projects ─────────────────────────────────────────────────────

    pub async fn list_projects(&self, params: &PageParams) -> Result<Page<Project>, Error> {
        self.get_with_params("projects", &params.to_query_pairs())
            .await
    }

    pub async fn get_project(&self, id: i64) -> Result<Project, Error> {
        self.get(&format!("projects/{id}")).await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, Error> {
        self.post("projects", project).await
    }

    // ── Employees ────────────────────────────────────────────────────

    pub async fn list_employees(&self, params: &PageParams) -> Result<Page<Employee>, Error> {
        self.get_with_params("employees", &params.to_query_pairs())
            .await
    }

    // ── Qualifications ───────────────────────────────────────────────

    pub async fn list_qualifications(
        &self,
        params: &PageParams,
    ) -> Result<Page<Qualification>, Error> {
        self.get_with_params("qualifications", &params.to_query_pairs())
            .await
    }

    // ── Evaluations ──────────────────────────────────────────────────

    pub async fn list_evaluations(&self, params: &PageParams) -> Result<Page<Evaluation>, Error> {
        self.get_with_params("evaluations", &params.to_query_pairs())
            .await
    }

    pub async fn submit_evaluation(
        &self,
        submission: &EvaluationSubmission,
    ) -> Result<Evaluation, Error> {
        self.post("evaluations", submission).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let client = ApiClient::from_reqwest("https://hr.example.com/api/v2", reqwest::Client::new())
            .unwrap();
        assert_eq!(client.base_url().as_str(), "https://hr.example.com/api/v2/");
        assert_eq!(
            client.url("projects/4").unwrap().as_str(),
            "https://hr.example.com/api/v2/projects/4"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ApiClient::from_reqwest("not a url", reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
