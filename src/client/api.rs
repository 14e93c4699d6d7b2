//! HTTP client for the CivicBridge REST API.
//!
//! This is the only place in the client that talks to the network. Every call
//! is a single attempt: no retries, no backoff.

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::auth::API_KEY_HEADER;
use crate::models::{
    AddCommentRequest, AdminLoginRequest, CreateReportRequest, LoginRequest, Report,
    ReportPayload, ReportStatus, ReportsPayload, SignupRequest, UpdateStatusRequest, User,
    UserPayload,
};

/// Failure of an API call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Transport(String),
    /// The server answered with `success: false`.
    #[error("{message}")]
    Application { status: u16, message: String },
    /// The response body could not be understood.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl ClientError {
    /// Whether the server was unreachable, as opposed to refusing the request.
    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }

    /// HTTP status of an application-level failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Typed client with one method per backend operation.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ApiClient {
    /// Create a client for an API rooted at `base_url` (e.g. `http://host:5000/api`).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ============= AUTH =============

    pub async fn signup(&self, email: &str, name: &str, password: &str) -> Result<User, ClientError> {
        let body = SignupRequest {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
        };
        let payload: UserPayload = self.send(Method::POST, "/auth/signup", Some(&body)).await?;
        Ok(payload.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let payload: UserPayload = self.send(Method::POST, "/auth/login", Some(&body)).await?;
        Ok(payload.user)
    }

    pub async fn admin_login(&self, username: &str, password: &str) -> Result<User, ClientError> {
        let body = AdminLoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let payload: UserPayload = self
            .send(Method::POST, "/auth/admin-login", Some(&body))
            .await?;
        Ok(payload.user)
    }

    // ============= REPORTS =============

    /// Submit a report. Returns the report as stored by the server.
    pub async fn create_report(&self, report: &Report) -> Result<Report, ClientError> {
        let body = CreateReportRequest::from(report);
        let payload: ReportPayload = self.send(Method::POST, "/reports", Some(&body)).await?;
        Ok(payload.report)
    }

    pub async fn list_user_reports(&self, user_id: &str) -> Result<Vec<Report>, ClientError> {
        let path = format!("/reports/user/{}", urlencoding::encode(user_id));
        let payload: ReportsPayload = self.send(Method::GET, &path, None::<&()>).await?;
        Ok(payload.reports)
    }

    pub async fn list_reports(&self) -> Result<Vec<Report>, ClientError> {
        let payload: ReportsPayload = self.send(Method::GET, "/reports", None::<&()>).await?;
        Ok(payload.reports)
    }

    pub async fn update_status(
        &self,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<(), ClientError> {
        let path = format!("/reports/{}/status", urlencoding::encode(report_id));
        let body = UpdateStatusRequest { status };
        self.send::<Value, _>(Method::PUT, &path, Some(&body)).await?;
        Ok(())
    }

    pub async fn add_comment(
        &self,
        report_id: &str,
        comment: &str,
        admin_id: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/reports/{}/comment", urlencoding::encode(report_id));
        let body = AddCommentRequest {
            comment: comment.to_string(),
            admin_id: admin_id.to_string(),
        };
        self.send::<Value, _>(Method::POST, &path, Some(&body)).await?;
        Ok(())
    }

    pub async fn delete_report(&self, report_id: &str) -> Result<(), ClientError> {
        let path = format!("/reports/{}", urlencoding::encode(report_id));
        self.send::<Value, _>(Method::DELETE, &path, None::<&()>).await?;
        Ok(())
    }

    /// Check that the backend is reachable.
    pub async fn health(&self) -> Result<(), ClientError> {
        let response = self
            .request(Method::GET, "/health")
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ClientError::Application {
                status: response.status().as_u16(),
                message: format!("health check failed with {}", response.status()),
            })
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder
    }

    async fn send<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        tracing::debug!(%method, path, "API request");

        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(path, error = %e, "API request failed");
            ClientError::Transport(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        decode_envelope(status, &text)
    }
}

/// Interpret a `{success, ...}` envelope.
fn decode_envelope<T: DeserializeOwned>(status: StatusCode, text: &str) -> Result<T, ClientError> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) if !status.is_success() => {
            return Err(ClientError::Application {
                status: status.as_u16(),
                message: format!("request failed with {}", status),
            })
        }
        Err(e) => return Err(ClientError::Decode(e.to_string())),
    };

    let succeeded = value.get("success").and_then(Value::as_bool).unwrap_or(false);
    if !succeeded || !status.is_success() {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with {}", status));
        return Err(ClientError::Application {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}
