//! HTTP client for the test-runner backend

use async_trait::async_trait;
use std::time::{Duration, Instant};

use super::models::{
    Account, Credentials, DashboardData, Identity, LoginResponse, NewAccount, TestResult,
};
use super::response::Response;
use super::Backend;
use crate::app::Config;
use crate::error::ApiError;
use crate::request::TestPayload;

/// reqwest-backed implementation of [`Backend`]
pub struct BackendClient {
    /// Inner reqwest client
    client: reqwest::Client,

    /// Backend origin, without trailing slash
    base_url: String,

    /// TCP connect timeout
    connect_timeout: Duration,
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// No overall request timeout is set: test runs may take as long as the
    /// backend needs. Token verification is bounded by the session manager.
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base_url = config.backend.base_url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url).map_err(|_| ApiError::InvalidUrl(base_url.clone()))?;

        let connect_timeout = Duration::from_secs(config.backend.connect_timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(&config.backend.user_agent)
            .cookie_store(true)
            .build()
            .map_err(|e| ApiError::NetworkUnreachable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            connect_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and collect the full body
    async fn send(&self, builder: reqwest::RequestBuilder, path: &str) -> Result<Response, ApiError> {
        let start = Instant::now();
        tracing::debug!(path, "Sending backend request");

        let response = builder.send().await.map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.classify(e))?;
        let duration = start.elapsed();

        tracing::debug!(
            path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Backend responded"
        );

        Ok(Response::new(status.as_u16(), body.to_vec()))
    }

    async fn get_authorized(&self, path: &str, token: &str) -> Result<Response, ApiError> {
        let builder = self.client.get(self.endpoint(path)).bearer_auth(token);
        self.send(builder, path).await
    }

    /// Map transport failures onto the client taxonomy
    fn classify(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.connect_timeout.as_millis() as u64)
        } else if err.is_builder() {
            ApiError::InvalidUrl(err.to_string())
        } else {
            ApiError::NetworkUnreachable(err.to_string())
        }
    }
}

/// A rejected submission surfaces the backend's detail; auth failures pass through
fn submission_error(err: ApiError) -> ApiError {
    match err {
        ApiError::BackendRejected { detail, .. } => ApiError::TestSubmissionFailed(detail),
        other => other,
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let path = "/api/login";
        let builder = self.client.post(self.endpoint(path)).form(credentials);
        let response = self.send(builder, path).await?;

        // Wrong credentials come back as 401, which is not a session failure here
        if response.is_unauthorized() {
            return Err(ApiError::BackendRejected {
                status: response.status,
                detail: response
                    .detail()
                    .unwrap_or_else(|| "Incorrect username or password".to_string()),
            });
        }
        response.decode("Login failed. Please try again.")
    }

    async fn signup(&self, account: &NewAccount) -> Result<Account, ApiError> {
        let path = "/api/signup";
        let builder = self.client.post(self.endpoint(path)).json(account);
        let response = self.send(builder, path).await?;
        response.decode("Registration failed. Please try again.")
    }

    async fn protected(&self, token: &str) -> Result<Identity, ApiError> {
        let response = self.get_authorized("/api/protected", token).await?;
        response.decode("Token verification failed")
    }

    async fn dashboard(&self, token: &str) -> Result<DashboardData, ApiError> {
        let response = self.get_authorized("/api/dashboard", token).await?;
        response.decode("Failed to load dashboard")
    }

    async fn run_tests(&self, token: &str, payload: &TestPayload) -> Result<Vec<TestResult>, ApiError> {
        let path = "/api/run-tests";
        let builder = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(token)
            .json(payload);
        let response = self.send(builder, path).await?;

        response.decode("Failed to run tests").map_err(submission_error)
    }

    async fn results(&self, token: &str) -> Result<Vec<TestResult>, ApiError> {
        let response = self.get_authorized("/api/results", token).await?;
        response.decode("Failed to load results")
    }
}
