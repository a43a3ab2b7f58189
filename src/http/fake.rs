//! Scriptable in-process backend for tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::models::{
    Account, Credentials, DashboardData, DashboardStats, Identity, LoginResponse, NewAccount,
    RiskLevels, TestResult, User,
};
use super::Backend;
use crate::error::ApiError;
use crate::request::TestPayload;

/// Backend double with canned replies and call recording
pub struct FakeBackend {
    pub login_reply: Result<LoginResponse, ApiError>,
    pub signup_reply: Result<Account, ApiError>,
    pub identity_reply: Result<Identity, ApiError>,
    pub dashboard_reply: Result<DashboardData, ApiError>,
    pub run_tests_reply: Result<Vec<TestResult>, ApiError>,
    pub results_reply: Result<Vec<TestResult>, ApiError>,
    /// Delay before answering `protected`, to exercise timeouts
    pub verify_delay: Option<Duration>,
    calls: AtomicUsize,
    last_payload: Mutex<Option<TestPayload>>,
    last_token: Mutex<Option<String>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            login_reply: Ok(LoginResponse {
                access_token: "tok123".to_string(),
                token_type: Some("bearer".to_string()),
                user: Some(User::new("alice")),
            }),
            signup_reply: Ok(Account {
                id: Some(1),
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
            }),
            identity_reply: Ok(Identity {
                username: Some("alice".to_string()),
                message: None,
            }),
            dashboard_reply: Ok(DashboardData {
                stats: DashboardStats {
                    total_tests: 0,
                    vulnerabilities: 0,
                    tests: 0,
                    workflows: 1,
                },
                risk_levels: RiskLevels {
                    critical: 0,
                    high: 0,
                    medium: 0,
                    low: 0,
                },
                categories: Default::default(),
                timeline: Default::default(),
            }),
            run_tests_reply: Ok(Vec::new()),
            results_reply: Ok(Vec::new()),
            verify_delay: None,
            calls: AtomicUsize::new(0),
            last_payload: Mutex::new(None),
            last_token: Mutex::new(None),
        }
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests that reached the backend
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<TestPayload> {
        self.last_payload.lock().clone()
    }

    pub fn last_token(&self) -> Option<String> {
        self.last_token.lock().clone()
    }

    fn record(&self, token: Option<&str>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = token {
            *self.last_token.lock() = Some(token.to_string());
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn login(&self, _credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        self.record(None);
        self.login_reply.clone()
    }

    async fn signup(&self, _account: &NewAccount) -> Result<Account, ApiError> {
        self.record(None);
        self.signup_reply.clone()
    }

    async fn protected(&self, token: &str) -> Result<Identity, ApiError> {
        self.record(Some(token));
        if let Some(delay) = self.verify_delay {
            tokio::time::sleep(delay).await;
        }
        self.identity_reply.clone()
    }

    async fn dashboard(&self, token: &str) -> Result<DashboardData, ApiError> {
        self.record(Some(token));
        self.dashboard_reply.clone()
    }

    async fn run_tests(&self, token: &str, payload: &TestPayload) -> Result<Vec<TestResult>, ApiError> {
        self.record(Some(token));
        *self.last_payload.lock() = Some(payload.clone());
        self.run_tests_reply.clone()
    }

    async fn results(&self, token: &str) -> Result<Vec<TestResult>, ApiError> {
        self.record(Some(token));
        self.results_reply.clone()
    }
}
