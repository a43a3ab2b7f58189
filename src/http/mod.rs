//! Backend transport
//!
//! Wire types for the test-runner API, the [`Backend`] seam the rest of the
//! client talks through, and its reqwest implementation.

mod client;
pub mod models;
mod response;

#[cfg(test)]
pub mod fake;

pub use client::BackendClient;
pub use models::{
    Account, ConfidenceLevel, Credentials, DashboardData, Identity, LoginResponse, NewAccount,
    TestResult, User,
};

use async_trait::async_trait;

use crate::error::ApiError;
use crate::request::TestPayload;

/// Endpoints of the test-runner backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/login`, form-encoded
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;

    /// `POST /api/signup`
    async fn signup(&self, account: &NewAccount) -> Result<Account, ApiError>;

    /// `GET /api/protected`, used to verify a token
    async fn protected(&self, token: &str) -> Result<Identity, ApiError>;

    /// `GET /api/dashboard`
    async fn dashboard(&self, token: &str) -> Result<DashboardData, ApiError>;

    /// `POST /api/run-tests`
    async fn run_tests(&self, token: &str, payload: &TestPayload) -> Result<Vec<TestResult>, ApiError>;

    /// `GET /api/results`
    async fn results(&self, token: &str) -> Result<Vec<TestResult>, ApiError>;
}
