//! Application core module
//!
//! Coordinates the session, the backend and navigation between views.
//! Protected views are only entered once the session has been verified.

mod config;

pub use config::Config;

use std::fmt;
use std::sync::Arc;

use crate::error::{ApiError, ClientError, ValidationError};
use crate::http::{Account, Backend, Credentials, DashboardData, NewAccount, TestResult, User};
use crate::request::{build_payload, RequestSpec};
use crate::session::{CredentialStore, Session, SessionManager, SessionStatus};

/// Minimum password length accepted at sign-up
pub const MIN_PASSWORD_LEN: usize = 8;

/// Views of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Signup,
    Dashboard,
    TestConfig,
    Results,
}

impl Route {
    /// Whether entering the view needs a valid session
    pub fn is_protected(&self) -> bool {
        matches!(self, Route::Dashboard | Route::TestConfig | Route::Results)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Signup => "signup",
            Route::Dashboard => "dashboard",
            Route::TestConfig => "test-config",
            Route::Results => "results",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Main application
pub struct App {
    backend: Arc<dyn Backend>,
    session: SessionManager,
    route: Route,
}

impl App {
    pub fn new(config: &Config, backend: Arc<dyn Backend>, store: Box<dyn CredentialStore>) -> Self {
        let session = SessionManager::new(store, config.backend.verify_timeout());
        Self {
            backend,
            session,
            route: Route::Login,
        }
    }

    pub fn session(&self) -> &Session {
        self.session.session()
    }

    pub fn route(&self) -> Route {
        self.route
    }

    /// Session status, restoring and verifying stored credentials first
    pub async fn status(&mut self) -> SessionStatus {
        if self.session.status() == SessionStatus::Unverified {
            self.session.initialize(self.backend.as_ref()).await;
        }
        self.session.status()
    }

    /// Navigate to `route`
    ///
    /// Protected routes wait for verification to finish and redirect to
    /// [`Route::Login`] unless the session is valid.
    pub async fn enter(&mut self, route: Route) -> Route {
        let target = if route.is_protected() && self.status().await != SessionStatus::Valid {
            tracing::debug!(requested = %route, "Redirecting to login");
            Route::Login
        } else {
            route
        };

        self.route = target;
        target
    }

    /// Log in and open the dashboard
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Route, ClientError> {
        if username.trim().is_empty() {
            return Err(ValidationError::MissingField("Username").into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField("Password").into());
        }

        let credentials = Credentials {
            username: username.to_string(),
            password: password.to_string(),
        };
        let response = self.backend.login(&credentials).await?;
        tracing::debug!(
            token_type = response.token_type.as_deref().unwrap_or("bearer"),
            "Access token issued"
        );

        if response.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("login response has no access_token".into()).into());
        }

        let user = response.user.unwrap_or_else(|| User::new(username));
        if user.username.is_empty() {
            return Err(ApiError::InvalidResponse("login response user has no username".into()).into());
        }

        self.session.login(&response.access_token, Some(user))?;
        self.route = Route::Dashboard;
        Ok(self.route)
    }

    /// Register a new account; the user logs in afterwards
    ///
    /// Failures leave the client on [`Route::Signup`] so the form can be retried.
    pub async fn signup(&mut self, username: &str, email: &str, password: &str) -> Result<Account, ClientError> {
        self.enter(Route::Signup).await;
        validate_signup(username, email, password)?;

        let account = NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let created = self.backend.signup(&account).await?;

        tracing::info!(username = %created.username, "Account created");
        self.route = Route::Login;
        Ok(created)
    }

    pub async fn dashboard(&mut self) -> Result<DashboardData, ClientError> {
        let token = self.authorize(Route::Dashboard).await?;
        let backend = Arc::clone(&self.backend);
        let result = backend.dashboard(&token).await;
        result.map_err(|e| self.fail(e))
    }

    /// Previously stored results of the current user
    pub async fn results(&mut self) -> Result<Vec<TestResult>, ClientError> {
        let token = self.authorize(Route::Results).await?;
        let backend = Arc::clone(&self.backend);
        let result = backend.results(&token).await;
        result.map_err(|e| self.fail(e))
    }

    /// Validate `spec`, submit it and return the findings
    ///
    /// Validation runs before anything touches the network.
    pub async fn run_tests(&mut self, spec: &RequestSpec) -> Result<Vec<TestResult>, ClientError> {
        spec.validate()?;
        let payload = build_payload(spec)?;

        let token = self.authorize(Route::TestConfig).await?;
        tracing::info!(
            url = %payload.url,
            method = %payload.method,
            tests = payload.tests.len(),
            "Submitting tests"
        );

        let backend = Arc::clone(&self.backend);
        let result = backend.run_tests(&token, &payload).await;
        let results = result.map_err(|e| self.fail(e))?;

        tracing::info!(
            results = results.len(),
            vulnerable = results.iter().filter(|r| r.vulnerable).count(),
            "Tests completed"
        );
        self.route = Route::Results;
        Ok(results)
    }

    pub fn logout(&mut self) -> Route {
        self.route = self.session.logout();
        self.route
    }

    /// Enter a protected route and hand out the bearer token
    async fn authorize(&mut self, route: Route) -> Result<String, ClientError> {
        if self.enter(route).await != route {
            return Err(ApiError::AuthRejected("Not authenticated".into()).into());
        }

        match self.session.token() {
            Some(token) => Ok(token.to_string()),
            None => {
                self.logout();
                Err(ApiError::AuthRejected("Not authenticated".into()).into())
            }
        }
    }

    /// Authentication failures always end the session
    fn fail(&mut self, err: ApiError) -> ClientError {
        if err.is_auth_rejected() {
            tracing::warn!("Backend rejected the session: {}", err);
            self.logout();
        }
        err.into()
    }
}

/// Client-side sign-up checks, run before any request is sent
pub fn validate_signup(username: &str, email: &str, password: &str) -> Result<(), ValidationError> {
    if username.trim().is_empty() {
        return Err(ValidationError::MissingField("Username"));
    }
    if email.trim().is_empty() {
        return Err(ValidationError::MissingField("Email"));
    }
    if password.is_empty() {
        return Err(ValidationError::MissingField("Password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort { min: MIN_PASSWORD_LEN });
    }
    if !email.contains('@') {
        return Err(ValidationError::InvalidEmail(email.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::fake::FakeBackend;
    use crate::http::models::Confidence;
    use crate::http::LoginResponse;
    use crate::request::{ApiType, ProbeId};
    use crate::session::{MemoryCredentialStore, ACCESS_TOKEN_KEY, USER_KEY};

    fn app_with(backend: FakeBackend, store: MemoryCredentialStore) -> (App, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let app = App::new(&Config::default(), backend.clone(), Box::new(store));
        (app, backend)
    }

    fn logged_in_store() -> MemoryCredentialStore {
        MemoryCredentialStore::new()
            .with(ACCESS_TOKEN_KEY, "tok123")
            .with(USER_KEY, r#"{"username":"alice"}"#)
    }

    fn rest_spec() -> RequestSpec {
        RequestSpec::new().set_url("https://api.example.com/users")
    }

    #[test]
    fn test_route_protection() {
        assert!(!Route::Login.is_protected());
        assert!(!Route::Signup.is_protected());
        assert!(Route::Dashboard.is_protected());
        assert!(Route::TestConfig.is_protected());
        assert!(Route::Results.is_protected());
    }

    #[tokio::test]
    async fn test_login_scenario() {
        let (mut app, backend) = app_with(FakeBackend::new(), MemoryCredentialStore::new());

        let route = app.login("alice", "secret1").await.unwrap();

        assert_eq!(route, Route::Dashboard);
        assert_eq!(app.session().status(), SessionStatus::Valid);
        assert_eq!(app.session().token(), Some("tok123"));
        assert_eq!(app.session().user().unwrap().username, "alice");
        // Login does not need a verification round-trip
        assert_eq!(backend.calls(), 1);
        assert_eq!(app.enter(Route::Dashboard).await, Route::Dashboard);
    }

    #[tokio::test]
    async fn test_login_user_defaults_to_submitted_name() {
        let mut backend = FakeBackend::new();
        backend.login_reply = Ok(LoginResponse {
            access_token: "tok".into(),
            token_type: None,
            user: None,
        });
        let (mut app, _) = app_with(backend, MemoryCredentialStore::new());

        app.login("bob", "hunter22").await.unwrap();
        assert_eq!(app.session().user().unwrap().username, "bob");
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let (mut app, backend) = app_with(FakeBackend::new(), MemoryCredentialStore::new());

        let err = app.login("", "secret1").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::MissingField("Username"))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_wrong_credentials_keep_session_invalid() {
        let mut backend = FakeBackend::new();
        backend.login_reply = Err(ApiError::BackendRejected {
            status: 401,
            detail: "Incorrect username or password".into(),
        });
        let (mut app, _) = app_with(backend, MemoryCredentialStore::new());

        let err = app.login("alice", "wrong").await.unwrap_err();
        assert_eq!(err.user_message(), "Incorrect username or password");
        assert_ne!(app.session().status(), SessionStatus::Valid);
    }

    #[tokio::test]
    async fn test_protected_route_redirects_without_session() {
        let (mut app, backend) = app_with(FakeBackend::new(), MemoryCredentialStore::new());

        assert_eq!(app.enter(Route::Dashboard).await, Route::Login);
        assert_eq!(app.route(), Route::Login);
        assert_eq!(app.enter(Route::Signup).await, Route::Signup);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_enter_verifies_stored_session_once() {
        let (mut app, backend) = app_with(FakeBackend::new(), logged_in_store());

        assert_eq!(app.enter(Route::TestConfig).await, Route::TestConfig);
        assert_eq!(app.enter(Route::Results).await, Route::Results);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_tests_submits_payload() {
        let mut backend = FakeBackend::new();
        backend.run_tests_reply = Ok(vec![TestResult {
            test_name: "SQL Injection".into(),
            vulnerable: true,
            confidence: Confidence::Score(0.9),
            description: "Injectable".into(),
            payload: None,
            recommendation: "Parameterize".into(),
        }]);
        let (mut app, backend) = app_with(backend, logged_in_store());

        let results = app.run_tests(&rest_spec()).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(app.route(), Route::Results);
        assert_eq!(backend.last_token().as_deref(), Some("tok123"));
        let payload = backend.last_payload().unwrap();
        assert_eq!(payload.url, "https://api.example.com/users");
        assert_eq!(payload.tests, vec![ProbeId::Sql, ProbeId::Xss, ProbeId::Ssrf]);
    }

    #[tokio::test]
    async fn test_malformed_variables_never_reach_backend() {
        let (mut app, backend) = app_with(FakeBackend::new(), logged_in_store());
        let spec = rest_spec()
            .set_api_type(ApiType::GraphQl)
            .set_graphql_query("{ users { id } }")
            .set_graphql_variables("{not json");

        let err = app.run_tests(&spec).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(ValidationError::MalformedVariables(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_url_never_reaches_backend() {
        let (mut app, backend) = app_with(FakeBackend::new(), logged_in_store());

        let err = app.run_tests(&RequestSpec::new()).await.unwrap_err();

        assert!(matches!(err, ClientError::Validation(ValidationError::MissingField(_))));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_unauthorized_submission_clears_session() {
        let mut backend = FakeBackend::new();
        backend.run_tests_reply = Err(ApiError::AuthRejected("Not authenticated".into()));
        let (mut app, _) = app_with(backend, logged_in_store());

        let err = app.run_tests(&rest_spec()).await.unwrap_err();

        assert!(err.is_auth_rejected());
        assert_eq!(app.session().status(), SessionStatus::Invalid);
        assert!(app.session().token().is_none());
        assert_eq!(app.route(), Route::Login);
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_session() {
        let mut backend = FakeBackend::new();
        backend.run_tests_reply = Err(ApiError::TestSubmissionFailed("Target unreachable".into()));
        let (mut app, _) = app_with(backend, logged_in_store());

        let err = app.run_tests(&rest_spec()).await.unwrap_err();

        assert_eq!(err.user_message(), "Target unreachable");
        assert_eq!(app.session().status(), SessionStatus::Valid);
    }

    #[tokio::test]
    async fn test_dashboard_requires_session() {
        let (mut app, backend) = app_with(FakeBackend::new(), MemoryCredentialStore::new());

        let err = app.dashboard().await.unwrap_err();
        assert!(err.is_auth_rejected());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_results_expired_token_logs_out() {
        let mut backend = FakeBackend::new();
        backend.results_reply = Err(ApiError::AuthRejected("Could not validate credentials".into()));
        let (mut app, _) = app_with(backend, logged_in_store());

        assert!(app.results().await.unwrap_err().is_auth_rejected());
        assert_eq!(app.session().status(), SessionStatus::Invalid);
    }

    #[tokio::test]
    async fn test_signup_validation() {
        let (mut app, backend) = app_with(FakeBackend::new(), MemoryCredentialStore::new());

        let err = app.signup("alice", "alice@example.com", "short").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::PasswordTooShort { min: 8 })
        ));

        let err = app.signup("alice", "alice.example.com", "longenough").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::InvalidEmail(_))));
        assert_eq!(backend.calls(), 0);
        assert_eq!(app.route(), Route::Signup);

        let account = app.signup("alice", "alice@example.com", "longenough").await.unwrap();
        assert_eq!(account.username, "alice");
        assert_eq!(app.route(), Route::Login);
    }

    #[tokio::test]
    async fn test_logout() {
        let (mut app, _) = app_with(FakeBackend::new(), logged_in_store());
        assert_eq!(app.status().await, SessionStatus::Valid);

        assert_eq!(app.logout(), Route::Login);
        assert_eq!(app.status().await, SessionStatus::Invalid);
    }
}
