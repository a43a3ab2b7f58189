//! Custom error types for apiprobe
//!
//! Provides structured error handling with context propagation
//! and user-friendly error messages.

use thiserror::Error;

/// Main error type for apiprobe operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Backend and transport errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Client-side validation errors (never reach the network)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Credential storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path}")]
    ReadError { path: String, source: std::io::Error },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration value: {field} - {reason}")]
    ValidationError { field: String, reason: String },

    #[error("Could not determine platform directory: {0}")]
    NoPlatformDir(String),
}

/// Errors talking to the test-runner backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The backend could not be reached at all
    #[error("Backend unreachable: {0}")]
    NetworkUnreachable(String),

    /// Token missing, expired or rejected (HTTP 401)
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Non-OK response carrying the backend's `detail`
    #[error("Backend rejected request ({status}): {detail}")]
    BackendRejected { status: u16, detail: String },

    /// Non-OK response from the run-tests endpoint
    #[error("Test submission failed: {0}")]
    TestSubmissionFailed(String),

    /// Response body did not match the expected schema
    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Client-side validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("GraphQL variables are not valid JSON: {0}")]
    MalformedVariables(String),

    #[error("Unknown {kind}: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Malformed {kind} '{input}', expected {expected}")]
    MalformedPair {
        kind: &'static str,
        input: String,
        expected: &'static str,
    },
}

/// Credential store errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read credential store {path}: {source}")]
    ReadError { path: String, source: std::io::Error },

    #[error("Failed to write credential store {path}: {source}")]
    WriteError { path: String, source: std::io::Error },

    #[error("Credential store {path} is corrupt: {reason}")]
    Corrupt { path: String, reason: String },
}

impl ApiError {
    /// Whether this error must tear down the session
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ApiError::AuthRejected(_))
    }
}

impl ClientError {
    /// Whether this error must tear down the session
    pub fn is_auth_rejected(&self) -> bool {
        matches!(self, ClientError::Api(e) if e.is_auth_rejected())
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Config(e) => format!("Configuration problem: {}", e.user_hint()),
            ClientError::Api(e) => e.user_hint(),
            ClientError::Validation(e) => e.user_hint(),
            ClientError::Storage(e) => format!("Credential storage issue: {}", e.user_hint()),
            ClientError::Io(e) => format!("File system issue: {}", e),
        }
    }
}

/// Trait for providing user-friendly hints
pub trait UserHint {
    fn user_hint(&self) -> String;
}

impl UserHint for ConfigError {
    fn user_hint(&self) -> String {
        match self {
            ConfigError::ReadError { path, .. } => {
                format!("Could not read '{}'. Check if the file exists and you have read permissions.", path)
            }
            ConfigError::ParseError(_) => {
                "The configuration file has invalid syntax. Check for TOML formatting errors.".into()
            }
            ConfigError::ValidationError { field, reason } => {
                format!("Invalid value for '{}': {}", field, reason)
            }
            ConfigError::NoPlatformDir(_) => {
                "Could not locate a home directory. Pass --config and set storage.credentials_path.".into()
            }
        }
    }
}

impl UserHint for ApiError {
    fn user_hint(&self) -> String {
        match self {
            ApiError::NetworkUnreachable(_) => {
                "Could not reach the backend. Check that the test server is running and the backend URL is correct.".into()
            }
            ApiError::AuthRejected(_) => {
                "Your session has expired or is invalid. Please log in again.".into()
            }
            ApiError::BackendRejected { detail, .. } => detail.clone(),
            ApiError::TestSubmissionFailed(detail) => detail.clone(),
            ApiError::InvalidResponse(_) => {
                "Invalid response from server: not the expected JSON.".into()
            }
            ApiError::Timeout(ms) => {
                format!("Request timed out after {}ms. The server may be slow or unresponsive.", ms)
            }
            ApiError::InvalidUrl(url) => {
                format!("'{}' is not a valid URL. Check the format.", url)
            }
        }
    }
}

impl UserHint for ValidationError {
    fn user_hint(&self) -> String {
        self.to_string()
    }
}

impl UserHint for StorageError {
    fn user_hint(&self) -> String {
        match self {
            StorageError::ReadError { path, .. } | StorageError::WriteError { path, .. } => {
                format!("Could not access '{}'. Check file permissions.", path)
            }
            StorageError::Corrupt { path, .. } => {
                format!("'{}' is corrupt. Run `apiprobe logout` to reset it.", path)
            }
        }
    }
}
