//! Request specification builder
//!
//! Holds the in-progress description of the API call under test and
//! serializes it into the payload the backend's run-tests endpoint expects.

mod file;
mod payload;
mod spec;

pub use file::{load_spec, save_spec};
pub use payload::{build_payload, TestPayload};
pub use spec::RequestSpec;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Protocol of the API under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ApiType {
    #[default]
    #[serde(rename = "REST")]
    Rest,
    #[serde(rename = "SOAP")]
    Soap,
    #[serde(rename = "GraphQL")]
    GraphQl,
}

impl ApiType {
    pub fn name(&self) -> &'static str {
        match self {
            ApiType::Rest => "REST",
            ApiType::Soap => "SOAP",
            ApiType::GraphQl => "GraphQL",
        }
    }

    /// Content-Type every spec of this protocol carries
    pub fn content_type(&self) -> &'static str {
        match self {
            ApiType::Soap => "text/xml",
            ApiType::Rest | ApiType::GraphQl => "application/json",
        }
    }
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApiType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rest" => Ok(ApiType::Rest),
            "soap" => Ok(ApiType::Soap),
            "graphql" | "gql" => Ok(ApiType::GraphQl),
            _ => Err(ValidationError::UnknownValue {
                kind: "API type",
                value: s.to_string(),
            }),
        }
    }
}

/// HTTP method of the call under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    pub fn all() -> &'static [HttpMethod] {
        &[
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Patch,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpMethod::all()
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "HTTP method",
                value: s.to_string(),
            })
    }
}

/// How the target API is authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthMethod {
    #[default]
    None,
    BearerToken,
    ApiKey,
    /// Token is forwarded as typed, without base64 encoding
    BasicAuth,
}

impl AuthMethod {
    pub fn name(&self) -> &'static str {
        match self {
            AuthMethod::None => "None",
            AuthMethod::BearerToken => "Bearer Token",
            AuthMethod::ApiKey => "API Key",
            AuthMethod::BasicAuth => "Basic Auth",
        }
    }

    /// Header injected into the target request for this method
    pub fn header(&self, token: &str) -> Option<(&'static str, String)> {
        match self {
            AuthMethod::None => None,
            AuthMethod::BearerToken => Some(("Authorization", format!("Bearer {}", token))),
            AuthMethod::ApiKey => Some(("API-Key", token.to_string())),
            AuthMethod::BasicAuth => Some(("Authorization", token.to_string())),
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AuthMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "none" => Ok(AuthMethod::None),
            "bearer" | "bearertoken" => Ok(AuthMethod::BearerToken),
            "apikey" => Ok(AuthMethod::ApiKey),
            "basic" | "basicauth" => Ok(AuthMethod::BasicAuth),
            _ => Err(ValidationError::UnknownValue {
                kind: "auth method",
                value: s.to_string(),
            }),
        }
    }
}

/// A security probe the backend can run
///
/// Declaration order is the canonical order in which probes are serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeId {
    Sql,
    Xss,
    Ssrf,
    Xxe,
    RateLimit,
    Dos,
    Csrf,
    Jwt,
}

impl ProbeId {
    pub fn all() -> &'static [ProbeId] {
        &[
            ProbeId::Sql,
            ProbeId::Xss,
            ProbeId::Ssrf,
            ProbeId::Xxe,
            ProbeId::RateLimit,
            ProbeId::Dos,
            ProbeId::Csrf,
            ProbeId::Jwt,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeId::Sql => "sql",
            ProbeId::Xss => "xss",
            ProbeId::Ssrf => "ssrf",
            ProbeId::Xxe => "xxe",
            ProbeId::RateLimit => "rate_limit",
            ProbeId::Dos => "dos",
            ProbeId::Csrf => "csrf",
            ProbeId::Jwt => "jwt",
        }
    }
}

impl fmt::Display for ProbeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProbeId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase().replace('-', "_");
        ProbeId::all()
            .iter()
            .copied()
            .find(|p| p.as_str() == lowered)
            .ok_or_else(|| ValidationError::UnknownValue {
                kind: "probe",
                value: s.to_string(),
            })
    }
}

/// A single header or query parameter row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub name: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Rows with an empty name or value are left out of the payload
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.value.is_empty()
    }

    /// Parse a `Name: value` header argument
    pub fn parse_header(input: &str) -> Result<Self, ValidationError> {
        Self::split(input, ':', "header", "'Name: value'")
    }

    /// Parse a `name=value` query parameter argument
    pub fn parse_param(input: &str) -> Result<Self, ValidationError> {
        Self::split(input, '=', "query parameter", "'name=value'")
    }

    fn split(
        input: &str,
        sep: char,
        kind: &'static str,
        expected: &'static str,
    ) -> Result<Self, ValidationError> {
        match input.split_once(sep) {
            Some((name, value)) if !name.trim().is_empty() => {
                Ok(Self::new(name.trim(), value.trim()))
            }
            _ => Err(ValidationError::MalformedPair {
                kind,
                input: input.to_string(),
                expected,
            }),
        }
    }
}
