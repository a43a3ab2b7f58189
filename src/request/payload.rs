//! Serialization of a request spec into the run-tests wire payload

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ApiType, AuthMethod, HttpMethod, KeyValue, ProbeId, RequestSpec};
use crate::error::ValidationError;

/// Body of `POST /api/run-tests`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPayload {
    pub api_type: ApiType,
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub body: String,
    pub tests: Vec<ProbeId>,
}

impl TestPayload {
    /// Compact JSON encoding, stable for an unchanged payload
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build the wire payload for `spec`
///
/// Pure: the same spec always yields the same payload. Header and parameter
/// rows missing a name or value are dropped and later duplicates win.
pub fn build_payload(spec: &RequestSpec) -> Result<TestPayload, ValidationError> {
    let mut headers = fold_entries(spec.headers());

    if let Some((name, value)) = spec.auth_method().header(spec.auth_token()) {
        if spec.auth_method() == AuthMethod::BasicAuth {
            tracing::warn!("Basic Auth credentials are forwarded without base64 encoding");
        }
        headers.insert(name.to_string(), value);
    }

    let (method, params, body) = match spec.api_type() {
        ApiType::GraphQl => (
            HttpMethod::Post,
            BTreeMap::new(),
            graphql_body(spec.graphql_query(), spec.graphql_variables())?,
        ),
        ApiType::Rest | ApiType::Soap => (
            spec.method(),
            fold_entries(spec.query_params()),
            spec.body().to_string(),
        ),
    };

    Ok(TestPayload {
        api_type: spec.api_type(),
        url: spec.url().to_string(),
        method,
        headers,
        params,
        body,
        tests: spec.selected_tests().iter().copied().collect(),
    })
}

fn fold_entries(entries: &[KeyValue]) -> BTreeMap<String, String> {
    entries
        .iter()
        .filter(|e| e.is_complete())
        .map(|e| (e.name.clone(), e.value.clone()))
        .collect()
}

fn graphql_body(query: &str, variables: &str) -> Result<String, ValidationError> {
    let variables = if variables.trim().is_empty() { "{}" } else { variables };
    let variables: serde_json::Value = serde_json::from_str(variables)
        .map_err(|e| ValidationError::MalformedVariables(e.to_string()))?;

    let body = serde_json::json!({
        "query": query,
        "variables": variables,
    });
    Ok(body.to_string())
}
