//! The in-progress request specification and its field-level transitions

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::{ApiType, AuthMethod, HttpMethod, KeyValue, ProbeId};
use crate::error::ValidationError;

/// Description of the API call under test, before serialization
///
/// Every mutation consumes the current spec and returns the next one, so the
/// derived-state rules (Content-Type per protocol, POST for GraphQL) have a
/// single place where they are applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSpec {
    api_type: ApiType,
    url: String,
    method: HttpMethod,
    headers: Vec<KeyValue>,
    query_params: Vec<KeyValue>,
    body: String,
    graphql_query: String,
    graphql_variables: String,
    auth_method: AuthMethod,
    auth_token: String,
    selected_tests: BTreeSet<ProbeId>,
}

impl Default for RequestSpec {
    fn default() -> Self {
        Self {
            api_type: ApiType::Rest,
            url: String::new(),
            method: HttpMethod::Get,
            headers: vec![KeyValue::new("Content-Type", "application/json")],
            query_params: vec![KeyValue::default()],
            body: String::new(),
            graphql_query: String::new(),
            graphql_variables: "{}".to_string(),
            auth_method: AuthMethod::None,
            auth_token: String::new(),
            selected_tests: [ProbeId::Sql, ProbeId::Xss, ProbeId::Ssrf].into_iter().collect(),
        }
    }
}

impl RequestSpec {
    /// Create the default form state
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-apply the protocol rules, e.g. after deserializing a spec file
    pub fn normalized(self) -> Self {
        let api_type = self.api_type;
        self.set_api_type(api_type)
    }

    // Accessors

    pub fn api_type(&self) -> ApiType {
        self.api_type
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &[KeyValue] {
        &self.headers
    }

    pub fn query_params(&self) -> &[KeyValue] {
        &self.query_params
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn graphql_query(&self) -> &str {
        &self.graphql_query
    }

    pub fn graphql_variables(&self) -> &str {
        &self.graphql_variables
    }

    pub fn auth_method(&self) -> AuthMethod {
        self.auth_method
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn selected_tests(&self) -> &BTreeSet<ProbeId> {
        &self.selected_tests
    }

    /// Look up the first header with this exact name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.value.as_str())
    }

    // Transitions

    /// Switch protocol and re-derive Content-Type (and method for GraphQL)
    pub fn set_api_type(mut self, api_type: ApiType) -> Self {
        self.api_type = api_type;
        if api_type == ApiType::GraphQl {
            self.method = HttpMethod::Post;
        }
        self.upsert_header("Content-Type", api_type.content_type())
    }

    pub fn set_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the HTTP method; GraphQL specs stay on POST
    pub fn set_method(mut self, method: HttpMethod) -> Self {
        if self.api_type == ApiType::GraphQl && method != HttpMethod::Post {
            tracing::debug!(%method, "Ignoring method change for GraphQL spec");
            return self;
        }
        self.method = method;
        self
    }

    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn set_graphql_query(mut self, query: impl Into<String>) -> Self {
        self.graphql_query = query.into();
        self
    }

    pub fn set_graphql_variables(mut self, variables: impl Into<String>) -> Self {
        self.graphql_variables = variables.into();
        self
    }

    pub fn set_auth_method(mut self, method: AuthMethod) -> Self {
        self.auth_method = method;
        self
    }

    pub fn set_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    /// Replace the value of the first header named `name`, or append one
    pub fn upsert_header(mut self, name: &str, value: &str) -> Self {
        match self.headers.iter_mut().find(|h| h.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => self.headers.push(KeyValue::new(name, value)),
        }
        self
    }

    /// Append an empty header row
    pub fn add_header(mut self) -> Self {
        self.headers.push(KeyValue::default());
        self
    }

    /// Overwrite the header row at `index`; out of range is a no-op
    pub fn set_header(mut self, index: usize, entry: KeyValue) -> Self {
        if let Some(row) = self.headers.get_mut(index) {
            *row = entry;
        }
        self
    }

    /// Remove the header row at `index`; out of range is a no-op
    pub fn remove_header(mut self, index: usize) -> Self {
        if index < self.headers.len() {
            self.headers.remove(index);
        }
        self
    }

    /// Append an empty query parameter row
    pub fn add_query_param(mut self) -> Self {
        self.query_params.push(KeyValue::default());
        self
    }

    /// Append a filled query parameter row
    pub fn push_query_param(mut self, entry: KeyValue) -> Self {
        self.query_params.push(entry);
        self
    }

    /// Overwrite the query parameter row at `index`; out of range is a no-op
    pub fn set_query_param(mut self, index: usize, entry: KeyValue) -> Self {
        if let Some(row) = self.query_params.get_mut(index) {
            *row = entry;
        }
        self
    }

    /// Remove the query parameter row at `index`; out of range is a no-op
    pub fn remove_query_param(mut self, index: usize) -> Self {
        if index < self.query_params.len() {
            self.query_params.remove(index);
        }
        self
    }

    /// Flip whether `probe` is selected
    pub fn toggle_test(mut self, probe: ProbeId) -> Self {
        if !self.selected_tests.remove(&probe) {
            self.selected_tests.insert(probe);
        }
        self
    }

    /// Replace the whole probe selection
    pub fn with_tests(mut self, probes: impl IntoIterator<Item = ProbeId>) -> Self {
        self.selected_tests = probes.into_iter().collect();
        self
    }

    /// Check the fields a submission cannot go without
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::MissingField("API URL"));
        }
        if self.api_type == ApiType::GraphQl && self.graphql_query.trim().is_empty() {
            return Err(ValidationError::MissingField("GraphQL query"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_form_state() {
        let spec = RequestSpec::new();
        assert_eq!(spec.api_type(), ApiType::Rest);
        assert_eq!(spec.method(), HttpMethod::Get);
        assert_eq!(spec.header("Content-Type"), Some("application/json"));
        assert_eq!(spec.query_params().len(), 1);
        assert_eq!(spec.graphql_variables(), "{}");
        assert_eq!(
            spec.selected_tests().iter().copied().collect::<Vec<_>>(),
            vec![ProbeId::Sql, ProbeId::Xss, ProbeId::Ssrf]
        );
    }

    #[test]
    fn test_soap_forces_text_xml() {
        let spec = RequestSpec::new().set_api_type(ApiType::Soap);
        assert_eq!(spec.header("Content-Type"), Some("text/xml"));
        assert_eq!(spec.headers().len(), 1);
    }

    #[test]
    fn test_graphql_forces_post_and_json() {
        let spec = RequestSpec::new()
            .set_method(HttpMethod::Delete)
            .set_api_type(ApiType::Soap)
            .set_api_type(ApiType::GraphQl);
        assert_eq!(spec.method(), HttpMethod::Post);
        assert_eq!(spec.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_graphql_rejects_method_change() {
        let spec = RequestSpec::new()
            .set_api_type(ApiType::GraphQl)
            .set_method(HttpMethod::Get);
        assert_eq!(spec.method(), HttpMethod::Post);
    }

    #[test]
    fn test_rule_reapplied_over_manual_edit() {
        let spec = RequestSpec::new()
            .upsert_header("Content-Type", "application/xml")
            .set_api_type(ApiType::Rest);
        assert_eq!(spec.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_content_type_restored_after_removal() {
        let spec = RequestSpec::new()
            .remove_header(0)
            .set_api_type(ApiType::Soap);
        assert_eq!(spec.headers(), &[KeyValue::new("Content-Type", "text/xml")]);
    }

    #[test]
    fn test_upsert_twice_keeps_one_entry() {
        let spec = RequestSpec::new()
            .upsert_header("X-Api", "one")
            .upsert_header("X-Api", "two");
        let matches: Vec<_> = spec.headers().iter().filter(|h| h.name == "X-Api").collect();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].value, "two");
    }

    #[test]
    fn test_upsert_replaces_first_match_only() {
        let spec = RequestSpec::new()
            .add_header()
            .set_header(1, KeyValue::new("X-Dup", "a"))
            .add_header()
            .set_header(2, KeyValue::new("X-Dup", "b"))
            .upsert_header("X-Dup", "c");
        assert_eq!(spec.headers()[1].value, "c");
        assert_eq!(spec.headers()[2].value, "b");
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let spec = RequestSpec::new();
        let same = spec.clone().remove_header(7).remove_query_param(3);
        assert_eq!(spec, same);
    }

    #[test]
    fn test_add_and_remove_rows() {
        let spec = RequestSpec::new()
            .add_query_param()
            .set_query_param(1, KeyValue::new("page", "1"))
            .remove_query_param(0);
        assert_eq!(spec.query_params(), &[KeyValue::new("page", "1")]);

        let spec = spec.add_header().remove_header(0);
        assert_eq!(spec.headers(), &[KeyValue::default()]);
    }

    #[test]
    fn test_toggle_test() {
        let spec = RequestSpec::new().toggle_test(ProbeId::Sql).toggle_test(ProbeId::Jwt);
        assert!(!spec.selected_tests().contains(&ProbeId::Sql));
        assert!(spec.selected_tests().contains(&ProbeId::Jwt));

        let spec = spec.toggle_test(ProbeId::Jwt);
        assert!(!spec.selected_tests().contains(&ProbeId::Jwt));
    }

    #[test]
    fn test_validate_required_fields() {
        assert_eq!(
            RequestSpec::new().validate(),
            Err(ValidationError::MissingField("API URL"))
        );

        let spec = RequestSpec::new()
            .set_url("https://x/graphql")
            .set_api_type(ApiType::GraphQl);
        assert_eq!(
            spec.validate(),
            Err(ValidationError::MissingField("GraphQL query"))
        );

        let spec = spec.set_graphql_query("{ me { id } }");
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_normalized_fixes_inconsistent_file_state() {
        let spec: RequestSpec = serde_json::from_str(
            r#"{"api_type":"GraphQL","method":"GET","headers":[]}"#,
        )
        .unwrap();
        let spec = spec.normalized();
        assert_eq!(spec.method(), HttpMethod::Post);
        assert_eq!(spec.header("Content-Type"), Some("application/json"));
    }
}
