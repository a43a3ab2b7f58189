//! Wire types exchanged with the test-runner backend
//!
//! Everything here is validated at the boundary: a response that does not
//! deserialize into these shapes is rejected as an invalid response instead
//! of being passed on.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Identity stored alongside the access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
            id: None,
        }
    }
}

/// Form fields of `POST /api/login`
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Response of `POST /api/login`
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Body of `POST /api/signup`
#[derive(Debug, Clone, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Response of `POST /api/signup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    pub email: String,
}

/// Response of `GET /api/protected`
#[derive(Debug, Clone, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body returned with non-OK statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// `detail` is a string for handled errors and a list for schema errors
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.get("msg")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| item.to_string())
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

/// Qualitative confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ConfidenceLevel {
    /// Bucket a score using the backend's risk thresholds
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            ConfidenceLevel::Critical
        } else if score >= 0.7 {
            ConfidenceLevel::High
        } else if score >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Critical => "critical",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "low" => Some(ConfidenceLevel::Low),
            "medium" => Some(ConfidenceLevel::Medium),
            "high" => Some(ConfidenceLevel::High),
            "critical" => Some(ConfidenceLevel::Critical),
            _ => None,
        }
    }
}

/// Confidence attached to a result, as a score in `[0, 1]` or a label
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Confidence {
    Score(f64),
    Level(ConfidenceLevel),
}

impl Confidence {
    pub fn level(&self) -> ConfidenceLevel {
        match self {
            Confidence::Score(score) => ConfidenceLevel::from_score(*score),
            Confidence::Level(level) => *level,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::Score(score) => write!(f, "{:.2} ({})", score, self.level().as_str()),
            Confidence::Level(level) => f.write_str(level.as_str()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfidence {
    Score(f64),
    Label(String),
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawConfidence::deserialize(deserializer)? {
            RawConfidence::Score(score) if (0.0..=1.0).contains(&score) => {
                Ok(Confidence::Score(score))
            }
            RawConfidence::Score(score) => Err(serde::de::Error::custom(format!(
                "confidence {} outside [0, 1]",
                score
            ))),
            RawConfidence::Label(label) => ConfidenceLevel::from_label(&label)
                .map(Confidence::Level)
                .ok_or_else(|| {
                    serde::de::Error::custom(format!("unknown confidence label '{}'", label))
                }),
        }
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Confidence::Score(score) => serializer.serialize_f64(*score),
            Confidence::Level(level) => level.serialize(serializer),
        }
    }
}

/// One finding returned by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub vulnerable: bool,
    pub confidence: Confidence,
    pub description: String,
    #[serde(default)]
    pub payload: Option<String>,
    pub recommendation: String,
}

/// Response of `GET /api/dashboard`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardData {
    pub stats: DashboardStats,
    pub risk_levels: RiskLevels,
    #[serde(default)]
    pub categories: BTreeMap<String, u64>,
    #[serde(default)]
    pub timeline: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_tests: u64,
    pub vulnerabilities: u64,
    pub tests: u64,
    pub workflows: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_with_numeric_confidence() {
        let result: TestResult = serde_json::from_value(json!({
            "test_name": "SQL Injection",
            "vulnerable": true,
            "confidence": 0.95,
            "description": "Error-based injection",
            "payload": "' OR 1=1--",
            "recommendation": "Use parameterized queries"
        }))
        .unwrap();

        assert_eq!(result.confidence.level(), ConfidenceLevel::Critical);
        assert_eq!(result.payload.as_deref(), Some("' OR 1=1--"));
    }

    #[test]
    fn test_result_with_label_and_no_payload() {
        let result: TestResult = serde_json::from_value(json!({
            "test_name": "XSS",
            "vulnerable": false,
            "confidence": "Medium",
            "description": "No reflection",
            "recommendation": "Keep encoding output"
        }))
        .unwrap();

        assert_eq!(result.confidence, Confidence::Level(ConfidenceLevel::Medium));
        assert!(result.payload.is_none());
    }

    #[test]
    fn test_result_rejects_bad_shapes() {
        let out_of_range = json!({
            "test_name": "XSS", "vulnerable": false, "confidence": 4.2,
            "description": "", "recommendation": ""
        });
        assert!(serde_json::from_value::<TestResult>(out_of_range).is_err());

        let missing = json!({"test_name": "XSS", "vulnerable": "yes"});
        assert!(serde_json::from_value::<TestResult>(missing).is_err());
    }

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(ConfidenceLevel::from_score(0.9), ConfidenceLevel::Critical);
        assert_eq!(ConfidenceLevel::from_score(0.7), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_score(0.5), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(0.49), ConfidenceLevel::Low);
    }

    #[test]
    fn test_error_body_messages() {
        let plain: ErrorBody = serde_json::from_value(json!({"detail": "Invalid token"})).unwrap();
        assert_eq!(plain.message(), "Invalid token");

        let schema: ErrorBody = serde_json::from_value(json!({
            "detail": [{"loc": ["body", "url"], "msg": "field required"}]
        }))
        .unwrap();
        assert_eq!(schema.message(), "field required");
    }

    #[test]
    fn test_dashboard_shape() {
        let data: DashboardData = serde_json::from_value(json!({
            "stats": {"total_tests": 4, "vulnerabilities": 1, "tests": 4, "workflows": 1},
            "risk_levels": {"critical": 1, "high": 0, "medium": 0, "low": 0},
            "categories": {"SQL Injection": 1},
            "timeline": {"July": 1}
        }))
        .unwrap();
        assert_eq!(data.stats.total_tests, 4);
        assert_eq!(data.categories["SQL Injection"], 1);
    }
}
