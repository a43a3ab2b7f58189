//! Backend response handling

use serde::de::DeserializeOwned;

use super::models::ErrorBody;
use crate::error::ApiError;

/// Detail the backend sends when a request carries no usable token
const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Raw backend response
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Get body as string
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// The backend's `detail` message, if the body carries one
    pub fn detail(&self) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(&self.body)
            .ok()
            .map(|e| e.message())
            .filter(|m| !m.is_empty())
    }

    /// Decode a successful body, or map the failure status to an error
    ///
    /// 401 always becomes `AuthRejected`, as does any non-OK status whose
    /// `detail` is "Not authenticated" (bearer guards answer 403). Other
    /// non-OK statuses carry the backend's `detail` (or `fallback`) in
    /// `BackendRejected`.
    pub fn decode<T: DeserializeOwned>(&self, fallback: &str) -> Result<T, ApiError> {
        if self.is_unauthorized() {
            return Err(ApiError::AuthRejected(
                self.detail().unwrap_or_else(|| NOT_AUTHENTICATED.to_string()),
            ));
        }

        if !self.is_success() {
            let detail = self.detail();
            if detail.as_deref() == Some(NOT_AUTHENTICATED) {
                return Err(ApiError::AuthRejected(NOT_AUTHENTICATED.to_string()));
            }
            return Err(ApiError::BackendRejected {
                status: self.status,
                detail: detail.unwrap_or_else(|| fallback.to_string()),
            });
        }

        serde_json::from_slice(&self.body).map_err(|e| {
            tracing::debug!(status = self.status, body = %self.body_text(), "Unexpected response body");
            ApiError::InvalidResponse(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_decode_success() {
        let response = Response::new(200, r#"{"username":"alice"}"#);
        let value: Value = response.decode("Request failed").unwrap();
        assert_eq!(value["username"], "alice");
    }

    #[test]
    fn test_decode_unauthorized() {
        let response = Response::new(401, r#"{"detail":"Could not validate credentials"}"#);
        let err = response.decode::<Value>("Request failed").unwrap_err();
        assert!(matches!(err, ApiError::AuthRejected(ref d) if d == "Could not validate credentials"));
    }

    #[test]
    fn test_decode_not_authenticated_on_forbidden() {
        let response = Response::new(403, r#"{"detail":"Not authenticated"}"#);
        let err = response.decode::<Value>("Failed to run tests").unwrap_err();
        assert!(err.is_auth_rejected());
        assert_eq!(err, ApiError::AuthRejected("Not authenticated".to_string()));
    }

    #[test]
    fn test_decode_forbidden_other_detail_is_rejected() {
        let response = Response::new(403, r#"{"detail":"Plan limit reached"}"#);
        let err = response.decode::<Value>("Failed to run tests").unwrap_err();
        assert!(!err.is_auth_rejected());
        assert!(matches!(err, ApiError::BackendRejected { status: 403, .. }));
    }

    #[test]
    fn test_decode_rejected_uses_detail_or_fallback() {
        let response = Response::new(400, r#"{"detail":"Username already registered"}"#);
        match response.decode::<Value>("Request failed").unwrap_err() {
            ApiError::BackendRejected { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "Username already registered");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let response = Response::new(502, "<html>Bad Gateway</html>");
        match response.decode::<Value>("Request failed").unwrap_err() {
            ApiError::BackendRejected { detail, .. } => assert_eq!(detail, "Request failed"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_invalid_json() {
        let response = Response::new(200, "not json");
        assert!(matches!(
            response.decode::<Value>("Request failed"),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
