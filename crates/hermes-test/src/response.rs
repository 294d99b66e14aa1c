//! Test response wrapper.

use crate::error::TestError;
use hermes_core::ResponseEnvelope;
use http::StatusCode;
use serde::de::DeserializeOwned;
use std::fmt;

/// A completed response with helper methods for assertions.
pub struct TestResponse {
    status: StatusCode,
    envelope: ResponseEnvelope,
}

impl TestResponse {
    /// Wraps an envelope delivered to the platform callback.
    ///
    /// # Panics
    ///
    /// Panics if the status code is outside `100..=999`.
    pub fn new(envelope: ResponseEnvelope) -> Self {
        let status = StatusCode::from_u16(envelope.status_code).expect("valid status code");
        Self { status, envelope }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is successful (2xx).
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the status is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Returns true if the status is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Gets a header value, matching the name case-insensitively.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.envelope
            .headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the `Set-Cookie` values.
    #[must_use]
    pub fn cookies(&self) -> &[String] {
        self.envelope.cookies()
    }

    /// Returns the underlying envelope.
    #[must_use]
    pub fn envelope(&self) -> &ResponseEnvelope {
        &self.envelope
    }

    /// Returns the raw body.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.envelope.body
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        serde_json::from_str(&self.envelope.body).map_err(TestError::Json)
    }

    /// Deserializes the body as a JSON Value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// Returns the `error` field of a failure body.
    pub fn error_message(&self) -> Result<String, TestError> {
        let body = self.json_value()?;
        body.get("error")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TestError::BodyRead(format!("no error field in {body}")))
    }

    // Assertion methods

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {} with body {}",
            expected, self.status, self.envelope.body
        );
        self
    }

    /// Asserts that the status code equals the expected u16 value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "Expected status {}, got {} with body {}",
            expected,
            self.status.as_u16(),
            self.envelope.body
        );
        self
    }

    /// Asserts that the response is successful (2xx).
    ///
    /// # Panics
    ///
    /// Panics if the status is not 2xx.
    pub fn assert_success(&self) -> &Self {
        assert!(
            self.is_success(),
            "Expected success status, got {} with body {}",
            self.status,
            self.envelope.body
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let expected = expected.as_ref();
        let actual = self
            .header(name)
            .unwrap_or_else(|| panic!("Header '{name}' not found"));
        assert_eq!(
            actual, expected,
            "Header '{name}': expected '{expected}', got '{actual}'"
        );
        self
    }

    /// Asserts that a cookie with the exact `Set-Cookie` value was set.
    ///
    /// # Panics
    ///
    /// Panics if no such cookie was set.
    pub fn assert_cookie(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        assert!(
            self.cookies().iter().any(|cookie| cookie == expected),
            "Cookie '{expected}' not found in {:?}",
            self.cookies()
        );
        self
    }

    /// Asserts that the body contains the expected substring.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't contain the substring.
    pub fn assert_body_contains(&self, expected: impl AsRef<str>) -> &Self {
        let expected = expected.as_ref();
        assert!(
            self.envelope.body.contains(expected),
            "Body should contain '{expected}', got: {}",
            self.envelope.body
        );
        self
    }

    /// Asserts that the JSON body matches the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the JSON doesn't match.
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        let actual: serde_json::Value = self.json().expect("Body should be valid JSON");
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts that a JSON field exists and equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the field doesn't exist or doesn't match.
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &serde_json::Value) -> &Self {
        let path = path.as_ref();
        let json: serde_json::Value = self.json().expect("Body should be valid JSON");
        let actual = json_path(&json, path)
            .unwrap_or_else(|| panic!("JSON path '{path}' not found in: {json:?}"));
        assert_eq!(
            actual, expected,
            "JSON field '{path}': expected {expected:?}, got {actual:?}"
        );
        self
    }

    /// Asserts a failure with the given status and `{"error": message}` body.
    ///
    /// # Panics
    ///
    /// Panics if the status or message doesn't match.
    pub fn assert_error(&self, status: u16, message: impl AsRef<str>) -> &Self {
        self.assert_status_code(status);
        let actual = self.error_message().expect("Body should be an error body");
        assert_eq!(actual, message.as_ref(), "Error message mismatch");
        self
    }
}

impl From<ResponseEnvelope> for TestResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        Self::new(envelope)
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.envelope.headers)
            .field("cookies", &self.cookies())
            .field("body", &self.envelope.body)
            .finish()
    }
}

/// Dotted path accessor, with numeric segments indexing arrays.
fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(segment)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn create_response(status: u16, body: &str) -> TestResponse {
        let headers = BTreeMap::from([(
            "Access-Control-Allow-Origin".to_string(),
            "*".to_string(),
        )]);
        let cookies = BTreeMap::from([("Set-Cookie".to_string(), vec!["sid=1".to_string()])]);
        TestResponse::new(ResponseEnvelope {
            status_code: status,
            headers,
            multi_value_headers: Some(cookies),
            body: body.to_string(),
        })
    }

    #[test]
    fn test_status() {
        let response = create_response(200, "{}");
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.is_success());
        assert!(create_response(404, "{}").is_client_error());
        assert!(create_response(502, "{}").is_server_error());
    }

    #[test]
    fn test_header_case_insensitive() {
        let response = create_response(200, "{}");
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        response.assert_header("Access-Control-Allow-Origin", "*");
    }

    #[test]
    fn test_cookies() {
        let response = create_response(200, "{}");
        assert_eq!(response.cookies(), ["sid=1".to_string()]);
        response.assert_cookie("sid=1");
    }

    #[test]
    fn test_json_field() {
        let response = create_response(200, r#"{"user":{"tags":["a","b"]}}"#);
        response.assert_json_field("user.tags.1", &json!("b"));
        response.assert_body_contains("tags");
    }

    #[test]
    fn test_error_body() {
        let response = create_response(500, r#"{"error":"boom"}"#);
        assert_eq!(response.error_message().unwrap(), "boom");
        response.assert_error(500, "boom");

        let response = create_response(200, r#"{"ok":true}"#);
        assert!(matches!(response.error_message(), Err(TestError::BodyRead(_))));
    }

    #[test]
    #[should_panic(expected = "Expected status 201")]
    fn test_assert_status_panics() {
        create_response(200, "{}").assert_status(StatusCode::CREATED);
    }
}
