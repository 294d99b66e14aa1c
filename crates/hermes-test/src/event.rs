//! Platform event building.

use crate::error::TestError;
use serde::Serialize;
use serde_json::{json, Map, Value};

/// An event plus platform context, ready for `HandlerFn::call`.
#[derive(Debug, Clone, PartialEq)]
pub struct TestEvent {
    /// The API-Gateway-shaped event.
    pub event: Value,
    /// The platform context.
    pub context: Value,
}

impl TestEvent {
    /// Creates a GET event.
    pub fn get(path: impl AsRef<str>) -> TestEventBuilder {
        TestEventBuilder::new("GET", path)
    }

    /// Creates a POST event.
    pub fn post(path: impl AsRef<str>) -> TestEventBuilder {
        TestEventBuilder::new("POST", path)
    }

    /// Creates a PUT event.
    pub fn put(path: impl AsRef<str>) -> TestEventBuilder {
        TestEventBuilder::new("PUT", path)
    }

    /// Creates a PATCH event.
    pub fn patch(path: impl AsRef<str>) -> TestEventBuilder {
        TestEventBuilder::new("PATCH", path)
    }

    /// Creates a DELETE event.
    pub fn delete(path: impl AsRef<str>) -> TestEventBuilder {
        TestEventBuilder::new("DELETE", path)
    }

    /// Creates a queue or stream event carrying `Records`.
    pub fn records<I, T>(records: I) -> Result<Self, TestError>
    where
        I: IntoIterator<Item = T>,
        T: Serialize,
    {
        let records = records
            .into_iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            event: json!({ "Records": records }),
            context: json!({}),
        })
    }

    /// Splits into `(event, context)`.
    pub fn into_parts(self) -> (Value, Value) {
        (self.event, self.context)
    }
}

/// Builder for HTTP-style events.
#[must_use]
#[derive(Debug, Clone)]
pub struct TestEventBuilder {
    method: &'static str,
    path: String,
    headers: Map<String, Value>,
    path_parameters: Map<String, Value>,
    query: Map<String, Value>,
    body: Option<String>,
    context: Map<String, Value>,
}

impl TestEventBuilder {
    /// Creates a builder. A query string in `path` becomes
    /// `queryStringParameters`.
    pub fn new(method: &'static str, path: impl AsRef<str>) -> Self {
        let (path, query_string) = match path.as_ref().split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (path.as_ref(), None),
        };
        let query = query_string
            .into_iter()
            .flat_map(|query| query.split('&'))
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (key.to_string(), Value::String(value.to_string()))
            })
            .collect();
        Self {
            method,
            path: path.to_string(),
            headers: Map::new(),
            path_parameters: Map::new(),
            query,
            body: None,
            context: Map::new(),
        }
    }

    /// Sets a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Sets a path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_parameters
            .insert(name.into(), Value::String(value.into()));
        self
    }

    /// Sets a query string parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), Value::String(value.into()));
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(self, agent: impl Into<String>) -> Self {
        self.header("User-Agent", agent)
    }

    /// Sets the `X-Version` header.
    pub fn version(self, version: impl Into<String>) -> Self {
        self.header("X-Version", version)
    }

    /// Sets the `Content-Type` header.
    pub fn content_type(self, content_type: impl Into<String>) -> Self {
        self.header("Content-Type", content_type)
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(self, token: impl AsRef<str>) -> Self {
        self.header("Authorization", format!("Bearer {}", token.as_ref()))
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the body as JSON and the `Content-Type` to `application/json`.
    ///
    /// # Panics
    ///
    /// Panics if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        let body = serde_json::to_string(value).expect("JSON serialization should succeed");
        self.body = Some(body);
        self.content_type("application/json")
    }

    /// Sets `identity.userAgent` in the platform context.
    pub fn identity_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.context
            .insert("identity".to_string(), json!({ "userAgent": agent.into() }));
        self
    }

    /// Sets a platform context field.
    pub fn context_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Builds the event.
    pub fn build(self) -> Result<TestEvent, TestError> {
        if !self.path.starts_with('/') {
            return Err(TestError::EventBuild(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        let optional = |map: Map<String, Value>| {
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        };
        let event = json!({
            "httpMethod": self.method,
            "path": self.path,
            "headers": self.headers,
            "pathParameters": optional(self.path_parameters),
            "queryStringParameters": optional(self.query),
            "body": self.body,
            "isBase64Encoded": false,
        });
        Ok(TestEvent {
            event,
            context: Value::Object(self.context),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::HandlerRequest;

    fn request(event: TestEvent) -> HandlerRequest {
        let (event, context) = event.into_parts();
        HandlerRequest::new(event, context)
    }

    #[test]
    fn test_get_event() {
        let event = TestEvent::get("/users").build().unwrap();
        assert_eq!(event.event["httpMethod"], "GET");
        assert_eq!(event.event["path"], "/users");
        assert!(event.event["pathParameters"].is_null());
        assert!(event.event["body"].is_null());
    }

    #[test]
    fn test_query_from_path() {
        let req = request(TestEvent::get("/search?q=rust&page=2&flag").build().unwrap());
        assert_eq!(req.query_param("q"), Some("rust"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.query_param("flag"), Some(""));
    }

    #[test]
    fn test_headers_and_params() {
        let req = request(
            TestEvent::delete("/users/7")
                .path_param("id", "7")
                .bearer_token("secret")
                .version("1.2.3")
                .build()
                .unwrap(),
        );
        assert_eq!(req.path_param("id"), Some("7"));
        assert_eq!(req.header("authorization"), Some("Bearer secret"));
        assert_eq!(req.header("x-version"), Some("1.2.3"));
    }

    #[test]
    fn test_json_body() {
        let req = request(
            TestEvent::post("/users")
                .json(&json!({"name": "Alice"}))
                .build()
                .unwrap(),
        );
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.body().unwrap(), &json!({"name": "Alice"}));
    }

    #[test]
    fn test_identity_context() {
        let event = TestEvent::get("/").identity_user_agent("console").build().unwrap();
        assert_eq!(event.context["identity"]["userAgent"], "console");
    }

    #[test]
    fn test_records() {
        let req = request(TestEvent::records([json!({"n": 1}), json!({"n": 2})]).unwrap());
        assert_eq!(req.records().len(), 2);
    }

    #[test]
    fn test_relative_path_rejected() {
        assert!(matches!(
            TestEvent::get("users").build(),
            Err(TestError::EventBuild(_))
        ));
    }
}
