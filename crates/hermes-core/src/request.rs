//! Read-only view of the inbound event.

use crate::error::{HermesError, HermesResult, SharedError};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Wraps the raw platform event and context for one invocation.
///
/// The body is parsed lazily on first access and cached, including a parse
/// failure. The request also carries the last-error slot that the invocation
/// proxy fills whenever a lifecycle phase fails.
///
/// # Example
///
/// ```
/// use hermes_core::HandlerRequest;
/// use serde_json::json;
///
/// let request = HandlerRequest::new(
///     json!({
///         "body": "{\"name\":\"hermes\"}",
///         "headers": {"Content-Type": "application/json"},
///         "pathParameters": {"id": "7"},
///     }),
///     json!({}),
/// );
///
/// assert_eq!(request.body().unwrap()["name"], "hermes");
/// assert_eq!(request.header("content-type"), Some("application/json"));
/// assert_eq!(request.path_param("id"), Some("7"));
/// ```
#[derive(Debug)]
pub struct HandlerRequest {
    event: Value,
    platform_context: Value,
    body: OnceLock<Result<Value, String>>,
    last_error: Mutex<Option<SharedError>>,
}

impl HandlerRequest {
    /// Creates a request view over a platform event and context.
    #[must_use]
    pub fn new(event: Value, platform_context: Value) -> Self {
        Self {
            event,
            platform_context,
            body: OnceLock::new(),
            last_error: Mutex::new(None),
        }
    }

    /// Returns the parsed JSON body.
    ///
    /// A missing, `null` or empty body is `{}`. A string body is parsed as
    /// JSON; a body that is already structured is used as is. A parse failure
    /// is a validation error and stays cached for the rest of the invocation.
    pub fn body(&self) -> HermesResult<&Value> {
        self.body
            .get_or_init(|| parse_body(self.event.get("body")))
            .as_ref()
            .map_err(|message| HermesError::validation(message.clone()))
    }

    /// Deserializes the body into `T`.
    pub fn body_as<T: DeserializeOwned>(&self) -> HermesResult<T> {
        let body = self.body()?;
        serde_json::from_value(body.clone())
            .map_err(|e| HermesError::validation(format!("invalid request body: {e}")))
    }

    /// Returns the path parameters, empty if the event has none.
    pub fn path(&self) -> Map<String, Value> {
        self.object("pathParameters")
    }

    /// Returns one path parameter.
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.event
            .get("pathParameters")
            .and_then(|params| params.get(name))
            .and_then(Value::as_str)
    }

    /// Returns the query string parameters, empty if the event has none.
    pub fn query(&self) -> Map<String, Value> {
        self.object("queryStringParameters")
    }

    /// Returns one query string parameter.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.event
            .get("queryStringParameters")
            .and_then(|params| params.get(name))
            .and_then(Value::as_str)
    }

    /// Returns a header value, matching the name case-insensitively.
    ///
    /// Falls back to the first entry of `multiValueHeaders`.
    pub fn header(&self, name: &str) -> Option<&str> {
        let single = self
            .event
            .get("headers")
            .and_then(Value::as_object)
            .and_then(|headers| find_ignore_case(headers, name))
            .and_then(Value::as_str);
        single.or_else(|| {
            self.event
                .get("multiValueHeaders")
                .and_then(Value::as_object)
                .and_then(|headers| find_ignore_case(headers, name))
                .and_then(Value::as_array)
                .and_then(|values| values.first())
                .and_then(Value::as_str)
        })
    }

    /// Returns the batch records (`Records`) of a queue or stream event.
    pub fn records(&self) -> &[Value] {
        self.event
            .get("Records")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Deserializes every batch record into `T`.
    pub fn records_as<T: DeserializeOwned>(&self) -> HermesResult<Vec<T>> {
        self.records()
            .iter()
            .map(|record| {
                serde_json::from_value(record.clone())
                    .map_err(|e| HermesError::validation(format!("invalid record: {e}")))
            })
            .collect()
    }

    /// Returns the raw event.
    pub const fn event(&self) -> &Value {
        &self.event
    }

    /// Returns the raw platform context.
    pub const fn platform_context(&self) -> &Value {
        &self.platform_context
    }

    /// Returns the most recent failure of this invocation.
    pub fn last_error(&self) -> Option<SharedError> {
        self.last_error.lock().clone()
    }

    /// Records a failure; the latest one wins.
    pub fn record_error(&self, error: SharedError) {
        *self.last_error.lock() = Some(error);
    }

    fn object(&self, key: &str) -> Map<String, Value> {
        self.event
            .get(key)
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }
}

fn parse_body(raw: Option<&Value>) -> Result<Value, String> {
    match raw {
        None | Some(Value::Null) => Ok(Value::Object(Map::new())),
        Some(Value::String(text)) if text.is_empty() => Ok(Value::Object(Map::new())),
        Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Null) => Ok(Value::Object(Map::new())),
            Ok(value) => Ok(value),
            Err(e) => Err(format!("request body is not valid JSON: {e}")),
        },
        Some(other) => Ok(other.clone()),
    }
}

fn find_ignore_case<'a>(map: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    map.get(name).or_else(|| {
        map.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn request(event: Value) -> HandlerRequest {
        HandlerRequest::new(event, json!({}))
    }

    #[test]
    fn test_missing_body_is_empty_object() {
        assert_eq!(request(json!({})).body().unwrap(), &json!({}));
        assert_eq!(request(json!({"body": null})).body().unwrap(), &json!({}));
        assert_eq!(request(json!({"body": ""})).body().unwrap(), &json!({}));
        assert_eq!(request(json!({"body": "null"})).body().unwrap(), &json!({}));
    }

    #[test]
    fn test_string_body_parsed() {
        let req = request(json!({"body": "{\"a\":1}"}));
        assert_eq!(req.body().unwrap(), &json!({"a": 1}));
        // Cached: same reference.
        assert!(std::ptr::eq(req.body().unwrap(), req.body().unwrap()));
    }

    #[test]
    fn test_structured_body_passes_through() {
        let req = request(json!({"body": {"a": [1, 2]}}));
        assert_eq!(req.body().unwrap(), &json!({"a": [1, 2]}));
    }

    #[test]
    fn test_invalid_body_is_cached_validation_error() {
        let req = request(json!({"body": "{not json"}));
        let first = req.body().unwrap_err();
        let second = req.body().unwrap_err();
        assert_eq!(first.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(first.message(), second.message());
    }

    #[test]
    fn test_body_as() {
        #[derive(Deserialize)]
        struct Input {
            a: i64,
        }
        let req = request(json!({"body": "{\"a\":3}"}));
        assert_eq!(req.body_as::<Input>().unwrap().a, 3);

        let wrong = request(json!({"body": "{\"a\":\"x\"}"}));
        assert!(wrong.body_as::<Input>().is_err());
    }

    #[test]
    fn test_path_and_query() {
        let req = request(json!({
            "pathParameters": {"id": "7"},
            "queryStringParameters": {"page": "2"},
        }));
        assert_eq!(req.path_param("id"), Some("7"));
        assert_eq!(req.query_param("page"), Some("2"));
        assert_eq!(req.path().len(), 1);

        let empty = request(json!({"pathParameters": null}));
        assert!(empty.path().is_empty());
        assert!(empty.query().is_empty());
        assert_eq!(empty.path_param("id"), None);
    }

    #[test]
    fn test_header_lookup() {
        let req = request(json!({
            "headers": {"X-Version": "1.2.3", "user-agent": "curl"},
            "multiValueHeaders": {"Accept": ["a", "b"]},
        }));
        assert_eq!(req.header("X-Version"), Some("1.2.3"));
        assert_eq!(req.header("x-version"), Some("1.2.3"));
        assert_eq!(req.header("User-Agent"), Some("curl"));
        assert_eq!(req.header("accept"), Some("a"));
        assert_eq!(req.header("missing"), None);
        assert_eq!(request(json!({})).header("X-Version"), None);
    }

    #[test]
    fn test_records() {
        #[derive(Deserialize)]
        struct Record {
            id: u32,
        }
        let req = request(json!({"Records": [{"id": 1}, {"id": 2}]}));
        assert_eq!(req.records().len(), 2);
        let ids: Vec<u32> = req
            .records_as::<Record>()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(request(json!({})).records().is_empty());
    }

    #[test]
    fn test_last_error_latest_wins() {
        let req = request(json!({}));
        assert!(req.last_error().is_none());
        req.record_error(Arc::new(HermesError::internal("first")));
        req.record_error(Arc::new(HermesError::internal("second")));
        assert_eq!(req.last_error().unwrap().message(), "second");
    }

    proptest! {
        #[test]
        fn prop_header_lookup_ignores_case(
            name in "[A-Za-z][A-Za-z-]{0,20}",
            value in "[ -~]{0,30}",
        ) {
            let req = request(json!({"headers": {name.clone(): value.clone()}}));
            prop_assert_eq!(req.header(&name.to_ascii_lowercase()), Some(value.as_str()));
            prop_assert_eq!(req.header(&name.to_ascii_uppercase()), Some(value.as_str()));
        }
    }
}
