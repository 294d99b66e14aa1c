//! Response controller and the envelope handed to the platform.
//!
//! [`HandlerResponse`] wraps the platform's completion callback and makes sure
//! it is invoked at most once per invocation, whichever of `ok` / `fail`
//! comes first.

use crate::error::{HermesError, HermesResult};
use http::StatusCode;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Platform completion callback.
pub type Callback = Box<dyn FnOnce(ResponseEnvelope) + Send>;

/// The proxy-style response handed to the platform callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// HTTP status code.
    pub status_code: u16,
    /// Single-value headers.
    pub headers: BTreeMap<String, String>,
    /// Multi-value headers (`Set-Cookie`), present only when non-empty.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub multi_value_headers: Option<BTreeMap<String, Vec<String>>>,
    /// JSON-encoded body.
    pub body: String,
}

impl ResponseEnvelope {
    /// Parses the body back into JSON.
    pub fn json(&self) -> HermesResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Returns a single-value header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Returns the `Set-Cookie` values.
    pub fn cookies(&self) -> &[String] {
        self.multi_value_headers
            .as_ref()
            .and_then(|headers| headers.get("Set-Cookie"))
            .map_or(&[], Vec::as_slice)
    }
}

/// Base CORS headers attached to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsPolicy {
    /// `Access-Control-Allow-Origin`.
    pub allow_origin: String,
    /// `Access-Control-Allow-Headers`.
    pub allow_headers: String,
    /// `Access-Control-Allow-Credentials`.
    pub allow_credentials: bool,
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_string(),
            allow_headers: "X-Version".to_string(),
            allow_credentials: true,
        }
    }
}

impl CorsPolicy {
    fn headers(&self, origin_override: Option<&str>) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Access-Control-Allow-Origin".to_string(),
            origin_override.unwrap_or(&self.allow_origin).to_string(),
        );
        headers.insert(
            "Access-Control-Allow-Headers".to_string(),
            self.allow_headers.clone(),
        );
        headers.insert(
            "Access-Control-Allow-Credentials".to_string(),
            self.allow_credentials.to_string(),
        );
        headers
    }
}

/// Attributes of a cookie set with [`HandlerResponse::add_cookie`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieOptions {
    /// `Domain=` attribute.
    pub domain: Option<String>,
    /// Adds `SameSite=None; Secure`.
    pub cross_origin: bool,
    /// `Path=` attribute.
    pub path: Option<String>,
}

impl CookieOptions {
    /// Sets the domain.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Marks the cookie as cross-origin.
    #[must_use]
    pub const fn cross_origin(mut self) -> Self {
        self.cross_origin = true;
        self
    }

    /// Sets the path.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    fn format(&self, key: &str, value: &str) -> String {
        let mut parts = vec![format!("{key}={value}")];
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("Domain={domain}"));
        }
        if self.cross_origin {
            parts.push("SameSite=None".to_string());
            parts.push("Secure".to_string());
        }
        if let Some(path) = &self.path {
            parts.push(format!("Path={path}"));
        }
        parts.join("; ")
    }
}

struct ResponseState {
    callback: Option<Callback>,
    completed: Option<StatusCode>,
    cookies: Vec<String>,
    cross_origin: Option<String>,
}

/// Completes the invocation exactly once.
///
/// `ok` attaches the CORS headers (with the per-request origin override) and
/// any cookies; `fail` attaches the base CORS headers only. Every call after
/// the first completion is rejected with `false` and a warning.
pub struct HandlerResponse {
    cors: CorsPolicy,
    state: Mutex<ResponseState>,
}

impl HandlerResponse {
    /// Creates a controller with the default CORS policy.
    #[must_use]
    pub fn new(callback: Callback) -> Self {
        Self::with_cors(callback, CorsPolicy::default())
    }

    /// Creates a controller with a custom CORS policy.
    #[must_use]
    pub fn with_cors(callback: Callback, cors: CorsPolicy) -> Self {
        Self {
            cors,
            state: Mutex::new(ResponseState {
                callback: Some(callback),
                completed: None,
                cookies: Vec::new(),
                cross_origin: None,
            }),
        }
    }

    /// Completes with `200 OK`.
    pub fn ok<T: Serialize + ?Sized>(&self, body: &T) -> HermesResult<bool> {
        self.ok_with_status(body, StatusCode::OK)
    }

    /// Completes successfully with the given status.
    ///
    /// Returns `Ok(false)` if the response was already completed. A body that
    /// cannot be serialized is an error and leaves the response open.
    pub fn ok_with_status<T: Serialize + ?Sized>(
        &self,
        body: &T,
        status: StatusCode,
    ) -> HermesResult<bool> {
        let body = serde_json::to_string(body)?;
        Ok(self.complete(status, body, true))
    }

    /// Completes with `500 Internal Server Error`.
    pub fn fail<T: Serialize + ?Sized>(&self, body: &T) -> HermesResult<bool> {
        self.fail_with_status(body, StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Completes unsuccessfully with the given status.
    pub fn fail_with_status<T: Serialize + ?Sized>(
        &self,
        body: &T,
        status: StatusCode,
    ) -> HermesResult<bool> {
        let body = serde_json::to_string(body)?;
        Ok(self.complete(status, body, false))
    }

    /// Completes with the error's status and `{"error": message}` body.
    pub fn fail_with_error(&self, error: &HermesError) -> bool {
        self.fail_with_error_status(error, error.status_code())
    }

    /// Completes with the error's `{"error": message}` body under `status`.
    pub fn fail_with_error_status(&self, error: &HermesError, status: StatusCode) -> bool {
        // ErrorBody only holds strings, so serialization cannot fail.
        let body = serde_json::to_string(&error.to_body())
            .unwrap_or_else(|_| String::from("{\"error\":\"internal error\"}"));
        self.complete(status, body, false)
    }

    /// Adds a `Set-Cookie` value sent with a successful response.
    pub fn add_cookie(&self, key: &str, value: &str, options: &CookieOptions) -> bool {
        let mut state = self.state.lock();
        if state.completed.is_some() {
            tracing::warn!(cookie = key, "cookie added after the response was completed");
            return false;
        }
        state.cookies.push(options.format(key, value));
        true
    }

    /// Overrides `Access-Control-Allow-Origin` for a successful response.
    pub fn set_cross_origin(&self, origin: Option<String>) -> bool {
        let mut state = self.state.lock();
        if state.completed.is_some() {
            tracing::warn!("cross origin set after the response was completed");
            return false;
        }
        state.cross_origin = origin;
        true
    }

    /// Returns `true` once `ok` or `fail` went through.
    pub fn is_completed(&self) -> bool {
        self.state.lock().completed.is_some()
    }

    /// Returns the status the response was completed with.
    pub fn completed_status(&self) -> Option<StatusCode> {
        self.state.lock().completed
    }

    fn complete(&self, status: StatusCode, body: String, success: bool) -> bool {
        let (callback, envelope) = {
            let mut state = self.state.lock();
            if state.completed.is_some() {
                drop(state);
                tracing::warn!(
                    status = status.as_u16(),
                    "response already completed, ignoring"
                );
                return false;
            }
            state.completed = Some(status);

            let (headers, multi_value_headers) = if success {
                let cookies = std::mem::take(&mut state.cookies);
                let multi = (!cookies.is_empty())
                    .then(|| BTreeMap::from([("Set-Cookie".to_string(), cookies)]));
                (self.cors.headers(state.cross_origin.as_deref()), multi)
            } else {
                (self.cors.headers(None), None)
            };

            let envelope = ResponseEnvelope {
                status_code: status.as_u16(),
                headers,
                multi_value_headers,
                body,
            };
            (state.callback.take(), envelope)
        };

        tracing::debug!(status = envelope.status_code, success, "response completed");
        if let Some(callback) = callback {
            callback(envelope);
        }
        true
    }
}

impl fmt::Debug for HandlerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("HandlerResponse")
            .field("cors", &self.cors)
            .field("completed", &state.completed)
            .field("cookies", &state.cookies)
            .field("cross_origin", &state.cross_origin)
            .finish_non_exhaustive()
    }
}
