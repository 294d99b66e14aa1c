//! In-memory client that drives a handler like the platform would.

use crate::error::TestError;
use crate::event::{TestEvent, TestEventBuilder};
use crate::response::TestResponse;
use hermes_core::{Callback, Handler, ResponseEnvelope};
use hermes_middleware::{HandlerFn, InvocationReport, PluginChain};
use serde::Serialize;
use std::sync::Arc;
use std::sync::Mutex;

/// A test client for invoking a handler without a platform.
///
/// # Example
///
/// ```ignore
/// use hermes_test::TestClient;
///
/// let client = TestClient::new(handler).with_default_header("X-Version", "1.0.0");
///
/// let response = client.get("/users/123").path_param("id", "123").send().await;
/// response.assert_status_code(200);
/// ```
#[must_use]
pub struct TestClient<L: PluginChain, H> {
    handler: HandlerFn<L, H>,
    default_headers: Vec<(String, String)>,
}

impl<L, H> TestClient<L, H>
where
    L: PluginChain,
    H: Handler<L::Aux>,
{
    /// Wraps a built handler.
    pub fn new(handler: HandlerFn<L, H>) -> Self {
        Self {
            handler,
            default_headers: Vec::new(),
        }
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The wrapped handler.
    pub fn handler(&self) -> &HandlerFn<L, H> {
        &self.handler
    }

    /// Creates a GET request builder.
    pub fn get(&self, path: impl AsRef<str>) -> TestClientRequest<'_, L, H> {
        TestClientRequest::new(self, TestEvent::get(path))
    }

    /// Creates a POST request builder.
    pub fn post(&self, path: impl AsRef<str>) -> TestClientRequest<'_, L, H> {
        TestClientRequest::new(self, TestEvent::post(path))
    }

    /// Creates a PUT request builder.
    pub fn put(&self, path: impl AsRef<str>) -> TestClientRequest<'_, L, H> {
        TestClientRequest::new(self, TestEvent::put(path))
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, path: impl AsRef<str>) -> TestClientRequest<'_, L, H> {
        TestClientRequest::new(self, TestEvent::patch(path))
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, path: impl AsRef<str>) -> TestClientRequest<'_, L, H> {
        TestClientRequest::new(self, TestEvent::delete(path))
    }

    /// Sends a prebuilt event, such as a queue `Records` batch.
    pub async fn send_event(&self, event: TestEvent) -> Result<TestResponse, TestError> {
        let (response, report) = self.run(event).await;
        if self.handler.is_strict() {
            if let Some(error) = report.first_error() {
                return Err(TestError::Handler(error));
            }
        }
        response.ok_or(TestError::NoResponse)
    }

    /// Runs an event and returns the response alongside the invocation
    /// report, regardless of strict mode.
    pub async fn run(&self, event: TestEvent) -> (Option<TestResponse>, InvocationReport) {
        let recorder = ResponseRecorder::new();
        let (event, context) = event.into_parts();
        let report = self.handler.run(event, context, recorder.callback()).await;
        (recorder.take().map(TestResponse::from), report)
    }
}

impl<L: PluginChain, H> std::fmt::Debug for TestClient<L, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("default_headers", &self.default_headers)
            .finish_non_exhaustive()
    }
}

/// A request builder bound to a test client.
#[must_use]
pub struct TestClientRequest<'a, L: PluginChain, H> {
    client: &'a TestClient<L, H>,
    builder: TestEventBuilder,
}

impl<'a, L, H> TestClientRequest<'a, L, H>
where
    L: PluginChain,
    H: Handler<L::Aux>,
{
    fn new(client: &'a TestClient<L, H>, builder: TestEventBuilder) -> Self {
        let builder = client
            .default_headers
            .iter()
            .fold(builder, |builder, (name, value)| builder.header(name, value));
        Self { client, builder }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets a path parameter.
    pub fn path_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.path_param(name, value);
        self
    }

    /// Sets a query string parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.query(name, value);
        self
    }

    /// Sets the `User-Agent` header.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.builder = self.builder.user_agent(agent);
        self
    }

    /// Sets `identity.userAgent` in the platform context.
    pub fn identity_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.builder = self.builder.identity_user_agent(agent);
        self
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request and returns the response.
    ///
    /// # Panics
    ///
    /// Panics if the event is invalid, no response was delivered, or a
    /// strict-mode handler reported an error.
    pub async fn send(self) -> TestResponse {
        self.try_send().await.expect("request should succeed")
    }

    /// Sends the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let event = self.builder.build()?;
        self.client.send_event(event).await
    }

    /// Sends the request and returns the response with the report.
    pub async fn send_with_report(
        self,
    ) -> Result<(Option<TestResponse>, InvocationReport), TestError> {
        let event = self.builder.build()?;
        Ok(self.client.run(event).await)
    }
}

/// A callback that keeps the envelope it receives.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    slot: Arc<Mutex<Option<ResponseEnvelope>>>,
}

impl ResponseRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A platform callback writing into this recorder.
    pub fn callback(&self) -> Callback {
        let slot = Arc::clone(&self.slot);
        Box::new(move |envelope| {
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(envelope);
            }
        })
    }

    /// Takes the recorded envelope, if any.
    pub fn take(&self) -> Option<ResponseEnvelope> {
        self.slot.lock().ok().and_then(|mut slot| slot.take())
    }
}
