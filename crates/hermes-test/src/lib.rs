//! # Hermes Test
//!
//! Test utilities for Hermes handlers. Events are built in memory and run
//! through the full plugin lifecycle, with the envelope the platform would
//! receive captured for assertions.
//!
//! ## Key Features
//!
//! - **Event Builder**: Fluent API for API-Gateway-shaped and `Records` events
//! - **Test Client**: Drives a built handler with default headers
//! - **Response Assertions**: Status, header, cookie and JSON helpers
//! - **Reports**: Access to every phase error of an invocation
//!
//! ## Example
//!
//! ```ignore
//! use hermes_test::TestClient;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_create_user() {
//!     let client = TestClient::new(handler);
//!
//!     let response = client
//!         .post("/users")
//!         .json(&json!({ "name": "Alice" }))
//!         .send()
//!         .await;
//!
//!     response
//!         .assert_status_code(200)
//!         .assert_json_field("name", &json!("Alice"));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/hermes-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod event;
mod response;

pub use client::{ResponseRecorder, TestClient, TestClientRequest};
pub use error::TestError;
pub use event::{TestEvent, TestEventBuilder};
pub use response::TestResponse;
