//! # Trellis Test
//!
//! In-memory HTTP testing for Trellis applications. Requests go through the
//! same routing, argument resolution and error mapping as a live server,
//! without binding a port.
//!
//! ## Example
//!
//! ```
//! use trellis_server::Router;
//! use trellis_test::TestClient;
//!
//! # tokio_test_block(async {
//! let client = TestClient::from_router(Router::new());
//!
//! let response = client.get("/missing").send().await;
//! response.assert_status_code(404);
//! response.assert_json_field("message", &serde_json::json!("Not Found"));
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
