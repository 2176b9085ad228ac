//! HTTP server implementation.
//!
//! The server accepts HTTP/1.1 connections on a Tokio listener, collects each
//! request body and hands the request to its [`Router`].
//!
//! # Example
//!
//! ```rust,no_run
//! use trellis_server::{Router, Server, ServerConfig, ShutdownSignal};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().http_addr("127.0.0.1:3000").build();
//!     let server = Server::new(config, Router::new());
//!
//!     let listener = server.bind().await?;
//!     server.run_with_shutdown(listener, ShutdownSignal::with_os_signals()).await?;
//!     Ok(())
//! }
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ALLOW};
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::Instrument;
use trellis_telemetry::metrics::InFlightGuard;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::response::error_response;
use crate::router::{RouteLookup, RouteRequest, Router};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Server error types.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configured address does not parse.
    #[error("Invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The configured address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// The listener could not be bound.
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// I/O error on a bound listener.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The Trellis HTTP server.
#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
    router: Arc<Router>,
}

impl Server {
    /// Creates a server that dispatches to `router`.
    #[must_use]
    pub fn new(config: ServerConfig, router: Router) -> Self {
        Self {
            config,
            router: Arc::new(router),
        }
    }

    /// Returns a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns a reference to the router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Binds a listener on the configured address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or cannot be bound.
    pub async fn bind(&self) -> Result<TcpListener, ServerError> {
        let addr = self
            .config
            .socket_addr()
            .map_err(|e| ServerError::InvalidAddress {
                addr: self.config.http_addr().to_string(),
                reason: e.to_string(),
            })?;

        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Serves connections from `listener` until `shutdown` triggers.
    ///
    /// Open connections are asked to finish their current request and are
    /// given up to the configured shutdown timeout to close.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener's address cannot be read.
    pub async fn run_with_shutdown(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, routes = self.router.route_count(), "Server listening");

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, shutdown).await {
                                    tracing::debug!(%remote_addr, error = %e, "Connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            connections = tracker.active_connections(),
            "Waiting for connections to close"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                tracing::info!("All connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    connections = tracker.active_connections(),
                    "Shutdown timeout reached with connections still active"
                );
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => result,
            () = shutdown.recv() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        }
    }

    async fn handle_request(&self, req: Request<Incoming>) -> Result<HttpResponse, Infallible> {
        let request_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.uri().path(),
        );

        async move {
            let (parts, body) = req.into_parts();
            let limited = Limited::new(body, self.config.max_body_size());

            let collected =
                tokio::time::timeout(self.config.request_timeout(), limited.collect()).await;

            let mut response = match collected {
                Ok(Ok(body)) => self.dispatch(Request::from_parts(parts, body.to_bytes())).await,
                Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    tracing::debug!("Request body exceeds the size limit");
                    error_response(StatusCode::PAYLOAD_TOO_LARGE, None)
                }
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Failed to read request body");
                    error_response(StatusCode::BAD_REQUEST, Some("Failed to read request body"))
                }
                Err(_) => {
                    tracing::warn!("Request body collection timed out");
                    error_response(StatusCode::REQUEST_TIMEOUT, None)
                }
            };

            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            tracing::debug!(status = response.status().as_u16(), "Request completed");
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Routes an already-collected request.
    ///
    /// This is the whole request path minus the socket, used by the
    /// in-memory test client.
    pub async fn dispatch(&self, request: Request<Bytes>) -> HttpResponse {
        let _in_flight = InFlightGuard::new();
        let (parts, body) = request.into_parts();

        if body.len() > self.config.max_body_size() {
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, None);
        }

        match self.router.lookup(&parts.method, parts.uri.path()) {
            RouteLookup::Found { handler, params, .. } => {
                handler(RouteRequest {
                    query: parts.uri.query().map(str::to_string),
                    params,
                    body,
                })
                .await
            }
            RouteLookup::MethodNotAllowed(allowed) => {
                let allow = allowed
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut response = error_response(StatusCode::METHOD_NOT_ALLOWED, None);
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(ALLOW, value);
                }
                response
            }
            RouteLookup::NotFound => error_response(StatusCode::NOT_FOUND, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::json_response;
    use crate::router::RouteHandler;
    use http::Method;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use trellis_core::HttpMethod;

    fn echo() -> RouteHandler {
        Arc::new(|req| {
            Box::pin(async move {
                json_response(
                    StatusCode::OK,
                    &serde_json::json!({
                        "query": req.query,
                        "params": req.params,
                        "body": String::from_utf8_lossy(&req.body),
                    }),
                )
            })
        })
    }

    fn server(config: ServerConfig) -> Server {
        let mut router = Router::new();
        router.add_route(HttpMethod::Get, "/:age", "age", echo()).unwrap();
        router.add_route(HttpMethod::Post, "/profile", "profile", echo()).unwrap();
        Server::new(config, router)
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Bytes> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
    }

    async fn body_json(response: HttpResponse) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_found() {
        let server = server(ServerConfig::default());
        let response = server
            .dispatch(request(Method::GET, "/30?userId=42", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["params"]["age"], "30");
        assert_eq!(body["query"], "userId=42");
    }

    #[tokio::test]
    async fn test_dispatch_not_found() {
        let server = server(ServerConfig::default());
        let response = server.dispatch(request(Method::GET, "/a/b", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"code": 404, "message": "Not Found"})
        );
    }

    #[tokio::test]
    async fn test_dispatch_method_not_allowed() {
        let server = server(ServerConfig::default());
        let response = server.dispatch(request(Method::PUT, "/profile", "")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        // "/profile" also matches "/:age".
        assert_eq!(response.headers()[ALLOW], "GET, POST");
    }

    #[tokio::test]
    async fn test_dispatch_body_too_large() {
        let server = server(ServerConfig::builder().max_body_size(4).build());
        let response = server
            .dispatch(request(Method::POST, "/profile", "{\"age\":\"30\"}"))
            .await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_bind_invalid_address() {
        let server = server(ServerConfig::builder().http_addr("not-a-valid-address").build());
        let err = server.bind().await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidAddress { .. }));
        assert!(err.to_string().contains("Invalid address"));
    }

    #[tokio::test]
    async fn test_serves_over_tcp_and_shuts_down() {
        let server = server(
            ServerConfig::builder()
                .http_addr("127.0.0.1:0")
                .shutdown_timeout(Duration::from_secs(1))
                .build(),
        );
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let shutdown = ShutdownSignal::new();
        let handle = tokio::spawn(server.run_with_shutdown(listener, shutdown.clone()));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /30 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains("x-request-id"));
        assert!(raw.contains("application/json"));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap()
            .unwrap();
    }
}
