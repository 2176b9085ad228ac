//! # Trellis Server
//!
//! HTTP server infrastructure for Trellis:
//!
//! - HTTP/1.1 via Hyper with graceful shutdown
//! - A linear `:name` path router with `404`/`405` handling
//! - The route binder that turns registered endpoints into routes
//! - Background services started before the listener binds
//!
//! ## Example
//!
//! ```rust
//! use trellis_server::{RouteBinder, Router, Server, ServerConfig};
//! use trellis_core::{Container, EndpointRegistry};
//! use trellis_extract::ArgumentResolver;
//! use std::sync::Arc;
//!
//! let registry = EndpointRegistry::new();
//! let resolver = Arc::new(ArgumentResolver::with_container(Container::new()));
//!
//! let mut router = Router::new();
//! let bound = RouteBinder::bind(&registry, resolver, &mut router, None).unwrap();
//! assert_eq!(bound, 0);
//!
//! let server = Server::new(ServerConfig::default(), router);
//! assert_eq!(server.config().http_addr(), "0.0.0.0:3000");
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod binder;
pub mod config;
pub mod lifecycle;
pub mod response;
pub mod router;
pub mod server;
pub mod shutdown;

pub use binder::{RouteBinder, RESOLVE_TIMEOUT_CAUSE};
pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_PORT};
pub use lifecycle::{BackgroundService, BackgroundServiceHandle, Lifecycle, LifecycleError};
pub use response::{error_response, json_response};
pub use router::{RouteHandler, RouteLookup, RouteRequest, Router};
pub use server::{HttpResponse, Server, ServerError};
pub use shutdown::ShutdownSignal;
