//! Binds registered endpoints to router entries.
//!
//! Each bound route resolves its declared arguments from the request, calls
//! the endpoint's method and writes the JSON result.
//!
//! | Outcome | Status |
//! |---------|--------|
//! | Method returned a value | `200` and the value |
//! | Argument validation failed | `400` and the failure |
//! | Service or method raised an error | `500` |
//! | Resolution deadline expired | `504` |

use crate::response::{error_response, json_response};
use crate::router::{RouteHandler, RouteRequest, Router};
use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;
use std::sync::Arc;
use std::time::{Duration, Instant};
use trellis_core::{
    DeclarationError, EndpointDefinition, EndpointRegistry, HandlerError, HttpMethod, MethodHandler,
    RegisteredEndpoint, Value,
};
use trellis_extract::{ArgumentResolver, RawInput, ResolveError};
use trellis_telemetry::{record_request, record_validation_failure};

/// Cause written with a `504`.
pub const RESOLVE_TIMEOUT_CAUSE: &str = "Argument resolution timed out";

enum Failure {
    Resolve(ResolveError),
    Handler(HandlerError),
}

struct BoundEndpoint {
    name: String,
    definition: Arc<EndpointDefinition>,
    handler: MethodHandler,
    resolver: Arc<ArgumentResolver>,
    resolve_timeout: Option<Duration>,
}

impl BoundEndpoint {
    async fn call(&self, request: RouteRequest) -> Response<Full<Bytes>> {
        let started = Instant::now();
        let method = self.definition.method.as_str();
        let route = self.definition.path.as_str();

        let response = match self.invoke(request).await {
            Ok(value) => json_response(StatusCode::OK, &value),
            Err(Failure::Resolve(ResolveError::Validation(failure))) => {
                record_validation_failure(route, failure.kind().as_str());
                tracing::debug!(handler = %self.name, cause = %failure.cause, "Request rejected");
                json_response(failure.status_code(), &failure)
            }
            Err(Failure::Resolve(ResolveError::Timeout(limit))) => {
                tracing::warn!(handler = %self.name, timeout = ?limit, "Argument resolution timed out");
                error_response(StatusCode::GATEWAY_TIMEOUT, Some(RESOLVE_TIMEOUT_CAUSE))
            }
            Err(Failure::Resolve(ResolveError::Injection(e))) => {
                tracing::error!(handler = %self.name, error = %e, "Service injection failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, None)
            }
            Err(Failure::Handler(e)) => {
                tracing::error!(handler = %self.name, error = %e, "Handler failed");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        record_request(method, route, response.status().as_u16(), started.elapsed());
        response
    }

    async fn invoke(&self, request: RouteRequest) -> Result<Value, Failure> {
        let body = self.definition.reads_body().then_some(request.body.as_ref());
        let input = RawInput::from_parts(request.query.as_deref(), request.params, body)
            .map_err(|f| Failure::Resolve(f.into()))?;

        let resolving = self.resolver.resolve(&self.definition.arguments, &input);
        let resolved = match self.resolve_timeout {
            Some(limit) => tokio::time::timeout(limit, resolving)
                .await
                .unwrap_or(Err(ResolveError::Timeout(limit))),
            None => resolving.await,
        };
        let arguments = resolved.map_err(Failure::Resolve)?;

        (self.handler)(arguments).await.map_err(Failure::Handler)
    }
}

/// Installs registry endpoints into a [`Router`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteBinder;

impl RouteBinder {
    /// Binds every endpoint, one pass per verb in [`HttpMethod::BINDING_ORDER`].
    ///
    /// Within a pass endpoints keep their registration order. Which route
    /// serves a path is up to the router's ranking, not this order.
    /// Returns the number of routes bound.
    ///
    /// # Errors
    ///
    /// Returns `DeclarationError::DuplicateRoute` if two endpoints share a
    /// verb and path shape.
    pub fn bind(
        registry: &EndpointRegistry,
        resolver: Arc<ArgumentResolver>,
        router: &mut Router,
        resolve_timeout: Option<Duration>,
    ) -> Result<usize, DeclarationError> {
        let mut bound = 0;
        for method in HttpMethod::BINDING_ORDER {
            for endpoint in registry
                .all_endpoints()
                .iter()
                .filter(|e| e.definition.method == method)
            {
                Self::bind_one(endpoint, Arc::clone(&resolver), router, resolve_timeout)?;
                bound += 1;
            }
        }
        tracing::debug!(routes = bound, "Route binding complete");
        Ok(bound)
    }

    fn bind_one(
        endpoint: &RegisteredEndpoint,
        resolver: Arc<ArgumentResolver>,
        router: &mut Router,
        resolve_timeout: Option<Duration>,
    ) -> Result<(), DeclarationError> {
        let name = endpoint.qualified_name();
        let bound = Arc::new(BoundEndpoint {
            name: name.clone(),
            definition: Arc::clone(&endpoint.definition),
            handler: Arc::clone(&endpoint.handler),
            resolver,
            resolve_timeout,
        });

        let handler: RouteHandler = Arc::new(move |request| {
            let bound = Arc::clone(&bound);
            Box::pin(async move { bound.call(request).await })
        });

        let definition = &endpoint.definition;
        router.add_route(definition.method, definition.path.clone(), name.clone(), handler)?;
        tracing::info!(
            method = %definition.method,
            path = %definition.path,
            handler = %name,
            "Route bound"
        );
        Ok(())
    }
}
