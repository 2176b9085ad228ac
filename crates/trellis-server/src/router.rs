//! Request routing and path matching.
//!
//! Routes live in a linear table of `:name` path templates. When several
//! templates match a path, the most literal one wins: segments are compared
//! left to right and a literal beats a `:name` at the first position where
//! they differ. Registration order never decides a match.
//!
//! # Example
//!
//! ```rust
//! use trellis_server::router::{RouteLookup, Router};
//! use trellis_server::response::json_response;
//! use trellis_core::HttpMethod;
//! use http::{Method, StatusCode};
//! use std::sync::Arc;
//!
//! let mut router = Router::new();
//! router
//!     .add_route(
//!         HttpMethod::Get,
//!         "/users/:id",
//!         "UserController::get",
//!         Arc::new(|_req| Box::pin(async { json_response(StatusCode::OK, &"ok") })),
//!     )
//!     .unwrap();
//!
//! match router.lookup(&Method::GET, "/users/42") {
//!     RouteLookup::Found { params, .. } => assert_eq!(params["id"], "42"),
//!     _ => unreachable!(),
//! }
//! ```

use bytes::Bytes;
use http::Response;
use http_body_util::Full;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use trellis_core::{BoxFuture, DeclarationError, HttpMethod};

/// The data a bound route receives.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    /// Raw query string without the `?`.
    pub query: Option<String>,
    /// Percent-decoded values of the `:name` segments.
    pub params: HashMap<String, String>,
    /// Collected request body.
    pub body: Bytes,
}

/// A bound request handler.
pub type RouteHandler =
    Arc<dyn Fn(RouteRequest) -> BoxFuture<'static, Response<Full<Bytes>>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment {
    Literal(String),
    Param(String),
}

fn parse_segments(pattern: &str) -> Vec<PathSegment> {
    pattern
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix(':') {
            Some(name) => PathSegment::Param(name.to_string()),
            None => PathSegment::Literal(s.to_string()),
        })
        .collect()
}

/// Whether two templates match exactly the same paths.
fn same_shape(a: &[PathSegment], b: &[PathSegment]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|pair| match pair {
            (PathSegment::Literal(x), PathSegment::Literal(y)) => x == y,
            (PathSegment::Param(_), PathSegment::Param(_)) => true,
            _ => false,
        })
}

#[derive(Clone)]
struct Route {
    method: HttpMethod,
    pattern: String,
    segments: Vec<PathSegment>,
    name: String,
    handler: RouteHandler,
}

impl Route {
    /// Ordering key. Lower sorts first and literals rank before params.
    fn specificity(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Literal(_) => 0,
                PathSegment::Param(_) => 1,
            })
            .collect()
    }

    fn match_path(&self, path: &[&str]) -> Option<HashMap<String, String>> {
        if path.len() != self.segments.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (segment, actual) in self.segments.iter().zip(path) {
            match segment {
                PathSegment::Literal(expected) => {
                    if expected != actual {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    let decoded = urlencoding::decode(actual)
                        .map_or_else(|_| (*actual).to_string(), |v| v.into_owned());
                    params.insert(name.clone(), decoded);
                }
            }
        }
        Some(params)
    }
}

/// Outcome of a route lookup.
pub enum RouteLookup<'a> {
    /// A route matched.
    Found {
        /// The route's handler.
        handler: &'a RouteHandler,
        /// Template the path matched, e.g. `/:age`.
        pattern: &'a str,
        /// Diagnostic name of the route.
        name: &'a str,
        /// Extracted path parameters.
        params: HashMap<String, String>,
    },
    /// The path matched but not for this verb.
    MethodNotAllowed(Vec<HttpMethod>),
    /// Nothing matched the path.
    NotFound,
}

impl fmt::Debug for RouteLookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Found {
                pattern, params, ..
            } => f
                .debug_struct("Found")
                .field("pattern", pattern)
                .field("params", params)
                .finish_non_exhaustive(),
            Self::MethodNotAllowed(allowed) => {
                f.debug_tuple("MethodNotAllowed").field(allowed).finish()
            }
            Self::NotFound => f.write_str("NotFound"),
        }
    }
}

/// Linear route table.
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Adds a route.
    ///
    /// Fails if a route with the same verb already matches exactly the same
    /// paths, whatever its placeholders are called.
    pub fn add_route(
        &mut self,
        method: HttpMethod,
        pattern: impl Into<String>,
        name: impl Into<String>,
        handler: RouteHandler,
    ) -> Result<(), DeclarationError> {
        let pattern = pattern.into();
        let segments = parse_segments(&pattern);

        if self
            .routes
            .iter()
            .any(|r| r.method == method && same_shape(&r.segments, &segments))
        {
            return Err(DeclarationError::DuplicateRoute {
                method,
                path: pattern,
            });
        }

        self.routes.push(Route {
            method,
            pattern,
            segments,
            name: name.into(),
            handler,
        });
        Ok(())
    }

    /// Finds the route for a request.
    ///
    /// `Allow` methods are listed in registration order.
    pub fn lookup(&self, method: &http::Method, path: &str) -> RouteLookup<'_> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let method = HttpMethod::from_http(method);

        let mut allowed = Vec::new();
        let mut best: Option<(&Route, HashMap<String, String>)> = None;
        for route in &self.routes {
            let Some(params) = route.match_path(&segments) else {
                continue;
            };
            if Some(route.method) != method {
                if !allowed.contains(&route.method) {
                    allowed.push(route.method);
                }
                continue;
            }
            let better = best
                .as_ref()
                .map_or(true, |(current, _)| route.specificity() < current.specificity());
            if better {
                best = Some((route, params));
            }
        }

        match best {
            Some((route, params)) => RouteLookup::Found {
                handler: &route.handler,
                pattern: &route.pattern,
                name: &route.name,
                params,
            },
            None if allowed.is_empty() => RouteLookup::NotFound,
            None => RouteLookup::MethodNotAllowed(allowed),
        }
    }

    /// `(verb, template)` of every route in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (HttpMethod, &str)> {
        self.routes.iter().map(|r| (r.method, r.pattern.as_str()))
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.routes.iter().map(|r| format!("{} {}", r.method, r.pattern)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::json_response;
    use http::{Method, StatusCode};

    fn handler(tag: &'static str) -> RouteHandler {
        Arc::new(move |_req| Box::pin(async move { json_response(StatusCode::OK, &tag) }))
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.add_route(HttpMethod::Get, "/", "root", handler("root")).unwrap();
        router.add_route(HttpMethod::Get, "/:age", "age", handler("age")).unwrap();
        router
            .add_route(HttpMethod::Post, "/profile", "profile", handler("profile"))
            .unwrap();
        router
            .add_route(HttpMethod::Get, "/users/:id/posts/:post", "post", handler("post"))
            .unwrap();
        router
    }

    fn found_name(lookup: RouteLookup<'_>) -> String {
        match lookup {
            RouteLookup::Found { name, .. } => name.to_string(),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn test_root_route() {
        assert_eq!(found_name(router().lookup(&Method::GET, "/")), "root");
    }

    #[test]
    fn test_param_extraction() {
        let router = router();
        match router.lookup(&Method::GET, "/users/7/posts/99") {
            RouteLookup::Found { params, pattern, .. } => {
                assert_eq!(params["id"], "7");
                assert_eq!(params["post"], "99");
                assert_eq!(pattern, "/users/:id/posts/:post");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_params_percent_decoded() {
        match router().lookup(&Method::GET, "/hello%20world") {
            RouteLookup::Found { params, .. } => assert_eq!(params["age"], "hello world"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_trailing_slash_ignored() {
        assert_eq!(found_name(router().lookup(&Method::GET, "/30/")), "age");
    }

    #[test]
    fn test_literal_route_beats_earlier_param_route() {
        let mut router = router();
        router
            .add_route(HttpMethod::Get, "/status", "status", handler("status"))
            .unwrap();

        assert_eq!(found_name(router.lookup(&Method::GET, "/status")), "status");
        assert_eq!(found_name(router.lookup(&Method::GET, "/30")), "age");
    }

    #[test]
    fn test_leftmost_literal_ranks_first() {
        let mut router = Router::new();
        router
            .add_route(HttpMethod::Get, "/:kind/latest", "any-latest", handler("any"))
            .unwrap();
        router
            .add_route(HttpMethod::Get, "/users/:id", "user", handler("user"))
            .unwrap();
        router
            .add_route(HttpMethod::Get, "/users/me", "me", handler("me"))
            .unwrap();

        assert_eq!(found_name(router.lookup(&Method::GET, "/users/me")), "me");
        assert_eq!(found_name(router.lookup(&Method::GET, "/users/latest")), "user");
        assert_eq!(found_name(router.lookup(&Method::GET, "/posts/latest")), "any-latest");
    }

    #[test]
    fn test_param_route_serves_literal_path_without_own_route() {
        // No GET "/profile" exists, so "/:age" takes it.
        assert_eq!(found_name(router().lookup(&Method::GET, "/profile")), "age");
        assert_eq!(found_name(router().lookup(&Method::POST, "/profile")), "profile");
    }

    #[test]
    fn test_method_not_allowed() {
        match router().lookup(&Method::DELETE, "/30") {
            RouteLookup::MethodNotAllowed(allowed) => assert_eq!(allowed, [HttpMethod::Get]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unsupported_verb_on_known_path() {
        assert!(matches!(
            router().lookup(&Method::OPTIONS, "/profile"),
            RouteLookup::MethodNotAllowed(_)
        ));
    }

    #[test]
    fn test_not_found() {
        assert!(matches!(
            router().lookup(&Method::GET, "/a/b/c"),
            RouteLookup::NotFound
        ));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = router();
        let err = router
            .add_route(HttpMethod::Get, "/:other", "dup", handler("dup"))
            .unwrap_err();
        assert!(matches!(err, DeclarationError::DuplicateRoute { .. }));

        // Same shape on another verb is fine.
        router
            .add_route(HttpMethod::Delete, "/:age", "delete", handler("delete"))
            .unwrap();
    }

    #[test]
    fn test_routes_listing() {
        let router = router();
        assert_eq!(router.route_count(), 4);
        let first: Vec<_> = router.routes().take(2).collect();
        assert_eq!(first, [(HttpMethod::Get, "/"), (HttpMethod::Get, "/:age")]);
    }
}
