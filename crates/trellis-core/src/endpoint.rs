//! Endpoint and argument definitions.
//!
//! An [`EndpointDefinition`] records everything the framework needs to serve
//! one controller method: the verb, the path template, where each positional
//! argument comes from, and the declared response shape. Definitions are
//! immutable once registered.

use crate::di::ServiceKey;
use crate::format::StringFormat;
use crate::validation::BodySchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP verbs an endpoint can be declared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl HttpMethod {
    /// The order in which routes are bound at startup.
    pub const BINDING_ORDER: [HttpMethod; 5] =
        [Self::Get, Self::Post, Self::Patch, Self::Put, Self::Delete];

    /// Canonical upper-case name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether a body argument may be declared on this verb.
    pub const fn allows_body(&self) -> bool {
        !matches!(self, Self::Get | Self::Delete)
    }

    /// Converts from an `http::Method`, returning `None` for other verbs.
    pub fn from_http(method: &http::Method) -> Option<Self> {
        match *method {
            http::Method::GET => Some(Self::Get),
            http::Method::POST => Some(Self::Post),
            http::Method::PUT => Some(Self::Put),
            http::Method::PATCH => Some(Self::Patch),
            http::Method::DELETE => Some(Self::Delete),
            _ => None,
        }
    }

    /// Converts to an `http::Method`.
    pub fn to_http(&self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
            Self::Put => http::Method::PUT,
            Self::Patch => http::Method::PATCH,
            Self::Delete => http::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an argument value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Query-string key.
    Query,
    /// `:name` segment of the path template.
    PathParameter,
    /// JSON request body.
    Body,
    /// Service resolved from the injector.
    InjectedService,
}

impl SourceKind {
    /// Name used in validation messages.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::PathParameter => "parameter",
            Self::Body => "body",
            Self::InjectedService => "service",
        }
    }

    /// Sources whose raw value is a string and can be emptiness- and format-checked.
    pub const fn is_textual(&self) -> bool {
        matches!(self, Self::Query | Self::PathParameter)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The source of one argument, with its lookup key or type.
#[derive(Debug, Clone)]
pub enum ArgumentSource {
    /// Read from the query string.
    Query {
        /// Query key.
        name: String,
    },
    /// Read from the matched path.
    PathParameter {
        /// Placeholder name without the leading `:`.
        name: String,
    },
    /// Read from the JSON body and validated against `schema`.
    Body {
        /// Declared body shape; its name identifies the body type.
        schema: BodySchema,
    },
    /// Resolved from the injector.
    InjectedService {
        /// Type to resolve.
        key: ServiceKey,
    },
}

impl ArgumentSource {
    /// The kind of source.
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Query { .. } => SourceKind::Query,
            Self::PathParameter { .. } => SourceKind::PathParameter,
            Self::Body { .. } => SourceKind::Body,
            Self::InjectedService { .. } => SourceKind::InjectedService,
        }
    }

    /// Lookup key for query and path sources, type name for the others.
    pub fn name(&self) -> &str {
        match self {
            Self::Query { name } | Self::PathParameter { name } => name,
            Self::Body { schema } => schema.name(),
            Self::InjectedService { key } => key.short_name(),
        }
    }
}

/// One positional argument of an endpoint method.
#[derive(Debug, Clone)]
pub struct ArgumentDefinition {
    /// Zero-based position in the handler's argument list.
    pub index: usize,
    /// Where the value comes from.
    pub source: ArgumentSource,
    /// Whether an empty value fails the request. Only checked for query and path sources.
    pub required: bool,
    /// Format the raw string must satisfy.
    pub format: Option<StringFormat>,
}

impl ArgumentDefinition {
    /// A required query argument.
    pub fn query(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            source: ArgumentSource::Query { name: name.into() },
            required: true,
            format: None,
        }
    }

    /// A required path argument.
    pub fn path(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            source: ArgumentSource::PathParameter { name: name.into() },
            required: true,
            format: None,
        }
    }

    /// A body argument.
    pub fn body(index: usize, schema: BodySchema) -> Self {
        Self {
            index,
            source: ArgumentSource::Body { schema },
            required: true,
            format: None,
        }
    }

    /// An injected service argument.
    pub fn service(index: usize, key: ServiceKey) -> Self {
        Self {
            index,
            source: ArgumentSource::InjectedService { key },
            required: false,
            format: None,
        }
    }

    /// Marks the argument optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Attaches a string format.
    pub fn with_format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Kind of the source.
    pub const fn kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Name of the source.
    pub fn name(&self) -> &str {
        self.source.name()
    }
}

/// Declared response type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseShape {
    /// Short type name.
    pub type_name: String,
    /// Whether the handler returns a list of `type_name`.
    pub is_array: bool,
}

impl ResponseShape {
    /// A single `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self {
            type_name: crate::di::short_type_name(std::any::type_name::<T>()).to_string(),
            is_array: false,
        }
    }

    /// A list of `T`.
    pub fn many<T: ?Sized>() -> Self {
        Self {
            is_array: true,
            ..Self::of::<T>()
        }
    }
}

impl Default for ResponseShape {
    fn default() -> Self {
        Self {
            type_name: "Value".to_string(),
            is_array: false,
        }
    }
}

/// Everything declared about one endpoint method.
#[derive(Debug, Clone)]
pub struct EndpointDefinition {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Path template with `:name` placeholders.
    pub path: String,
    /// Arguments, sorted by index once registered.
    pub arguments: Vec<ArgumentDefinition>,
    /// Declared response type.
    pub response: ResponseShape,
}

impl EndpointDefinition {
    /// Creates a definition with no arguments.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            arguments: Vec::new(),
            response: ResponseShape::default(),
        }
    }

    /// Adds an argument.
    pub fn with_argument(mut self, argument: ArgumentDefinition) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Sets the response shape.
    pub fn with_response(mut self, response: ResponseShape) -> Self {
        self.response = response;
        self
    }

    /// Whether any argument reads the request body.
    pub fn reads_body(&self) -> bool {
        self.arguments.iter().any(|a| a.kind() == SourceKind::Body)
    }

    /// Placeholder names of the path template, in order.
    pub fn path_params(&self) -> impl Iterator<Item = &str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix(':'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_order() {
        let names: Vec<_> = HttpMethod::BINDING_ORDER.iter().map(HttpMethod::as_str).collect();
        assert_eq!(names, ["GET", "POST", "PATCH", "PUT", "DELETE"]);
    }

    #[test]
    fn test_allows_body() {
        assert!(!HttpMethod::Get.allows_body());
        assert!(!HttpMethod::Delete.allows_body());
        assert!(HttpMethod::Post.allows_body());
        assert!(HttpMethod::Put.allows_body());
        assert!(HttpMethod::Patch.allows_body());
    }

    #[test]
    fn test_http_method_conversion() {
        for method in HttpMethod::BINDING_ORDER {
            assert_eq!(HttpMethod::from_http(&method.to_http()), Some(method));
        }
        assert_eq!(HttpMethod::from_http(&http::Method::OPTIONS), None);
    }

    #[test]
    fn test_source_kind_names() {
        assert_eq!(SourceKind::Query.to_string(), "query");
        assert_eq!(SourceKind::PathParameter.to_string(), "parameter");
        assert_eq!(SourceKind::Body.to_string(), "body");
        assert_eq!(SourceKind::InjectedService.to_string(), "service");
    }

    #[test]
    fn test_argument_defaults() {
        let query = ArgumentDefinition::query(0, "userId");
        assert!(query.required);
        assert_eq!(query.kind(), SourceKind::Query);
        assert_eq!(query.name(), "userId");

        struct Timer;
        let service = ArgumentDefinition::service(1, ServiceKey::of::<Timer>());
        assert!(!service.required);
        assert_eq!(service.name(), "Timer");

        let body = ArgumentDefinition::body(2, BodySchema::new("BodyRequest"));
        assert_eq!(body.name(), "BodyRequest");
    }

    #[test]
    fn test_response_shape() {
        struct Profile;
        assert_eq!(ResponseShape::of::<Profile>().type_name, "Profile");
        assert!(ResponseShape::many::<Profile>().is_array);
    }

    #[test]
    fn test_path_params() {
        let def = EndpointDefinition::new(HttpMethod::Get, "/users/:id/posts/:post");
        assert_eq!(def.path_params().collect::<Vec<_>>(), ["id", "post"]);
    }

    #[test]
    fn test_reads_body() {
        let def = EndpointDefinition::new(HttpMethod::Delete, "/profile/:id")
            .with_argument(ArgumentDefinition::path(0, "id"));
        assert!(!def.reads_body());

        let def = EndpointDefinition::new(HttpMethod::Post, "/profile")
            .with_argument(ArgumentDefinition::body(0, BodySchema::new("Profile")));
        assert!(def.reads_body());
    }
}
