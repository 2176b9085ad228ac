//! # Trellis Core
//!
//! Core types shared by every Trellis crate.
//!
//! - [`Value`] - JSON-shaped value that can also carry a structured date
//! - [`StringFormat`] - Named string formats checked on query and path arguments
//! - [`transform_json_with_dates`] - Deep conversion of ISO-8601 strings into dates
//! - [`Container`] / [`Injector`] - Typed service registry and the resolve-by-type interface
//! - [`ValidationEngine`] / [`RuleValidator`] - Body validation against a [`BodySchema`]
//! - [`EndpointRegistry`] - Declared endpoints keyed by owner type and method name
//! - [`Arguments`] - Resolved, positional handler arguments

#![doc(html_root_url = "https://docs.rs/trellis-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod arguments;
pub mod dates;
pub mod di;
pub mod endpoint;
mod error;
pub mod format;
pub mod registry;
pub mod validation;
mod value;

pub use arguments::{Argument, Arguments};
pub use dates::transform_json_with_dates;
pub use di::{Container, InjectionError, Injector, ServiceKey};
pub use endpoint::{
    ArgumentDefinition, ArgumentSource, EndpointDefinition, HttpMethod, ResponseShape,
    SourceKind,
};
pub use error::{DeclarationError, HandlerError, HandlerResult};
pub use format::{is_iso8601, is_string_satisfy_format, parse_iso8601, StringFormat};
pub use registry::{BoxFuture, EndpointRegistry, MethodHandler, OwnerKey, RegisteredEndpoint};
pub use validation::{BodySchema, FieldError, Rule, RuleValidator, Validate, ValidationEngine};
pub use value::Value;
