//! Controller declarations.
//!
//! A controller lists its endpoints in [`Controller::routes`]. Each endpoint
//! names a method, an HTTP verb and path, the positional sources of its
//! arguments and the async function that serves it.
//!
//! ```
//! use std::sync::Arc;
//! use trellis::prelude::*;
//!
//! struct UserController;
//!
//! impl Controller for UserController {
//!     fn routes(routes: &mut Routes<Self>) {
//!         routes
//!             .get("get_profile", "/:age")
//!             .returns::<String>()
//!             .arg(Arg::path("age"))
//!             .arg(Arg::query("userId").optional().format(StringFormat::Date))
//!             .handle(|_this: Arc<Self>, args: Arguments| async move {
//!                 let age = args.text(0)?.to_string();
//!                 Ok::<_, HandlerError>(age)
//!             });
//!     }
//! }
//! ```

use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use trellis_core::validation::Validate;
use trellis_core::{
    ArgumentDefinition, ArgumentSource, Arguments, DeclarationError, EndpointDefinition,
    EndpointRegistry, HandlerError, HttpMethod, MethodHandler, OwnerKey, ResponseShape,
    ServiceKey, StringFormat, Value,
};

/// A type whose methods are HTTP endpoints.
pub trait Controller: Send + Sync + Sized + 'static {
    /// Declares the controller's endpoints.
    fn routes(routes: &mut Routes<Self>);
}

/// The source of one handler argument, before it is given a position.
#[derive(Debug, Clone)]
#[must_use]
pub struct Arg {
    source: ArgumentSource,
    required: bool,
    format: Option<StringFormat>,
}

impl Arg {
    /// A query string value, required unless marked [`optional`](Self::optional).
    pub fn query(name: impl Into<String>) -> Self {
        Self {
            source: ArgumentSource::Query { name: name.into() },
            required: true,
            format: None,
        }
    }

    /// A `:name` path segment.
    pub fn path(name: impl Into<String>) -> Self {
        Self {
            source: ArgumentSource::PathParameter { name: name.into() },
            required: true,
            format: None,
        }
    }

    /// The JSON body, validated against `T`'s schema.
    pub fn body<T: Validate>() -> Self {
        Self {
            source: ArgumentSource::Body { schema: T::schema() },
            required: true,
            format: None,
        }
    }

    /// A service resolved from the container by type.
    pub fn service<T: Send + Sync + 'static>() -> Self {
        Self {
            source: ArgumentSource::InjectedService {
                key: ServiceKey::of::<T>(),
            },
            required: false,
            format: None,
        }
    }

    /// Lets the value be absent or empty.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Requires the raw string to satisfy `format` when present.
    pub fn format(mut self, format: StringFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn at(self, index: usize) -> ArgumentDefinition {
        ArgumentDefinition {
            index,
            source: self.source,
            required: self.required,
            format: self.format,
        }
    }
}

struct DeclaredEndpoint {
    method_name: String,
    definition: EndpointDefinition,
    handler: MethodHandler,
}

/// Collects the endpoints of one controller.
pub struct Routes<C> {
    controller: Arc<C>,
    endpoints: Vec<DeclaredEndpoint>,
    errors: Vec<DeclarationError>,
}

impl<C: Controller> Routes<C> {
    pub(crate) fn new(controller: Arc<C>) -> Self {
        Self {
            controller,
            endpoints: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Declares a GET endpoint.
    pub fn get(&mut self, method_name: &str, path: &str) -> EndpointBuilder<'_, C> {
        self.endpoint(HttpMethod::Get, method_name, path)
    }

    /// Declares a POST endpoint.
    pub fn post(&mut self, method_name: &str, path: &str) -> EndpointBuilder<'_, C> {
        self.endpoint(HttpMethod::Post, method_name, path)
    }

    /// Declares a PUT endpoint.
    pub fn put(&mut self, method_name: &str, path: &str) -> EndpointBuilder<'_, C> {
        self.endpoint(HttpMethod::Put, method_name, path)
    }

    /// Declares a PATCH endpoint.
    pub fn patch(&mut self, method_name: &str, path: &str) -> EndpointBuilder<'_, C> {
        self.endpoint(HttpMethod::Patch, method_name, path)
    }

    /// Declares a DELETE endpoint.
    pub fn delete(&mut self, method_name: &str, path: &str) -> EndpointBuilder<'_, C> {
        self.endpoint(HttpMethod::Delete, method_name, path)
    }

    fn endpoint(&mut self, method: HttpMethod, method_name: &str, path: &str) -> EndpointBuilder<'_, C> {
        EndpointBuilder {
            routes: self,
            method_name: method_name.to_string(),
            definition: Some(EndpointDefinition::new(method, path)),
            next_index: 0,
        }
    }

    /// Registers every declared endpoint under `C`.
    ///
    /// Returns the declaration errors raised while declaring or registering.
    pub(crate) fn register_into(self, registry: &mut EndpointRegistry) -> Vec<DeclarationError> {
        let owner = OwnerKey::of::<C>();
        let mut errors = self.errors;
        for endpoint in self.endpoints {
            if let Err(e) = registry.register(
                owner,
                endpoint.method_name,
                endpoint.definition,
                endpoint.handler,
            ) {
                errors.push(e);
            }
        }
        errors
    }
}

/// Declares one endpoint. Finish with [`handle`](Self::handle).
///
/// A builder dropped without a handler records
/// [`DeclarationError::MissingHandler`].
#[must_use = "an endpoint needs a handler"]
pub struct EndpointBuilder<'r, C: Controller> {
    routes: &'r mut Routes<C>,
    method_name: String,
    definition: Option<EndpointDefinition>,
    next_index: usize,
}

impl<C: Controller> EndpointBuilder<'_, C> {
    fn with_definition(mut self, apply: impl FnOnce(EndpointDefinition) -> EndpointDefinition) -> Self {
        self.definition = self.definition.take().map(apply);
        self
    }

    /// Declares the response type.
    pub fn returns<T: ?Sized>(self) -> Self {
        self.with_definition(|d| d.with_response(ResponseShape::of::<T>()))
    }

    /// Declares a list response.
    pub fn returns_many<T: ?Sized>(self) -> Self {
        self.with_definition(|d| d.with_response(ResponseShape::many::<T>()))
    }

    /// Adds an argument at the next position.
    pub fn arg(self, arg: Arg) -> Self {
        let index = self.next_index;
        self.arg_at(index, arg)
    }

    /// Adds an argument at an explicit position.
    ///
    /// Positions may be declared in any order but must end up contiguous
    /// from zero.
    pub fn arg_at(mut self, index: usize, arg: Arg) -> Self {
        self.next_index = self.next_index.max(index + 1);
        self.with_definition(|d| d.with_argument(arg.at(index)))
    }

    /// Sets the function that serves the endpoint.
    ///
    /// The handler receives the controller and the resolved arguments. Its
    /// `Ok` value is serialized as the JSON response.
    pub fn handle<F, Fut, R, E>(mut self, handler: F)
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
        R: Serialize,
        E: Into<HandlerError>,
    {
        let Some(definition) = self.definition.take() else {
            return;
        };

        let controller = Arc::clone(&self.routes.controller);
        let handler = Arc::new(handler);
        let method: MethodHandler = Arc::new(move |args| {
            let controller = Arc::clone(&controller);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let output = handler(controller, args).await.map_err(Into::into)?;
                let json = serde_json::to_value(&output).map_err(HandlerError::Serialization)?;
                Ok(Value::from_json(&json))
            })
        });

        self.routes.endpoints.push(DeclaredEndpoint {
            method_name: std::mem::take(&mut self.method_name),
            definition,
            handler: method,
        });
    }
}

impl<C: Controller> Drop for EndpointBuilder<'_, C> {
    fn drop(&mut self) {
        if self.definition.is_some() {
            self.routes.errors.push(DeclarationError::MissingHandler {
                owner: OwnerKey::of::<C>().name().to_string(),
                handler: std::mem::take(&mut self.method_name),
            });
        }
    }
}
