//! Endpoint registry.
//!
//! The registry maps `(owner type, method name)` to an [`EndpointDefinition`]
//! and the type-erased handler that serves it. It is filled while the
//! application is assembled and only read afterwards; there is no removal.
//!
//! Registration validates the declaration before storing it, so that every
//! endpoint that reaches the route binder can be invoked by position.

use crate::arguments::Arguments;
use crate::endpoint::{ArgumentSource, EndpointDefinition, SourceKind};
use crate::error::{DeclarationError, HandlerError};
use crate::value::Value;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased endpoint method.
///
/// The controller instance is captured by the closure; the handler receives
/// only the resolved arguments and returns the JSON value to send back.
pub type MethodHandler =
    Arc<dyn Fn(Arguments) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// Identifies the type that owns an endpoint method.
#[derive(Debug, Clone, Copy)]
pub struct OwnerKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl OwnerKey {
    /// Returns the key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Type name without its module path.
    pub fn name(&self) -> &'static str {
        crate::di::short_type_name(self.type_name)
    }

    /// The `TypeId` of the owner.
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }
}

impl PartialEq for OwnerKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for OwnerKey {}

impl fmt::Display for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A registered endpoint.
#[derive(Clone)]
pub struct RegisteredEndpoint {
    /// Owning type.
    pub owner: OwnerKey,
    /// Method name within the owner.
    pub method_name: String,
    /// The validated definition.
    pub definition: Arc<EndpointDefinition>,
    /// The method itself.
    pub handler: MethodHandler,
}

impl RegisteredEndpoint {
    /// `Owner::method`, used in logs.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.owner, self.method_name)
    }
}

impl fmt::Debug for RegisteredEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredEndpoint")
            .field("owner", &self.owner.name())
            .field("method_name", &self.method_name)
            .field("method", &self.definition.method)
            .field("path", &self.definition.path)
            .finish_non_exhaustive()
    }
}

/// Append-only table of declared endpoints.
#[derive(Default, Clone)]
pub struct EndpointRegistry {
    endpoints: Vec<RegisteredEndpoint>,
}

impl EndpointRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores an endpoint.
    ///
    /// Arguments are sorted by index before the definition is stored.
    pub fn register(
        &mut self,
        owner: OwnerKey,
        method_name: impl Into<String>,
        mut definition: EndpointDefinition,
        handler: MethodHandler,
    ) -> Result<(), DeclarationError> {
        let method_name = method_name.into();

        if self.get(&owner, &method_name).is_some() {
            return Err(DeclarationError::DuplicateEndpoint {
                owner: owner.name().to_string(),
                handler: method_name,
            });
        }

        validate_path(&definition.path)?;
        definition.arguments.sort_by_key(|a| a.index);
        validate_arguments(owner.name(), &method_name, &definition)?;

        tracing::debug!(
            owner = owner.name(),
            handler = %method_name,
            method = %definition.method,
            path = %definition.path,
            arguments = definition.arguments.len(),
            "Registered endpoint"
        );

        self.endpoints.push(RegisteredEndpoint {
            owner,
            method_name,
            definition: Arc::new(definition),
            handler,
        });
        Ok(())
    }

    /// Every endpoint in registration order.
    pub fn all_endpoints(&self) -> &[RegisteredEndpoint] {
        &self.endpoints
    }

    /// Endpoints of one owner in registration order.
    pub fn endpoints_for<'a>(
        &'a self,
        owner: &'a OwnerKey,
    ) -> impl Iterator<Item = &'a RegisteredEndpoint> + 'a {
        self.endpoints.iter().filter(move |e| &e.owner == owner)
    }

    /// Looks up one endpoint.
    pub fn get(&self, owner: &OwnerKey, method_name: &str) -> Option<&RegisteredEndpoint> {
        self.endpoints
            .iter()
            .find(|e| &e.owner == owner && e.method_name == method_name)
    }

    /// Number of endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl fmt::Debug for EndpointRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointRegistry")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

fn validate_path(path: &str) -> Result<(), DeclarationError> {
    let invalid = |reason: &str| DeclarationError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let mut seen = HashSet::new();
    for segment in path.split('/') {
        if let Some(name) = segment.strip_prefix(':') {
            if name.is_empty() {
                return Err(invalid("placeholder without a name"));
            }
            if !seen.insert(name) {
                return Err(invalid(&format!("placeholder :{name} appears twice")));
            }
        }
    }
    Ok(())
}

/// Expects `definition.arguments` sorted by index.
fn validate_arguments(
    owner: &str,
    handler: &str,
    definition: &EndpointDefinition,
) -> Result<(), DeclarationError> {
    let mut bodies = 0;
    for (position, argument) in definition.arguments.iter().enumerate() {
        if argument.index < position {
            return Err(DeclarationError::DuplicateArgument {
                owner: owner.to_string(),
                handler: handler.to_string(),
                index: argument.index,
            });
        }
        if argument.index > position {
            return Err(DeclarationError::MissingArgument {
                owner: owner.to_string(),
                handler: handler.to_string(),
                index: position,
            });
        }

        if argument.format.is_some() && !argument.kind().is_textual() {
            return Err(DeclarationError::FormatNotApplicable {
                owner: owner.to_string(),
                handler: handler.to_string(),
                kind: argument.kind(),
                name: argument.name().to_string(),
            });
        }

        match &argument.source {
            ArgumentSource::Body { .. } => {
                if !definition.method.allows_body() {
                    return Err(DeclarationError::BodyNotAllowed {
                        owner: owner.to_string(),
                        handler: handler.to_string(),
                        method: definition.method,
                        path: definition.path.clone(),
                    });
                }
                bodies += 1;
                if bodies > 1 {
                    return Err(DeclarationError::MultipleBodies {
                        owner: owner.to_string(),
                        handler: handler.to_string(),
                    });
                }
            }
            ArgumentSource::PathParameter { name } => {
                if !definition.path_params().any(|p| p == name) {
                    return Err(DeclarationError::InvalidPath {
                        path: definition.path.clone(),
                        reason: format!(
                            "{} argument \"{name}\" has no matching placeholder",
                            SourceKind::PathParameter
                        ),
                    });
                }
            }
            ArgumentSource::Query { .. } | ArgumentSource::InjectedService { .. } => {}
        }
    }
    Ok(())
}
