//! Dependency injection container.
//!
//! Services are registered once while the application is assembled and
//! resolved by type while requests are served. The container is handed to the
//! argument resolver as an [`Injector`]; there is no process-wide instance.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::di::{Container, ServiceKey};
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! let mut container = Container::new();
//! container.register(Arc::new(Database { url: "postgres://localhost/db".to_string() }));
//!
//! let db: Arc<Database> = container.resolve().unwrap();
//! assert_eq!(db.url, "postgres://localhost/db");
//! assert!(container.keys().any(|k| k == &ServiceKey::of::<Database>()));
//! ```

use async_trait::async_trait;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use thiserror::Error;

/// A type-erased service instance.
pub type ServiceInstance = Arc<dyn Any + Send + Sync>;

/// Identifies a service by its Rust type.
#[derive(Debug, Clone, Copy)]
pub struct ServiceKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl ServiceKey {
    /// Returns the key for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The `TypeId` of the service.
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name.
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Type name without its module path.
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.type_name)
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Strips the module path from a type name, keeping generic arguments intact.
pub fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

/// Error when a dependency cannot be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to inject {type_name}: {reason}")]
pub struct InjectionError {
    /// The type name that could not be resolved.
    pub type_name: &'static str,
    /// The reason for the failure.
    pub reason: String,
}

impl InjectionError {
    /// Creates a new injection error for a missing service.
    pub fn not_registered<T: ?Sized>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: "service not registered".to_string(),
        }
    }

    /// Creates an error for a missing service identified by key.
    pub fn missing(key: &ServiceKey) -> Self {
        Self {
            type_name: key.type_name(),
            reason: "service not registered".to_string(),
        }
    }

    /// Creates a new injection error with a custom reason.
    pub fn custom<T: ?Sized>(reason: impl Into<String>) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            reason: reason.into(),
        }
    }
}

/// Resolves service instances by type.
///
/// Resolution may be asynchronous so that implementations can build services
/// lazily or fetch them from elsewhere.
#[async_trait]
pub trait Injector: Send + Sync {
    /// Resolves the service identified by `key`.
    async fn resolve(&self, key: &ServiceKey) -> Result<ServiceInstance, InjectionError>;
}

/// A dependency injection container.
///
/// The container stores Arc-wrapped services keyed by their type.
/// Services are registered once at startup and resolved by type in handlers.
///
/// # Thread Safety
///
/// The container is `Send + Sync` and is only read once serving starts.
#[derive(Default, Clone)]
pub struct Container {
    services: HashMap<ServiceKey, ServiceInstance>,
}

impl Container {
    /// Creates a new empty container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            services: HashMap::new(),
        }
    }

    /// Registers a service in the container, replacing any previous one of the same type.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.services.insert(ServiceKey::of::<T>(), service);
    }

    /// Registers an owned value.
    pub fn register_value<T: Send + Sync + 'static>(&mut self, service: T) {
        self.register(Arc::new(service));
    }

    /// Registers an already type-erased instance under `key`.
    pub fn register_erased(&mut self, key: ServiceKey, service: ServiceInstance) {
        self.services.insert(key, service);
    }

    /// Resolves a service from the container.
    ///
    /// Returns `None` if the service is not registered.
    #[must_use]
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services
            .get(&ServiceKey::of::<T>())
            .and_then(|s| s.clone().downcast::<T>().ok())
    }

    /// Resolves a service or returns an error.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectionError> {
        self.resolve().ok_or_else(InjectionError::not_registered::<T>)
    }

    /// Resolves a type-erased instance by key.
    pub fn resolve_key(&self, key: &ServiceKey) -> Option<ServiceInstance> {
        self.services.get(key).cloned()
    }

    /// Checks if a service is registered.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.services.contains_key(&ServiceKey::of::<T>())
    }

    /// Iterates over registered service keys in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.services.keys()
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no services are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

#[async_trait]
impl Injector for Container {
    async fn resolve(&self, key: &ServiceKey) -> Result<ServiceInstance, InjectionError> {
        self.resolve_key(key)
            .ok_or_else(|| InjectionError::missing(key))
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestService {
        value: String,
    }

    impl TestService {
        fn new(value: &str) -> Self {
            Self {
                value: value.to_string(),
            }
        }
    }

    #[test]
    fn test_container_new() {
        let container = Container::new();
        assert!(container.is_empty());
        assert_eq!(container.len(), 0);
    }

    #[test]
    fn test_container_register_and_resolve() {
        let mut container = Container::new();
        container.register(Arc::new(TestService::new("hello")));

        let service: Option<Arc<TestService>> = container.resolve();
        assert_eq!(service.unwrap().value, "hello");
    }

    #[test]
    fn test_container_register_value() {
        let mut container = Container::new();
        container.register_value(TestService::new("owned"));
        assert_eq!(container.resolve::<TestService>().unwrap().value, "owned");
    }

    #[test]
    fn test_container_resolve_required_missing() {
        let container = Container::new();
        let err = container.resolve_required::<TestService>().unwrap_err();
        assert!(err.to_string().contains("TestService"));
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn test_container_replaces_same_type() {
        let mut container = Container::new();
        container.register_value(TestService::new("first"));
        container.register_value(TestService::new("second"));
        assert_eq!(container.len(), 1);
        assert_eq!(container.resolve::<TestService>().unwrap().value, "second");
    }

    #[tokio::test]
    async fn test_injector_resolves_by_key() {
        let mut container = Container::new();
        container.register_value(TestService::new("erased"));

        let instance = Injector::resolve(&container, &ServiceKey::of::<TestService>())
            .await
            .unwrap();
        let typed = instance.downcast::<TestService>().unwrap();
        assert_eq!(typed.value, "erased");
    }

    #[tokio::test]
    async fn test_injector_missing_key() {
        let container = Container::new();
        let err = Injector::resolve(&container, &ServiceKey::of::<TestService>())
            .await
            .unwrap_err();
        assert!(err.type_name.ends_with("TestService"));
    }

    #[test]
    fn test_service_key_equality_ignores_name() {
        assert_eq!(ServiceKey::of::<TestService>(), ServiceKey::of::<TestService>());
        assert_ne!(ServiceKey::of::<TestService>(), ServiceKey::of::<String>());
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(ServiceKey::of::<TestService>().short_name(), "TestService");
        assert_eq!(short_type_name("a::b::Wrapper<c::D>"), "Wrapper<c::D>");
        assert_eq!(short_type_name("u32"), "u32");
    }

    #[test]
    fn test_container_debug() {
        let mut container = Container::new();
        container.register_value(TestService::new("debug"));
        let debug = format!("{:?}", container);
        assert!(debug.contains("service_count"));
    }
}
