//! Application assembly and startup.
//!
//! An [`Application`] owns the registered endpoints, the service container
//! and the background services. [`Application::start`] binds the routes,
//! waits for every background service to start and only then opens the
//! listening socket.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use trellis_config::{AppConfig, ConfigError};
use trellis_core::di::ServiceInstance;
use trellis_core::{Container, EndpointRegistry, RuleValidator, ServiceKey, ValidationEngine};
use trellis_extract::ArgumentResolver;
use trellis_server::{BackgroundService, Lifecycle, RouteBinder, Router, Server, ShutdownSignal};

use crate::controller::{Controller, Routes};
use crate::error::ApplicationError;

type RegisterFn = Box<dyn FnOnce(&mut EndpointRegistry) -> Vec<trellis_core::DeclarationError> + Send>;

/// A controller instance waiting to be registered.
pub struct ControllerRegistration {
    type_name: &'static str,
    register: RegisterFn,
}

impl ControllerRegistration {
    /// Wraps a controller instance.
    pub fn new<C: Controller>(controller: C) -> Self {
        Self {
            type_name: std::any::type_name::<C>(),
            register: Box::new(move |registry| {
                let mut routes = Routes::new(Arc::new(controller));
                C::routes(&mut routes);
                routes.register_into(registry)
            }),
        }
    }
}

impl fmt::Debug for ControllerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRegistration")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// A background service waiting to be registered.
///
/// The service is both started by the lifecycle and injectable by type.
pub struct ServiceRegistration {
    key: ServiceKey,
    instance: ServiceInstance,
    service: Arc<dyn BackgroundService>,
}

impl ServiceRegistration {
    /// Wraps a background service instance.
    pub fn new<S: BackgroundService>(service: S) -> Self {
        let service = Arc::new(service);
        Self {
            key: ServiceKey::of::<S>(),
            instance: Arc::clone(&service) as ServiceInstance,
            service,
        }
    }
}

impl fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Options for [`create_application`].
#[derive(Debug, Default)]
pub struct ApplicationOptions {
    /// Controllers whose endpoints are served.
    pub controllers: Vec<ControllerRegistration>,
    /// Services started before the server listens.
    pub background_services: Vec<ServiceRegistration>,
    /// Runtime configuration.
    pub config: AppConfig,
}

/// Builds an application from options.
///
/// # Errors
///
/// Returns `ApplicationError::Declaration` for the first invalid endpoint,
/// or `ApplicationError::Config` if the configuration is invalid.
///
/// # Example
///
/// ```
/// use trellis::{create_application, ApplicationOptions};
///
/// let application = create_application(ApplicationOptions::default()).unwrap();
/// assert_eq!(application.endpoint_count(), 0);
/// ```
pub fn create_application(options: ApplicationOptions) -> Result<Application, ApplicationError> {
    let builder = Application::builder().config(options.config);
    let builder = options
        .controllers
        .into_iter()
        .fold(builder, ApplicationBuilder::controller_registration);
    options
        .background_services
        .into_iter()
        .fold(builder, ApplicationBuilder::service_registration)
        .build()
}

/// Fluent builder for [`Application`].
#[must_use]
pub struct ApplicationBuilder {
    registry: EndpointRegistry,
    container: Container,
    lifecycle: Lifecycle,
    config: AppConfig,
    validator: Arc<dyn ValidationEngine>,
    errors: Vec<trellis_core::DeclarationError>,
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self {
            registry: EndpointRegistry::new(),
            container: Container::new(),
            lifecycle: Lifecycle::new(),
            config: AppConfig::default(),
            validator: Arc::new(RuleValidator),
            errors: Vec::new(),
        }
    }
}

impl ApplicationBuilder {
    /// Registers a controller's endpoints.
    pub fn controller<C: Controller>(self, controller: C) -> Self {
        self.controller_registration(ControllerRegistration::new(controller))
    }

    fn controller_registration(mut self, registration: ControllerRegistration) -> Self {
        let errors = (registration.register)(&mut self.registry);
        for error in &errors {
            tracing::error!(controller = registration.type_name, error = %error, "Invalid endpoint declaration");
        }
        self.errors.extend(errors);
        self
    }

    /// Registers a background service. It is also injectable by type.
    pub fn background_service<S: BackgroundService>(self, service: S) -> Self {
        self.service_registration(ServiceRegistration::new(service))
    }

    fn service_registration(mut self, registration: ServiceRegistration) -> Self {
        self.container
            .register_erased(registration.key, registration.instance);
        self.lifecycle.push(registration.service);
        self
    }

    /// Registers a plain injectable service.
    pub fn service<T: Send + Sync + 'static>(mut self, service: T) -> Self {
        self.container.register_value(service);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the body validation engine.
    pub fn validator(mut self, validator: Arc<dyn ValidationEngine>) -> Self {
        self.validator = validator;
        self
    }

    /// Finishes assembly.
    ///
    /// # Errors
    ///
    /// Returns the first declaration error, or a configuration error.
    pub fn build(mut self) -> Result<Application, ApplicationError> {
        if !self.errors.is_empty() {
            return Err(self.errors.swap_remove(0).into());
        }
        self.config.validate()?;

        let lifecycle = self
            .lifecycle
            .startup_timeout(self.config.lifecycle.startup_timeout());
        let resolver = ArgumentResolver::new(Arc::new(self.container), self.validator);

        Ok(Application {
            registry: self.registry,
            resolver: Arc::new(resolver),
            lifecycle,
            config: self.config,
        })
    }
}

/// An assembled application.
pub struct Application {
    registry: EndpointRegistry,
    resolver: Arc<ArgumentResolver>,
    lifecycle: Lifecycle,
    config: AppConfig,
}

impl Application {
    /// Creates a builder.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Installs logging and metrics from the telemetry section.
    ///
    /// Safe to call more than once; later logging installs are ignored.
    pub fn init_telemetry(&self) -> Result<(), ApplicationError> {
        trellis_telemetry::init_telemetry(&self.config.telemetry.to_telemetry_config())?;
        Ok(())
    }

    /// Number of registered endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.registry.len()
    }

    /// Binds every endpoint into a fresh router.
    ///
    /// # Errors
    ///
    /// Returns `ApplicationError::Declaration` if two endpoints share a route.
    pub fn router(&self) -> Result<Router, ApplicationError> {
        let mut router = Router::new();
        RouteBinder::bind(
            &self.registry,
            Arc::clone(&self.resolver),
            &mut router,
            self.config.server.to_server_config().resolve_timeout(),
        )?;
        Ok(router)
    }

    /// Builds a server without starting background services or binding.
    ///
    /// Used with the in-memory test client.
    pub fn into_server(self) -> Result<Server, ApplicationError> {
        let router = self.router()?;
        Ok(Server::new(self.config.server.to_server_config(), router))
    }

    /// Starts on the configured `server.http_addr`, port and all.
    ///
    /// The address defaults to `0.0.0.0:3000`.
    pub async fn start_default(self) -> Result<RunningApplication, ApplicationError> {
        self.launch(None, ShutdownSignal::new()).await
    }

    /// Starts the application on `port` of the configured host.
    ///
    /// Routes are bound first, then every background service start hook is
    /// awaited, and only then is the socket bound. Port `0` picks a free port.
    ///
    /// # Errors
    ///
    /// Returns the first failing step's error. A lifecycle failure means the
    /// socket was never bound.
    pub async fn start(self, port: u16) -> Result<RunningApplication, ApplicationError> {
        self.launch(Some(port), ShutdownSignal::new()).await
    }

    /// Like [`start_default`](Self::start_default), stopping when `shutdown`
    /// triggers.
    ///
    /// Pass [`ShutdownSignal::with_os_signals`] to stop on SIGTERM or Ctrl-C.
    pub async fn start_with_shutdown(
        self,
        shutdown: ShutdownSignal,
    ) -> Result<RunningApplication, ApplicationError> {
        self.launch(None, shutdown).await
    }

    async fn launch(
        self,
        port: Option<u16>,
        shutdown: ShutdownSignal,
    ) -> Result<RunningApplication, ApplicationError> {
        let span = tracing::info_span!("application", service = %self.config.telemetry.service_name);
        async move {
            let router = self.router()?;

            tracing::info!(services = self.lifecycle.len(), "Starting background services");
            self.lifecycle.run_all().await?;

            let mut server_config = self.config.server.to_server_config();
            if let Some(port) = port {
                server_config = server_config
                    .with_port(port)
                    .map_err(|e| ConfigError::invalid_value("server.http_addr", e.to_string()))?;
            }
            let server = Server::new(server_config, router);
            let listener = server.bind().await.map_err(ApplicationError::Bind)?;
            let local_addr = listener
                .local_addr()
                .map_err(|e| ApplicationError::Bind(e.into()))?;

            let task = tokio::spawn(
                server
                    .run_with_shutdown(listener, shutdown.clone())
                    .in_current_span(),
            );

            tracing::info!(%local_addr, "Application started");
            Ok::<_, ApplicationError>(RunningApplication {
                local_addr,
                shutdown,
                task,
            })
        }
        .instrument(span)
        .await
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("endpoints", &self.registry.len())
            .field("background_services", &self.lifecycle.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A started application.
#[derive(Debug)]
pub struct RunningApplication {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    task: JoinHandle<Result<(), trellis_server::ServerError>>,
}

impl RunningApplication {
    /// The bound address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that stops the server when triggered.
    #[must_use]
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Stops accepting connections and drains the open ones.
    pub async fn shutdown(self) -> Result<(), ApplicationError> {
        self.shutdown.trigger();
        self.wait().await
    }

    /// Waits for the server to stop.
    pub async fn wait(self) -> Result<(), ApplicationError> {
        self.task.await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use trellis_core::{Arguments, DeclarationError, HandlerError};
    use trellis_server::LifecycleError;

    use crate::controller::Arg;

    struct Items;

    impl Controller for Items {
        fn routes(routes: &mut Routes<Self>) {
            routes
                .get("list", "/items")
                .returns_many::<String>()
                .handle(|_this, _args| async { Ok::<_, HandlerError>(vec!["a"]) });
        }
    }

    struct Broken;

    impl Controller for Broken {
        fn routes(routes: &mut Routes<Self>) {
            routes
                .get("show", "/items/:id")
                .arg(Arg::path("slug"))
                .handle(|_this, args: Arguments| async move {
                    Ok::<_, HandlerError>(args.text(0)?.to_string())
                });
        }
    }

    struct Failing;

    #[async_trait]
    impl BackgroundService for Failing {
        async fn on_start(&self) -> Result<(), LifecycleError> {
            Err(LifecycleError::hook("cache unavailable"))
        }
    }

    #[test]
    fn test_build_registers_endpoints() {
        let application = Application::builder().controller(Items).build().unwrap();
        assert_eq!(application.endpoint_count(), 1);
        assert_eq!(application.router().unwrap().route_count(), 1);
    }

    #[test]
    fn test_build_surfaces_declaration_error() {
        let err = Application::builder().controller(Broken).build().unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Declaration(DeclarationError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.server.max_body_bytes = 0;
        let err = Application::builder().config(config).build().unwrap_err();
        assert!(matches!(err, ApplicationError::Config(_)));
    }

    #[test]
    fn test_create_application_from_options() {
        let application = create_application(ApplicationOptions {
            controllers: vec![ControllerRegistration::new(Items)],
            background_services: vec![ServiceRegistration::new(Failing)],
            config: AppConfig::default(),
        })
        .unwrap();
        assert_eq!(application.endpoint_count(), 1);
        assert_eq!(application.lifecycle.len(), 1);
    }

    #[tokio::test]
    async fn test_start_fails_before_binding_when_service_fails() {
        let application = Application::builder()
            .controller(Items)
            .background_service(Failing)
            .build()
            .unwrap();

        let err = application.start(0).await.unwrap_err();
        assert!(matches!(
            err,
            ApplicationError::Lifecycle(LifecycleError::StartupFailed { ref reason, .. })
                if reason == "cache unavailable"
        ));
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let mut config = AppConfig::default();
        config.server.http_addr = "127.0.0.1:0".into();
        let application = Application::builder()
            .controller(Items)
            .config(config)
            .build()
            .unwrap();

        let running = application.start(0).await.unwrap();
        assert_ne!(running.local_addr().port(), 0);
        running.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_start_default_keeps_configured_port() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut config = AppConfig::default();
        config.server.http_addr = format!("127.0.0.1:{port}");
        let application = Application::builder()
            .controller(Items)
            .config(config)
            .build()
            .unwrap();

        let running = application.start_default().await.unwrap();
        assert_eq!(running.local_addr().port(), port);
        running.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_external_shutdown_signal_stops_server() {
        let mut config = AppConfig::default();
        config.server.http_addr = "127.0.0.1:0".into();
        let application = Application::builder()
            .controller(Items)
            .config(config)
            .build()
            .unwrap();

        let signal = ShutdownSignal::new();
        let running = application.start_with_shutdown(signal.clone()).await.unwrap();
        signal.trigger();
        running.wait().await.unwrap();
    }
}
