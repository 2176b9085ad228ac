//! Background services and their start hooks.
//!
//! Every registered [`BackgroundService`] gets its `on_start` hook run before
//! the listener binds. Hooks run concurrently and the server only starts once
//! all of them have settled.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use trellis_server::{BackgroundService, Lifecycle, LifecycleError};
//!
//! struct Cache;
//!
//! #[async_trait]
//! impl BackgroundService for Cache {
//!     async fn on_start(&self) -> Result<(), LifecycleError> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let lifecycle = Lifecycle::new().service(Arc::new(Cache));
//! lifecycle.run_all().await.unwrap();
//! # });
//! ```

use async_trait::async_trait;
use futures_util::future::join_all;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use trellis_core::di::short_type_name;

/// Error type for lifecycle hook failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A start hook returned an error.
    #[error("Background service '{service}' failed to start: {reason}")]
    StartupFailed {
        /// Name of the failing service.
        service: String,
        /// What went wrong.
        reason: String,
    },

    /// A start hook did not finish before the startup deadline.
    #[error("Background service '{service}' did not start within {timeout:?}")]
    StartupTimeout {
        /// Name of the slow service.
        service: String,
        /// The configured deadline.
        timeout: Duration,
    },

    /// Error raised from inside a hook.
    #[error("Lifecycle hook error: {0}")]
    Hook(String),
}

impl LifecycleError {
    /// Creates a hook error with a message.
    pub fn hook(message: impl Into<String>) -> Self {
        Self::Hook(message.into())
    }
}

/// A long-lived service started alongside the server.
#[async_trait]
pub trait BackgroundService: Send + Sync + 'static {
    /// Name used in logs and errors.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Runs once before the server accepts connections.
    async fn on_start(&self) -> Result<(), LifecycleError> {
        Ok(())
    }
}

/// A registered background service.
#[derive(Clone)]
pub struct BackgroundServiceHandle {
    name: String,
    service: Arc<dyn BackgroundService>,
}

impl BackgroundServiceHandle {
    /// Wraps a service, capturing its name.
    pub fn new(service: Arc<dyn BackgroundService>) -> Self {
        Self {
            name: service.name().to_string(),
            service,
        }
    }

    /// Returns the service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn BackgroundService> {
        &self.service
    }

    async fn start(&self, timeout: Option<Duration>) -> Result<(), LifecycleError> {
        tracing::debug!(service = %self.name, "Starting background service");

        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, self.service.on_start()).await {
                Ok(result) => result,
                Err(_) => Err(LifecycleError::StartupTimeout {
                    service: self.name.clone(),
                    timeout: limit,
                }),
            },
            None => self.service.on_start().await,
        };

        // Hook errors are attributed to the service that raised them.
        let result = result.map_err(|e| match e {
            LifecycleError::Hook(reason) => LifecycleError::StartupFailed {
                service: self.name.clone(),
                reason,
            },
            other => other,
        });

        match &result {
            Ok(()) => tracing::debug!(service = %self.name, "Background service started"),
            Err(e) => tracing::error!(service = %self.name, error = %e, "Background service failed to start"),
        }
        result
    }
}

impl fmt::Debug for BackgroundServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundServiceHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// The set of background services to start before serving.
#[derive(Clone, Default)]
#[must_use]
pub struct Lifecycle {
    services: Vec<BackgroundServiceHandle>,
    startup_timeout: Option<Duration>,
}

impl fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifecycle")
            .field("services", &self.services.iter().map(BackgroundServiceHandle::name).collect::<Vec<_>>())
            .field("startup_timeout", &self.startup_timeout)
            .finish()
    }
}

impl Lifecycle {
    /// Creates an empty lifecycle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service. Services are reported in the order they are added.
    pub fn service(mut self, service: Arc<dyn BackgroundService>) -> Self {
        self.push(service);
        self
    }

    /// Adds a service in place.
    pub fn push(&mut self, service: Arc<dyn BackgroundService>) {
        self.services.push(BackgroundServiceHandle::new(service));
    }

    /// Sets a deadline for each start hook.
    pub fn startup_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Returns the registered services.
    #[must_use]
    pub fn services(&self) -> &[BackgroundServiceHandle] {
        &self.services
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

    /// Runs every start hook concurrently and waits for all of them.
    ///
    /// A failing hook does not cancel its siblings. Once everything has
    /// settled the first failure in registration order is returned.
    ///
    /// # Errors
    ///
    /// Returns the first [`LifecycleError`] by registration order.
    pub async fn run_all(&self) -> Result<(), LifecycleError> {
        if self.services.is_empty() {
            return Ok(());
        }

        tracing::debug!(count = self.services.len(), "Starting background services");
        let results = join_all(
            self.services
                .iter()
                .map(|handle| handle.start(self.startup_timeout)),
        )
        .await;

        results.into_iter().collect()
    }
}
