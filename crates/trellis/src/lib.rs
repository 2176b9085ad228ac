//! # Trellis
//!
//! **Metadata-driven HTTP routing and request binding**
//!
//! Controllers declare their endpoints and the source of every handler
//! argument. At startup Trellis turns each declaration into a request
//! handler that:
//!
//! - extracts query, path and body values
//! - checks required values and string formats
//! - converts ISO-8601 strings in the body into dates and validates the body
//! - injects services by type
//! - serializes the handler's return value as JSON
//!
//! Background services finish their start hooks before the server accepts
//! traffic.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trellis::prelude::*;
//!
//! struct HealthController;
//!
//! impl Controller for HealthController {
//!     fn routes(routes: &mut Routes<Self>) {
//!         routes
//!             .get("health", "/health")
//!             .handle(|_this: Arc<Self>, _args| async { Ok::<_, HandlerError>("ok") });
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ApplicationError> {
//!     let running = Application::builder()
//!         .controller(HealthController)
//!         .build()?
//!         .start(3000)
//!         .await?;
//!
//!     running.wait().await
//! }
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! Request → Router → Argument resolution → Handler → JSON
//!                       │
//!                       ├─ 400 ValidationFailure
//!                       ├─ 500 injection or handler error
//!                       └─ 504 resolution timeout
//! ```

#![doc(html_root_url = "https://docs.rs/trellis/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod application;
mod controller;
mod error;

pub use application::{
    create_application, Application, ApplicationBuilder, ApplicationOptions,
    ControllerRegistration, RunningApplication, ServiceRegistration,
};
pub use controller::{Arg, Controller, EndpointBuilder, Routes};
pub use error::ApplicationError;

pub use trellis_config as config;
pub use trellis_core as core;
pub use trellis_extract as extract;
pub use trellis_server as server;
pub use trellis_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// ```rust
/// use trellis::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        create_application, Application, ApplicationError, ApplicationOptions, Arg, Controller,
        ControllerRegistration, Routes, ServiceRegistration,
    };

    pub use trellis_config::{AppConfig, ConfigLoader};
    pub use trellis_core::validation::{BodySchema, Rule, Validate};
    pub use trellis_core::{Arguments, HandlerError, HandlerResult, StringFormat};
    pub use trellis_server::{BackgroundService, LifecycleError, ShutdownSignal};

    pub use async_trait::async_trait;
}
