//! # Trellis Extract
//!
//! Turns the raw pieces of a request into the positional argument list of an
//! endpoint method.
//!
//! - [`RawInput`] - Decoded query, matched path parameters and the JSON body
//! - [`ArgumentResolver`] - Extracts, validates and injects each declared argument
//! - [`ValidationFailure`] - The structured `400` returned for invalid requests
//!
//! # Example
//!
//! ```rust
//! use trellis_extract::{ArgumentResolver, RawInput};
//! use trellis_core::{ArgumentDefinition, Container};
//!
//! # tokio_test::block_on(async {
//! let resolver = ArgumentResolver::with_container(Container::new());
//! let definitions = [ArgumentDefinition::query(0, "userId")];
//!
//! let err = resolver.resolve(&definitions, &RawInput::new()).await.unwrap_err();
//! assert_eq!(err.to_string(), "Bad request: Required query \"userId\" not found");
//! # });
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod input;
mod resolver;

pub use error::{FailureKind, ResolveError, ValidationFailure, BAD_REQUEST_MESSAGE};
pub use input::RawInput;
pub use resolver::ArgumentResolver;

// Resolved argument types live in core so handlers can name them without this crate.
pub use trellis_core::{Argument, Arguments};
