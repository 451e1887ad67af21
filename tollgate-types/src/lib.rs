//! Error taxonomy, boundary envelopes, and configuration primitives shared by
//! every tollgate crate.
//!
//! - [`TollgateError`] is the single failure type: a dotted [`ErrorKind`], a
//!   message, and free-form JSON context.
//! - [`ErrorRegistry`] is the closed catalog of kinds with their transport
//!   statuses; [`ErrorRegistry::standard`] holds the built-in catalog.
//! - [`Envelope`] is the JSON shape handed to HTTP-facing handlers.
#![warn(missing_docs)]

mod config;
mod envelope;
mod error;
mod registry;

pub use config::{CacheConfig, FanOutOptions, GatewayConfig, RateLimitConfig};
pub use envelope::{Envelope, ExtError};
pub use error::{
    ErrorKind, HasKind, Origin, REMOTE_ROOTS, TollgateError, UpstreamFamily, family_of,
    is_in_family,
};
pub use registry::{
    ErrorRegistry, KindSpec, MessageTemplate, RegistryError, UNKNOWN_KIND_STATUS, kinds,
};
