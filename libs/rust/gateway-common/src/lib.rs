//! Shared library for cross-cutting concerns of the IdP gateway.
//!
//! This crate provides centralized implementations for:
//! - Classification of outbound HTTP failures
//! - HTTP client configuration and building
//! - Tracing subscriber initialization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod http;
pub mod tracing_config;

pub use error::TransportError;
pub use http::{HttpConfig, build_http_client};
pub use tracing_config::{TracingConfig, init_tracing};
