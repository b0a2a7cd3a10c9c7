//! Observability: Prometheus metrics.
//!
//! Logging is initialized through `gateway_common::init_tracing`.

pub mod metrics;

pub use metrics::GatewayMetrics;
