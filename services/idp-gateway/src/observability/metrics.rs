//! Gateway Metrics
//!
//! Prometheus metrics for authentication outcomes, IdP passthrough calls and
//! the startup key fetch. Each instance owns its registry so tests can build
//! as many as they like.

use prometheus::{
    Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

const NAMESPACE: &str = "idp_gateway";

/// Gateway metrics
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    /// Verification outcomes by result
    pub auth_outcomes: IntCounterVec,
    /// IdP calls by operation and status
    pub idp_calls: IntCounterVec,
    /// IdP call latency by operation
    pub idp_latency: HistogramVec,
    /// Duration of the startup key fetch
    pub bootstrap_seconds: Gauge,
}

impl GatewayMetrics {
    /// Creates and registers all gateway metrics in a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let auth_outcomes = IntCounterVec::new(
            Opts::new("auth_outcomes_total", "Bearer token verification outcomes")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        registry.register(Box::new(auth_outcomes.clone()))?;

        let idp_calls = IntCounterVec::new(
            Opts::new("idp_calls_total", "Calls made to the identity provider")
                .namespace(NAMESPACE),
            &["operation", "status"],
        )?;
        registry.register(Box::new(idp_calls.clone()))?;

        let idp_latency = HistogramVec::new(
            HistogramOpts::new("idp_call_seconds", "Identity provider call latency in seconds")
                .namespace(NAMESPACE)
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["operation"],
        )?;
        registry.register(Box::new(idp_latency.clone()))?;

        let bootstrap_seconds = Gauge::with_opts(
            Opts::new("bootstrap_seconds", "Duration of the startup signing key fetch")
                .namespace(NAMESPACE),
        )?;
        registry.register(Box::new(bootstrap_seconds.clone()))?;

        Ok(Self {
            registry,
            auth_outcomes,
            idp_calls,
            idp_latency,
            bootstrap_seconds,
        })
    }

    /// Records one verification outcome
    pub fn record_auth(&self, outcome: &str) {
        self.auth_outcomes.with_label_values(&[outcome]).inc();
    }

    /// Records one IdP call
    pub fn record_idp_call(&self, operation: &str, status: &str, latency_secs: f64) {
        self.idp_calls.with_label_values(&[operation, status]).inc();
        self.idp_latency
            .with_label_values(&[operation])
            .observe(latency_secs);
    }

    /// Renders the registry in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for GatewayMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayMetrics").finish_non_exhaustive()
    }
}
