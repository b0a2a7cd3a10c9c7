//! IdP Gateway - Main Entry Point
//!
//! Fetches the realm signing key, then serves HTTP. A failed key fetch ends
//! the process with status 1 before any port is bound.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use gateway_common::{TracingConfig, init_tracing};
use tokio::net::TcpListener;
use tracing::{error, info};

use idp_gateway::auth::AuthState;
use idp_gateway::idp::IdpClient;
use idp_gateway::middleware::apply_http_stack;
use idp_gateway::observability::GatewayMetrics;
use idp_gateway::shutdown::{serve_with_graceful_shutdown, wait_for_signal};
use idp_gateway::{AppState, BootstrapError, Config, JwtValidator, bootstrap, create_router};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(cause) = e.downcast_ref::<BootstrapError>() {
                error!(
                    error_type = cause.category(),
                    error = %cause,
                    "Failed to fetch realm signing key"
                );
            } else {
                error!(error = ?e, "IdP gateway failed");
            }
            eprintln!("idp-gateway: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let tracing_config = TracingConfig::default()
        .with_service_name("idp-gateway")
        .with_log_level(config.log_level.clone())
        .with_json_output(config.log_json);
    init_tracing(&tracing_config).context("failed to initialize tracing")?;

    info!(realm = %config.realm, idp = %config.idp_base_url, "Starting IdP gateway");

    let metrics = Arc::new(GatewayMetrics::new().context("failed to register metrics")?);

    let (key, elapsed) = bootstrap(&config).await?;
    metrics.bootstrap_seconds.set(elapsed.as_secs_f64());

    let validator = JwtValidator::new(Arc::new(key)).with_client_roles(config.client_id.clone());
    let idp = IdpClient::new(&config, Arc::clone(&metrics)).context("failed to build IdP client")?;

    let state = AppState {
        auth: AuthState {
            validator: Arc::new(validator),
            metrics: Arc::clone(&metrics),
        },
        idp: Arc::new(idp),
        metrics,
    };
    let app = apply_http_stack(create_router(state), config.request_timeout());

    let listener = TcpListener::bind(config.listen_addr())
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr()))?;
    info!(addr = %config.listen_addr(), "IdP gateway listening");

    serve_with_graceful_shutdown(listener, app, wait_for_signal(), config.shutdown_timeout())
        .await
        .context("server error")?;

    info!("IdP gateway stopped");
    Ok(())
}
