//! boneage-ui - Bone age prediction workbench
//!
//! Serves the workbench page and its JSON API, forwards X-ray images to the
//! configured prediction endpoint and logs each prediction.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use boneage_common::config::{default_config_path, load_toml_config_or_default};
use boneage_ui::config::{Cli, ServiceConfig};
use boneage_ui::prediction::{HttpPredictionClient, MockPredictor, Predictor};
use boneage_ui::sink::{HttpLogSink, NullSink, PredictionSink};
use boneage_ui::{build_router, AppState};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LOG_SINK_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read the TOML file before tracing exists so its log level can apply;
    // the outcome is logged once the subscriber is up
    let config_path = cli.config.clone().or_else(default_config_path);
    let (toml_config, config_source) = load_toml_config_or_default(config_path.as_deref());

    let config = ServiceConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;

    // RUST_LOG overrides the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Bone Age Workbench (boneage-ui) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let predictor = build_predictor(&config)?;

    let state = AppState::new(predictor, config.max_upload_bytes);
    let sweeper = state
        .sessions
        .clone()
        .spawn_idle_sweeper(config.session_idle_timeout);
    let app = build_router(state);

    let addr = config.socket_addr().context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("boneage-ui listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    info!("Server shutdown complete");
    Ok(())
}

fn build_predictor(config: &ServiceConfig) -> Result<Arc<dyn Predictor>> {
    let sink: Arc<dyn PredictionSink> = if config.telemetry {
        let http_client = reqwest::Client::builder()
            .timeout(LOG_SINK_TIMEOUT)
            .build()
            .context("Failed to build log sink HTTP client")?;
        info!("Prediction records forwarded to {}", config.log_endpoint);
        Arc::new(HttpLogSink::new(http_client, config.log_endpoint.clone()))
    } else {
        info!("Prediction telemetry disabled");
        Arc::new(NullSink)
    };

    if config.mock_predictor {
        warn!("Using MOCK predictor: results are canned and not derived from the image");
        return Ok(Arc::new(MockPredictor::development().with_sink(sink)));
    }

    let client = HttpPredictionClient::new(
        config.prediction_url.clone(),
        config.request_timeout,
        sink,
    )
    .context("Failed to build prediction client")?;
    info!(
        "Prediction endpoint: {} (timeout {}s)",
        client.endpoint(),
        config.request_timeout.as_secs()
    );
    Ok(Arc::new(client))
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
