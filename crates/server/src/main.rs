use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use pulsar_server::{PulsarConfig, build, router};

#[tokio::main]
async fn main() {
    let config_path =
        std::env::var("PULSAR_CONFIG").unwrap_or_else(|_| "pulsar.toml".to_owned());
    let config = match PulsarConfig::load(Path::new(&config_path)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("configuration error: {err}");
        std::process::exit(1);
    }

    let telemetry = pulsar_server::telemetry::init(&config.telemetry);
    if config.database.url.is_some() {
        info!("database url configured; this build serves from the in-memory backend");
    }

    let (state, workers) = build(&config);
    let shutdown = CancellationToken::new();
    let worker_handle = workers.spawn(shutdown.clone());

    let app = router(state, &config.cors);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(addr = %addr, error = %err, "failed to bind listener");
            std::process::exit(1);
        }
    };
    info!(addr = %addr, "pulsar server listening");

    let signal_token = shutdown.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            signal_token.cancel();
        })
        .await;
    if let Err(err) = serve_result {
        error!(error = %err, "server error");
    }

    // Drain the background workers within the configured window.
    shutdown.cancel();
    let drain = Duration::from_secs(config.server.shutdown_timeout_seconds);
    if tokio::time::timeout(drain, worker_handle).await.is_err() {
        warn!("background workers did not stop within the drain window");
    }
    telemetry.shutdown();
    info!("pulsar server stopped");
}
