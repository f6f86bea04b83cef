// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use rust_health_monitor::{
    config::{self, Config},
    health::{create_checker, PeriodicRunner, Registry},
    metrics::MetricsRegistry,
    server::{MetricsHandler, RequestHandler, ServerBuilder},
};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rust_health_monitor=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    let config = load(std::env::args().nth(1)).await?;

    // Start one runner per configured check
    let registry = Arc::new(Registry::new());
    for check in &config.checks {
        let runner = PeriodicRunner::with_threshold(
            create_checker(&check.kind),
            check.interval(),
            check.threshold,
        );
        registry.register(check.name.clone(), runner);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Start metrics server if enabled
    let mut status_handler = RequestHandler::new(registry.clone(), config.server.status_path.clone());
    if config.metrics.enabled {
        let metrics_registry = Arc::new(MetricsRegistry::new()?);
        status_handler = status_handler.with_metrics(metrics_registry.collector());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        let metrics_handler =
            MetricsHandler::new(metrics_registry, registry.clone(), config.metrics.path.clone());
        let metrics_server = ServerBuilder::new(metrics_addr)
            .with_handler(metrics_handler)
            .bind()
            .await?;

        info!(
            "Metrics server listening on http://{}{}",
            metrics_server.local_addr(),
            config.metrics.path
        );

        let rx = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics_server.serve(wait_for(rx)).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Start main server
    info!(
        "Serving health status on http://{}{}",
        config.server.listen, config.server.status_path
    );
    let server = ServerBuilder::new(config.server.listen)
        .with_handler(status_handler)
        .bind()
        .await?;

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    server.serve(wait_for(shutdown_rx)).await?;

    registry.shutdown();
    info!("Shutdown complete");
    Ok(())
}

async fn load(path: Option<String>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            config::load_config(&path).await
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            info!("Loading configuration from: {}", DEFAULT_CONFIG_PATH);
            config::load_config(DEFAULT_CONFIG_PATH).await
        }
        None => {
            warn!("No configuration file given, using built-in defaults");
            Ok(Config::default())
        }
    }
}

async fn wait_for(mut shutdown_rx: watch::Receiver<bool>) {
    while !*shutdown_rx.borrow() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
