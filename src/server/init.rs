//! Server initialization and main run loop
//!
//! Wires the pipeline (feed, store, hub, metrics, watch session) and serves
//! the HTTP API until a shutdown signal arrives.

use super::loader::load_config;
use crate::api::events::StreamSettings;
use anyhow::{Context, Result};
use axum::{Extension, Router};
use eventscope_core::metrics::global;
use eventscope_core::{
    BackoffPolicy, EventHub, EventStore, FeedConfig, IngestMetrics, KubeFeed, RetryQueue,
    WatchFeed, WatchSession,
};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Run the server
pub async fn run(port_override: Option<u16>) -> Result<()> {
    info!("Starting Eventscope v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config().context("Failed to load configuration")?;
    if let Some(port) = port_override {
        config.server.port = port;
    }
    info!("Configuration loaded");

    let store = EventStore::from_path(
        Path::new(&config.store.db_path),
        Duration::from_secs(config.watch.coalesce_window_secs),
    )
    .await
    .context("Failed to open event store")?;

    let registry = global::registry();
    let metrics = IngestMetrics::from_registry(registry);
    let hub = Arc::new(EventHub::new(
        config.stream.recent_buffer,
        config.stream.subscriber_buffer,
        registry.gauge("stream_subscribers"),
    ));

    let backoff = BackoffPolicy::new(
        Duration::from_millis(config.watch.backoff_initial_ms),
        Duration::from_secs(config.watch.backoff_max_secs),
    );
    let retry = RetryQueue::spawn(
        store.clone(),
        metrics.clone(),
        config.store.retry_queue_capacity,
        config.store.retry_max_attempts,
        backoff.clone(),
    );

    let feed_config = FeedConfig {
        api_server: config.watch.api_server.clone(),
        namespace: config.watch.namespace.clone(),
        token_path: config.watch.token_path.as_ref().map(PathBuf::from),
        ca_path: config.watch.ca_path.as_ref().map(PathBuf::from),
        insecure_skip_tls: config.watch.insecure_skip_tls,
    };
    let feed: Arc<dyn WatchFeed> =
        Arc::new(KubeFeed::new(&feed_config).context("Failed to build feed client")?);
    info!(
        namespace = %config.watch.namespace,
        api_server = %config.watch.api_server,
        "Watching cluster events"
    );

    let (mut session, phase_rx) = WatchSession::new(
        feed,
        store.clone(),
        Arc::clone(&hub),
        metrics,
        retry,
        backoff,
    );

    // A cluster that never answers within the grace window is fatal: exit
    // non-zero instead of serving an empty store that can never fill.
    session
        .seed_with_grace(Duration::from_secs(config.watch.startup_grace_secs))
        .await
        .context("Initial event listing failed")?;

    let shutdown = CancellationToken::new();
    let watcher = tokio::spawn(session.run(shutdown.clone()));

    let stream_settings = Arc::new(StreamSettings {
        default_limit: config.stream.default_limit,
        max_limit: config.stream.max_limit,
    });

    let app = Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::docs_routes())
        .merge(crate::api::events_routes())
        .layer(Extension(store))
        .layer(Extension(hub))
        .layer(Extension(phase_rx))
        .layer(Extension(stream_settings))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .context("HTTP server error")?;

    shutdown.cancel();
    match tokio::time::timeout(Duration::from_secs(5), watcher).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Watch session task error: {}", e),
        Err(_) => warn!("Watch session shutdown timeout"),
    }

    info!("Eventscope shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
