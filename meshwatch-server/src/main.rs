//! Aggregation engine binary: loads configuration, wires transports into the
//! aggregation loop, and serves a debug/health HTTP surface alongside it.

use std::sync::Arc;

use meshwatch_config::WatcherConfig;
use meshwatch_core::validator::{Validator, DEFAULT_SCHEMA_SEARCH_PATH};
use meshwatch_core::{Aggregator, ClusterAccumulator, DiscoveryWatcher, FsCertWatcher};
use meshwatch_server::transports::{NullClusterTransport, NullDiscoveryTransport};
use meshwatch_server::webhook_notifier::WebhookNotifier;
use meshwatch_server::debug_server;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = WatcherConfig::from_env()?;

    let search_path: Vec<_> = DEFAULT_SCHEMA_SEARCH_PATH.iter().map(std::path::PathBuf::from).collect();
    let validator = Validator::load(&search_path)?;

    let cluster_transport = Arc::new(NullClusterTransport::default());
    let accumulator = ClusterAccumulator::connect(
        cluster_transport,
        config.single_namespace.as_deref(),
        &config.field_selector,
        &config.label_selector,
        config.single_namespace.is_none(),
        config.knative_enabled,
    )
    .await?;

    let discovery_transport = Arc::new(NullDiscoveryTransport::default());
    let discovery = DiscoveryWatcher::new(discovery_transport);

    let (fs_cert_watcher, cert_rx) = FsCertWatcher::spawn(
        config.cert_secret_dir.clone(),
        "istio-cert".to_string(),
        config.cert_secret_namespace.clone(),
    )?;
    if fs_cert_watcher.is_none() {
        tracing::info!("filesystem cert watching disabled: no cert secret directory configured");
    }
    // Kept alive for the lifetime of the process; dropping it would stop the
    // underlying OS watch.
    let _fs_cert_watcher = fs_cert_watcher;

    let published = Arc::new(RwLock::new(Vec::new()));
    let notifier = Arc::new(WebhookNotifier::new(config.webhook_urls.clone(), published.clone()));

    let aggregator = Aggregator::new(accumulator, discovery, cert_rx, validator, notifier, published.clone(), config.snapshot_log);
    let timers = aggregator.timers();

    let shutdown = CancellationToken::new();
    let loop_shutdown = shutdown.clone();
    let aggregation_task = tokio::spawn(aggregator.run(loop_shutdown));

    let app = debug_server::router(published, timers);
    let listener = tokio::net::TcpListener::bind(config.debug_bind_addr).await?;
    tracing::info!(addr = %config.debug_bind_addr, "debug/health HTTP surface listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(%err, "debug HTTP surface exited unexpectedly");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received shutdown signal");
        }
    }

    shutdown.cancel();
    let _ = aggregation_task.await;

    Ok(())
}
