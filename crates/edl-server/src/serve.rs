use crate::config::EdlConfig;
use crate::http::{self, AppState, EdlMetrics};
use crate::persist::SnapshotStore;
use crate::source;
use axum::Router;
use edl_core::EdlService;
use std::sync::Arc;
use tracing::{info, warn};

/// Wire the source, cache, persistence and metrics into a router.
pub fn build_app(config: &EdlConfig) -> anyhow::Result<Router> {
    let settings = config.settings()?;
    let source = source::from_config(config)?;
    let metrics = Arc::new(EdlMetrics::new());

    let mut service = EdlService::new(source, settings).with_observer(metrics.clone());

    if config.server.persist_cache {
        let store = SnapshotStore::new(config.cache_path());
        if let Some(snapshot) = store.load() {
            // An on-demand list keeps whatever format the last update chose.
            if snapshot.format == service.settings().format || service.settings().on_demand {
                service = service.with_snapshot(snapshot);
            } else {
                warn!(
                    "Ignoring {}: built as {}, configured format is {}",
                    store.path().display(),
                    snapshot.format,
                    service.settings().format
                );
            }
        }
        service = service.with_observer(Arc::new(store));
    }

    let state = AppState {
        service: Arc::new(service),
        metrics,
        start_time: std::time::Instant::now(),
    };
    Ok(http::create_router(state))
}

pub async fn run(config: EdlConfig) -> anyhow::Result<()> {
    info!("Starting EDL server v{}", env!("CARGO_PKG_VERSION"));
    info!("Data: {:?}", config.server.data_dir);

    let settings = config.settings()?;
    info!(
        "EDL: query={:?} format={} on_demand={} refresh_rate={} limit={:?}",
        settings.query, settings.format, settings.on_demand, settings.refresh_rate, settings.limit
    );
    if !settings.on_demand && settings.query.trim().is_empty() {
        warn!("indicators_query is empty, the list will contain every indicator in the source");
    }

    let app = build_app(&config)?;
    let addr = config.listen_addr()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", addr, e))?;
    info!("Serving EDL on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, terminating...");
        })
        .await?;

    Ok(())
}
