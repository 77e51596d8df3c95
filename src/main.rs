mod aggregate;
mod categories;
mod config;
mod fetcher;
mod routes;
mod store;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::fetcher::{start_background_refresh, Fetcher};
use crate::routes::AppState;
use crate::store::{FileStore, UpdateStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "patchfeed=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("patchfeed.toml")?;
    info!("Loaded {} sources from configuration", config.sources.len());

    // Cache store
    let store: Arc<dyn UpdateStore> = Arc::new(FileStore::new(config.cache_path.clone()));

    // Create fetcher
    let fetcher = Arc::new(Fetcher::new(store.clone(), config.sources.clone()));

    // Start background refresh task
    let bg_fetcher = fetcher.clone();
    let refresh_interval = config.refresh_interval;
    tokio::spawn(async move {
        start_background_refresh(bg_fetcher, refresh_interval).await;
    });

    // Create app state
    let state = Arc::new(AppState {
        store,
        fetcher,
        pdf_dir: config.pdf_dir.clone(),
    });

    // Build router
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server starting on http://{}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
