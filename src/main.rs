mod config;
mod content_loader;
mod error;
mod gate;
mod guestbook;
mod hot_reload;
mod markdown;
mod models;
mod posts;
mod routes;
mod state;
mod storage;
mod views;

use std::{net::SocketAddr, sync::Arc};

use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::content_loader::load_content;
use crate::error::BlogError;
use crate::hot_reload::start_content_watcher;
use crate::state::{AppState, RouterState};
use crate::storage::{FileStore, KeyValueStore};

#[tokio::main]
async fn main() -> Result<(), BlogError> {
    let config = Config::from_env();

    // logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.log_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("RUST_ENV is set to development: {}", config.is_development);

    let content = load_content(&config.content_dir).await?;
    info!(
        posts = content.posts.len(),
        dir = %config.content_dir.display(),
        "Loaded bundled content"
    );

    let file_store = FileStore::open(&config.data_dir)?;
    info!(dir = %file_store.dir().display(), "Persisting posts");
    let store: Arc<dyn KeyValueStore> = Arc::new(file_store);

    let port = config.port;
    let is_development = config.is_development;
    let state = Arc::new(AppState::new(config, content, store));

    // Hot-reload setup
    let (tx, _rx) = broadcast::channel(1);
    if is_development {
        info!("Hot reload enabled. Check logs for file change events.");
        start_content_watcher(tx.clone(), state.clone());
    }

    let app = routes::router(RouterState {
        app_state: state,
        broadcaster: tx,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
