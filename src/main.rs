mod config;
mod error;
mod middleware;
mod routes;
mod services;
mod state;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use routes::create_routes;
use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState::from_config(config).await;

    // Archival degrades gracefully when the bucket is down, but say so early.
    if !state.storage.check_connection().await {
        warn!("object storage bucket is not reachable; video archival will be unavailable");
    }

    let app = create_routes(state);

    let listener = tokio::net::TcpListener::bind(&addr).await.expect("failed to bind listener");
    info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("server error");
}
