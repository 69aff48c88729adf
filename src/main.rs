mod config;
mod routes;
mod services;
mod state;

use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "sketchroom=info,tower_http=info".into()),
        )
        .init();

    let config = config::RelayConfig::from_env().expect("invalid configuration");
    let addr = config.socket_addr();
    let state = state::AppState::new(config);
    let app = routes::app(state);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("failed to bind");
    tracing::info!(%addr, "sketchroom relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
