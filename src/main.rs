mod config;
mod errors;
mod feeds;
mod models;
mod server;
mod state;

use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("bs_pricer starting");

    // Load config
    let cfg = match config::AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    let (app_state, hub_rx) = AppState::new(cfg.clone());

    // ── Spawn tasks ──

    // 1. Subscriber hub (sole owner of the /ws subscriber set)
    let hub_state = app_state.clone();
    tokio::spawn(async move {
        server::hub::run_hub(hub_state, hub_rx).await;
    });

    // 2. Simulated market feed (drives /ws)
    let feed_cfg = cfg.clone();
    let feed_state = app_state.clone();
    tokio::spawn(async move {
        feeds::simulated::run_market_feed(feed_cfg, feed_state).await;
    });

    // 3. Axum HTTP + WS server
    let app = server::router(app_state);
    let addr = cfg.bind_addr();
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("bind error: {e}");
            std::process::exit(1);
        });

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
    }

    tracing::info!("bs_pricer stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install ctrl-c handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
