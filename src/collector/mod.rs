//! Metrics server
//!
//! Receives one result per client and exposes the aggregates for scraping.
//!
//! ## Endpoints
//!
//! - `POST /result` - Submit a client result (202 on success)
//! - `GET /metrics` - Prometheus text exposition of the aggregates

pub mod error;
pub mod routes;
pub mod state;

pub use error::{CollectorError, CollectorResult};
pub use state::CollectorState;

use std::net::SocketAddr;

use axum::{
    Router,
    routing::{any, get},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::CollectorConfig;

/// Build the router with all routes.
pub fn router(state: CollectorState) -> Router {
    Router::new()
        .route("/result", any(routes::result::submit_result))
        .route("/metrics", get(routes::metrics::scrape))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind the listen address. Failing to bind is fatal for the caller.
pub async fn bind(config: &CollectorConfig) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening for http requests on {}", listener.local_addr()?);
    Ok(listener)
}

/// Serve on an already bound listener until the server fails.
pub async fn serve(listener: TcpListener, state: CollectorState) -> anyhow::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;
    Ok(())
}

/// Spawn the metrics server
///
/// This starts the server in a background task and returns its local address.
pub async fn spawn_collector(
    config: CollectorConfig,
    state: CollectorState,
) -> anyhow::Result<SocketAddr> {
    let listener = bind(&config).await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = serve(listener, state).await {
            tracing::error!("metrics server error: {}", e);
        }
    });

    Ok(addr)
}
