use std::net::SocketAddr;

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tokio::{net::TcpListener, sync::watch};
use tracing::{info, warn};

use heaterctl_common::ControllerStatus;

/// Read-only view of the control loop; the loop itself never blocks on it.
pub fn router(status: watch::Receiver<ControllerStatus>) -> Router {
    Router::new()
        .route("/api/status", get(handle_get_status))
        .with_state(status)
}

pub fn spawn_status_server(port: u16, status: watch::Receiver<ControllerStatus>) {
    tokio::spawn(async move {
        if let Err(err) = serve(port, status).await {
            warn!("status server stopped: {err:#}");
        }
    });
}

async fn serve(port: u16, status: watch::Receiver<ControllerStatus>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server at {addr}"))?;

    info!("status available on http://{addr}/api/status");
    axum::serve(listener, router(status)).await?;
    Ok(())
}

async fn handle_get_status(
    State(status): State<watch::Receiver<ControllerStatus>>,
) -> impl IntoResponse {
    let snapshot = status.borrow().clone();
    Json(snapshot)
}
