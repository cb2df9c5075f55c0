//! `vendos-server` – HTTP API over the vend-command queue
//!
//! Exposes the polling-transport endpoints consumed by dispensing
//! controllers (`/get_command`, `/acknowledge`) and the purchase-side
//! endpoints consumed by the storefront and the payment collaborator
//! (`/buy`, `/confirm_payment`), plus operational read access
//! (`/commands`, `/healthz`).  A background task sweeps commands stuck
//! awaiting payment.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};

use vendos_queue::{CommandStore, Inventory};

use crate::state::AppState;

/// How often the staleness sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(store: Arc<CommandStore>, inventory: Arc<dyn Inventory>) -> Router {
    let app_state = AppState { store, inventory };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Controller-facing polling transport
        .route("/get_command", get(routes::transport::get_command))
        .route("/acknowledge", post(routes::transport::acknowledge))
        // Purchase side
        .route("/buy", post(routes::purchase::buy))
        .route("/confirm_payment", post(routes::purchase::confirm_payment))
        .route("/commands", get(routes::purchase::list_commands))
        // Liveness
        .route("/healthz", get(routes::healthz))
        .layer(cors)
        .with_state(app_state)
}

/// Spawn the periodic staleness sweep for `store`.
///
/// Runs until the returned handle is aborted or the runtime shuts down.
/// The sweep and the lazy check inside `create` share one predicate, so a
/// slower sweep cadence only delays when expiry becomes *visible*, never
/// what expires.
pub fn spawn_sweeper(store: Arc<CommandStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let store = Arc::clone(&store);
            let result = tokio::task::spawn_blocking(move || {
                store.sweep_expired(store.payment_timeout(), Utc::now())
            })
            .await;
            match result {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "staleness sweep failed"),
                Err(e) => tracing::warn!(error = %e, "staleness sweep task panicked"),
            }
        }
    })
}

/// Start the queue API server on `0.0.0.0:port`.
pub async fn serve(
    port: u16,
    store: Arc<CommandStore>,
    inventory: Arc<dyn Inventory>,
) -> anyhow::Result<()> {
    let sweeper = spawn_sweeper(Arc::clone(&store), SWEEP_INTERVAL);
    let app = build_router(store, inventory);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("vend-command queue listening on http://localhost:{port}");

    let result = axum::serve(listener, app).await;
    sweeper.abort();
    result?;
    Ok(())
}
