//! Controller-facing polling-transport endpoints.
//!
//! These two routes carry the entire queue↔controller protocol: directives
//! flow out through `GET /get_command`, acknowledgments flow back through
//! `POST /acknowledge`.  Both are polled by firmware on flaky links, so the
//! responses stay minimal and an unmatched ack is still a 200.

use axum::Json;
use axum::extract::{Query, State};
use chrono::Utc;

use vendos_types::{AckRequest, DirectiveResponse};

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct GetCommandParams {
    pub unit_id: String,
}

/// GET /get_command?unit_id=… — the directive the unit should act on.
///
/// Responds `{"motor_id": null, "action": null}` when nothing is in flight;
/// redelivers the identical directive until the unit acknowledges.
pub async fn get_command(
    State(app): State<AppState>,
    Query(params): Query<GetCommandParams>,
) -> Result<Json<DirectiveResponse>, AppError> {
    let store = app.store.clone();
    let directive = tokio::task::spawn_blocking(move || store.next_directive(&params.unit_id))
        .await
        .map_err(AppError::join)??;
    Ok(Json(directive.into()))
}

/// POST /acknowledge — report the outcome of a dispense cycle.
///
/// Always 200 for a well-formed body: duplicate and late acks are accepted
/// as no-ops so controller retries never see spurious errors.
pub async fn acknowledge(
    State(app): State<AppState>,
    Json(ack): Json<AckRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || {
        store.acknowledge(&ack.unit_id, ack.motor_id, ack.status, Utc::now())
    })
    .await
    .map_err(AppError::join)??;

    Ok(Json(serde_json::json!({
        "message": "acknowledgment received",
    })))
}
