//! Purchase-side endpoints: create a command, confirm its payment, and list
//! a unit's command history.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use chrono::Utc;

use vendos_types::VendCommand;

use crate::error::AppError;
use crate::state::AppState;

#[derive(serde::Deserialize)]
pub struct BuyBody {
    pub unit_id: String,
    pub motor_id: u32,
}

/// POST /buy — initiate a purchase for one slot.
///
/// Refuses with 422 when the inventory collaborator reports the slot empty,
/// and with 409 while another purchase for the slot is still in flight.
/// The created command waits in `AwaitingPayment` until the payment
/// collaborator calls back.
pub async fn buy(
    State(app): State<AppState>,
    Json(body): Json<BuyBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if !app.inventory.has_stock(&body.unit_id, body.motor_id) {
        return Err(AppError::OutOfStock {
            unit_id: body.unit_id,
            motor_id: body.motor_id,
        });
    }

    let store = app.store.clone();
    let command_id =
        tokio::task::spawn_blocking(move || store.create(&body.unit_id, body.motor_id, Utc::now()))
            .await
            .map_err(AppError::join)??;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "command_id": command_id })),
    ))
}

#[derive(serde::Deserialize)]
pub struct ConfirmPaymentBody {
    pub command_id: String,
}

/// POST /confirm_payment — payment-collaborator callback.
///
/// Promotes the command to `Pending`, making it eligible for dispatch on
/// the unit's next poll.
pub async fn confirm_payment(
    State(app): State<AppState>,
    Json(body): Json<ConfirmPaymentBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    tokio::task::spawn_blocking(move || store.confirm_payment(&body.command_id))
        .await
        .map_err(AppError::join)??;

    Ok(Json(serde_json::json!({ "message": "payment confirmed" })))
}

#[derive(serde::Deserialize)]
pub struct ListCommandsParams {
    pub unit_id: String,
}

/// GET /commands?unit_id=… — a unit's command history, oldest first.
pub async fn list_commands(
    State(app): State<AppState>,
    Query(params): Query<ListCommandsParams>,
) -> Result<Json<Vec<VendCommand>>, AppError> {
    let store = app.store.clone();
    let commands = tokio::task::spawn_blocking(move || store.list_for_unit(&params.unit_id))
        .await
        .map_err(AppError::join)??;
    Ok(Json(commands))
}
