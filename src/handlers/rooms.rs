use axum::{extract::{Path, State}, http::StatusCode, Json};
use tracing::{error, warn};

use crate::models::{ErrorResponse, RoomInfoResponse};
use crate::state::AppState;
use crate::store::KeySpace;

/// Inspect a room: who is in it and which keys have a replay log
#[utoipa::path(
    get,
    path = "/api/v1/rooms/{room_id}",
    params(
        ("room_id" = String, Path, description = "Room identifier")
    ),
    responses(
        (status = 200, description = "Current room state", body = RoomInfoResponse),
        (status = 400, description = "Invalid room id", body = ErrorResponse),
        (status = 500, description = "Store failure", body = ErrorResponse)
    )
)]
pub async fn room_info(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<(StatusCode, Json<RoomInfoResponse>), (StatusCode, Json<ErrorResponse>)> {
    if !KeySpace::is_valid_segment(&room_id) {
        warn!("Rejected room lookup with invalid room id '{}'", room_id);
        return Err(ErrorResponse::reply(StatusCode::BAD_REQUEST, "invalid room id"));
    }
    let user_ids = state.membership.list(&room_id).await.map_err(|e| {
        error!("Failed to list members of room {}: {}", room_id, e);
        ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read room membership")
    })?;
    let keys = state.replay_log.indexed_keys(&room_id).await.map_err(|e| {
        error!("Failed to list keys of room {}: {}", room_id, e);
        ErrorResponse::reply(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read room keys")
    })?;

    Ok((StatusCode::OK, Json(RoomInfoResponse { room_id, user_ids, keys })))
}
