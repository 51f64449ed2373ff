use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::models::ErrorResponse;
use crate::state::AppState;
use crate::store::KeySpace;
use crate::websocket::session::Session;

#[derive(Deserialize, Debug)]
pub struct ConnectQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Join a room over a WebSocket
///
/// The first frame sent is the room's replay batch; every later frame is a
/// single-element array carrying one live edit.
#[utoipa::path(
    get,
    path = "/project/{room_id}/karte",
    params(
        ("room_id" = String, Path, description = "Room to join"),
        ("userId" = String, Query, description = "Participant id, unique within the room")
    ),
    responses(
        (status = 101, description = "Switched to the WebSocket protocol"),
        (status = 400, description = "Missing or invalid room or user id", body = ErrorResponse)
    )
)]
pub async fn websocket_handler(
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    if !KeySpace::is_valid_segment(&room_id) {
        warn!("Rejected WebSocket connection with invalid room id '{}'", room_id);
        return ErrorResponse::reply(StatusCode::BAD_REQUEST, "invalid room id").into_response();
    }
    let user_id = match query.user_id.filter(|id| !id.trim().is_empty()) {
        Some(user_id) => user_id,
        None => {
            warn!("Rejected WebSocket connection to room {} without user id", room_id);
            return ErrorResponse::reply(StatusCode::BAD_REQUEST, "invalid user id").into_response();
        }
    };

    info!("New WebSocket connection attempt for room {} by user {}", room_id, user_id);
    let session = Session::new(room_id, user_id, state);
    ws.on_upgrade(move |socket| session.run(socket))
}
