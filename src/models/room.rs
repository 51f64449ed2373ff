use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Current state of a room as seen by the store
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoResponse {
    pub room_id: String,
    pub user_ids: Vec<String>,
    pub keys: Vec<String>,
}
