use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::LogEntry;

/// Edit sent by a client over its connection.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditMessage {
    pub key: String,
    pub content: String,
    pub sent_by: String,
}

/// Edit delivered to a client, enriched with the room and its current members.
///
/// Outbound frames are always a JSON array of these, both for the initial
/// replay batch and for live updates.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    pub key: String,
    pub content: String,
    pub sent_by: String,
    pub project_id: String,
    pub user_ids: Vec<String>,
}

impl BroadcastMessage {
    pub fn from_edit(edit: EditMessage, room_id: &str, user_ids: Vec<String>) -> Self {
        Self {
            key: edit.key,
            content: edit.content,
            sent_by: edit.sent_by,
            project_id: room_id.to_string(),
            user_ids,
        }
    }

    pub fn from_log_entry(key: &str, entry: LogEntry, room_id: &str, user_ids: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            content: entry.value,
            sent_by: entry.updated_by,
            project_id: room_id.to_string(),
            user_ids,
        }
    }
}
