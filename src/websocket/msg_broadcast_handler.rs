use crate::error::SyncError;
use crate::models::{BroadcastMessage, EditMessage};
use crate::services::MembershipRegistry;

/// Turn one published frame into the outbound frame for a connection.
///
/// Membership is resolved now, not when the edit was made.
pub async fn handle_broadcast_message(
    raw: &[u8],
    room_id: &str,
    membership: &MembershipRegistry,
) -> Result<Vec<u8>, SyncError> {
    let edit: EditMessage = serde_json::from_slice(raw).map_err(SyncError::Malformed)?;
    let user_ids = membership.list(room_id).await?;
    let messages = vec![BroadcastMessage::from_edit(edit, room_id, user_ids)];
    Ok(serde_json::to_vec(&messages)?)
}
