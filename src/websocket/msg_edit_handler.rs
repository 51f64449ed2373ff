use tracing::debug;

use crate::error::SyncError;
use crate::models::{EditMessage, LogEntry};
use crate::state::AppState;

/// Handle one inbound frame: record the edit in the replay log, then
/// publish the original bytes so subscribers get exactly what was sent.
///
/// A failed append, including one rejected for an unusable key, skips the publish.
pub async fn handle_edit_message(raw: &[u8], room_id: &str, state: &AppState) -> Result<(), SyncError> {
    let edit: EditMessage = serde_json::from_slice(raw).map_err(SyncError::Malformed)?;
    debug!("Edit received for room {}: key={}, sent_by={}", room_id, edit.key, edit.sent_by);

    let entry = LogEntry::new(edit.content, edit.sent_by);
    state.replay_log.append(room_id, &edit.key, &entry).await?;
    state.broadcast.publish(room_id, raw).await?;
    Ok(())
}
