use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One historical edit in a room's replay log.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub value: String,
    pub updated_by: String,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(value: impl Into<String>, updated_by: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            updated_by: updated_by.into(),
            updated_at: Utc::now(),
        }
    }
}
