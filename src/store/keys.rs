/// Separator between the parts of a store key. Room ids and log keys may not contain it.
pub const SEPARATOR: char = ':';

/// Naming of the store keys that belong to a room.
///
/// Because neither a room id nor a log key may contain [`SEPARATOR`], the
/// membership set (`{room}:room`), key index (`{room}:keys`) and logs
/// (`{room}:data:{key}`) of different rooms can never share a name.
#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Whether `segment` can be used as a room id or log key
    pub fn is_valid_segment(segment: &str) -> bool {
        !segment.trim().is_empty() && !segment.contains(SEPARATOR)
    }

    /// Set of participant ids currently in the room
    pub fn membership(&self, room_id: &str) -> String {
        format!("{}{}{}room", self.prefix, room_id, SEPARATOR)
    }

    /// Replay log of one key in the room
    pub fn log(&self, room_id: &str, key: &str) -> String {
        format!("{}{}{sep}data{sep}{}", self.prefix, room_id, key, sep = SEPARATOR)
    }

    /// Set of keys that have a replay log under the room
    pub fn key_index(&self, room_id: &str) -> String {
        format!("{}{}{}keys", self.prefix, room_id, SEPARATOR)
    }

    /// Pub/sub topic carrying the room's live edits
    pub fn topic(&self, room_id: &str) -> String {
        format!("{}{}", self.prefix, room_id)
    }
}
