use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use super::LogEntry;
use crate::config::ConfigError;
use crate::store::KeySpace;

/// Seed entries for one logical key
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SeedKey {
    pub key: String,
    pub entries: Vec<LogEntry>,
}

/// Default content written to a room's replay logs the first time the room is used.
///
/// The seed file is a JSON array of `{"key": ..., "entries": [LogEntry, ...]}`.
/// Key order in the file is the order keys are replayed to joining clients.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct SeedData {
    keys: Vec<SeedKey>,
}

impl SeedData {
    pub fn new(keys: Vec<SeedKey>) -> Self {
        Self { keys }
    }

    /// Load seed data from `path`, or fall back to the built-in default.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(Path::new(path)).map_err(|source| ConfigError::SeedIo {
            path: path.to_string(),
            source,
        })?;
        let seed = Self::parse(&raw).map_err(|source| ConfigError::SeedParse {
            path: path.to_string(),
            source,
        })?;
        seed.validate()?;
        Ok(seed)
    }

    /// Every seed key must be usable as a store key segment.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.keys().find(|key| !KeySpace::is_valid_segment(key)) {
            Some(key) => Err(ConfigError::InvalidSeedKey(key.to_string())),
            None => Ok(()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.key.as_str())
    }

    pub fn entries(&self, key: &str) -> Option<&[LogEntry]> {
        self.keys
            .iter()
            .find(|k| k.key == key)
            .map(|k| k.entries.as_slice())
    }

    /// Seed keys in file order, followed by `indexed` keys not already listed, sorted.
    pub fn tracked_keys(&self, indexed: impl IntoIterator<Item = String>) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for key in self.keys() {
            if seen.insert(key.to_string()) {
                keys.push(key.to_string());
            }
        }
        let mut extra: Vec<String> = indexed.into_iter().filter(|k| !seen.contains(k)).collect();
        extra.sort();
        extra.dedup();
        keys.extend(extra);
        keys
    }
}

impl Default for SeedData {
    fn default() -> Self {
        Self::new(vec![SeedKey {
            key: "message".to_string(),
            entries: vec![LogEntry::new("Welcome to the room.", "seed")],
        }])
    }
}
