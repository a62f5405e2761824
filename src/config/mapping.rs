//! Key → button mapping table

use serde::Serialize;
use std::collections::HashMap;

use crate::keys::KeyId;
use crate::pad::ButtonId;

/// One keyboard key bound to one gamepad button
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub key: KeyId,
    pub button: ButtonId,
}

impl MappingEntry {
    pub fn new(key: KeyId, button: ButtonId) -> Self {
        Self { key, button }
    }
}

/// Immutable lookup table from normalized keys to buttons
///
/// Keeps the configured order for display and saving. When a key appears
/// more than once the last entry wins and the earlier ones are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
    index: HashMap<KeyId, ButtonId>,
}

impl MappingTable {
    /// Build a table from entries in configuration order
    pub fn from_entries(entries: impl IntoIterator<Item = MappingEntry>) -> Self {
        let mut ordered: Vec<MappingEntry> = Vec::new();
        let mut index = HashMap::new();

        for entry in entries {
            if index.insert(entry.key.clone(), entry.button).is_some() {
                ordered.retain(|e| e.key != entry.key);
            }
            ordered.push(entry);
        }

        Self {
            entries: ordered,
            index,
        }
    }

    /// Built-in table: WASD on the D-pad, JKUI on the face buttons
    pub fn defaults() -> Self {
        let c = KeyId::char;
        Self::from_entries([
            MappingEntry::new(c('w'), ButtonId::DpadUp),
            MappingEntry::new(c('s'), ButtonId::DpadDown),
            MappingEntry::new(c('a'), ButtonId::DpadLeft),
            MappingEntry::new(c('d'), ButtonId::DpadRight),
            MappingEntry::new(c('j'), ButtonId::A),
            MappingEntry::new(c('k'), ButtonId::B),
            MappingEntry::new(c('u'), ButtonId::X),
            MappingEntry::new(c('i'), ButtonId::Y),
            MappingEntry::new(KeyId::named("space"), ButtonId::RightShoulder),
            MappingEntry::new(KeyId::named("shift"), ButtonId::LeftShoulder),
        ])
    }

    /// Button bound to `key`, if any
    pub fn lookup(&self, key: &KeyId) -> Option<ButtonId> {
        self.index.get(key).copied()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MappingTable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}
