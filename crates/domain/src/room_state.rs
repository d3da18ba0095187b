//! Room-state tags ("DND", "SOS", "MUR", …) shared by every device.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Set of active room-state tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomStates(BTreeSet<String>);

impl RoomStates {
    /// Add `tag`; returns `true` if it was not present.
    pub fn add(&mut self, tag: &str) -> bool {
        self.0.insert(tag.to_string())
    }

    /// Remove `tag`; returns `true` if it was present.
    pub fn remove(&mut self, tag: &str) -> bool {
        self.0.remove(tag)
    }

    /// Flip `tag` and return whether it is present afterwards.
    pub fn toggle(&mut self, tag: &str) -> bool {
        if self.remove(tag) {
            false
        } else {
            self.add(tag);
            true
        }
    }

    /// Add or remove `tag` so that its presence equals `present`.
    pub fn set(&mut self, tag: &str, present: bool) {
        if present {
            self.add(tag);
        } else {
            self.remove(tag);
        }
    }

    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
