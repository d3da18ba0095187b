//! Inputs: dry-contact channels and panel buttons, each owning a private
//! list of scenes that it cycles through round-robin.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RoomError, ValidationError};
use crate::id::{InputId, PanelId, SceneId};
use crate::panel::BUTTONS_PER_PANEL;

/// Behavioural flags attached to an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputTag {
    /// Still usable while the room is unoccupied (card removed).
    RemoveCardUsable,
    /// This channel's debounced presence decides whether a guest is present.
    OccupancyChannel,
    /// Door contact: `1` = closed, `0` = open.
    DoorChannel,
    /// Doorbell: muted while the room is in "do not disturb".
    DoorbellChannel,
    /// Never consumes the any-key override.
    IgnoreAnyKey,
}

/// How a dry-contact channel fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    LowLevel,
    HighLevel,
    /// Raw presence pulses, debounced into occupancy.
    Infrared,
    /// Fired when an infrared channel on the same number times out.
    InfraredTimeout,
}

impl TriggerKind {
    /// Whether a level report with `bit` fires this trigger.
    #[must_use]
    pub fn matches_level(self, bit: bool) -> bool {
        matches!((self, bit), (Self::HighLevel, true) | (Self::LowLevel, false))
    }

    #[must_use]
    pub fn is_infrared(self) -> bool {
        matches!(self, Self::Infrared | Self::InfraredTimeout)
    }
}

/// A configured dry-contact channel input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInputSpec {
    pub id: InputId,
    pub name: String,
    pub channel: u8,
    pub trigger: TriggerKind,
    pub tags: BTreeSet<InputTag>,
    pub scenes: Vec<SceneId>,
    /// Base debounce duration (infrared only).
    pub debounce: Duration,
}

impl ChannelInputSpec {
    #[must_use]
    pub fn new(
        id: impl Into<InputId>,
        name: impl Into<String>,
        channel: u8,
        trigger: TriggerKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            channel,
            trigger,
            tags: BTreeSet::new(),
            scenes: Vec::new(),
            debounce: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn tag(mut self, tag: InputTag) -> Self {
        self.tags.insert(tag);
        self
    }

    #[must_use]
    pub fn scene(mut self, scene: impl Into<SceneId>) -> Self {
        self.scenes.push(scene.into());
        self
    }

    #[must_use]
    pub fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    #[must_use]
    pub fn has_tag(&self, tag: InputTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when the name is blank.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// A configured key on a panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelButtonSpec {
    pub id: InputId,
    pub name: String,
    pub panel: PanelId,
    pub button: u8,
    pub tags: BTreeSet<InputTag>,
    pub scenes: Vec<SceneId>,
}

impl PanelButtonSpec {
    #[must_use]
    pub fn new(
        id: impl Into<InputId>,
        name: impl Into<String>,
        panel: impl Into<PanelId>,
        button: u8,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            panel: panel.into(),
            button,
            tags: BTreeSet::new(),
            scenes: Vec::new(),
        }
    }

    #[must_use]
    pub fn tag(mut self, tag: InputTag) -> Self {
        self.tags.insert(tag);
        self
    }

    #[must_use]
    pub fn scene(mut self, scene: impl Into<SceneId>) -> Self {
        self.scenes.push(scene.into());
        self
    }

    #[must_use]
    pub fn has_tag(&self, tag: InputTag) -> bool {
        self.tags.contains(&tag)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] for a blank name and
    /// [`ValidationError::ButtonOutOfRange`] for a key index past the panel.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.button >= BUTTONS_PER_PANEL {
            return Err(ValidationError::ButtonOutOfRange(self.button).into());
        }
        Ok(())
    }
}
