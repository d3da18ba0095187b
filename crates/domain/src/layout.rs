//! Room layout: every device, scene and input of one room, as handed to the
//! engine at boot or on reconfiguration.

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::device::Device;
use crate::error::{RoomError, ValidationError};
use crate::id::SceneId;
use crate::input::{ChannelInputSpec, PanelButtonSpec};
use crate::scene::Scene;

/// Complete configuration of a room.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomLayout {
    pub devices: Vec<Device>,
    pub scenes: Vec<Scene>,
    pub channels: Vec<ChannelInputSpec>,
    pub buttons: Vec<PanelButtonSpec>,
    /// Whether the room starts out occupied.
    #[serde(default)]
    pub occupied: bool,
}

impl RoomLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn device(mut self, device: Device) -> Self {
        self.devices.push(device);
        self
    }

    #[must_use]
    pub fn scene(mut self, scene: Scene) -> Self {
        self.scenes.push(scene);
        self
    }

    #[must_use]
    pub fn channel(mut self, input: ChannelInputSpec) -> Self {
        self.channels.push(input);
        self
    }

    #[must_use]
    pub fn button(mut self, input: PanelButtonSpec) -> Self {
        self.buttons.push(input);
        self
    }

    #[must_use]
    pub fn occupied(mut self, occupied: bool) -> Self {
        self.occupied = occupied;
        self
    }

    /// Check every element and the references between them.
    ///
    /// Link and repel targets are not checked here; see
    /// [`diagnose_links`](crate::device::diagnose_links).
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] when an element is invalid, an id
    /// is used twice, a key is configured twice on the same panel, or an
    /// input refers to a scene that does not exist.
    pub fn validate(&self) -> Result<(), RoomError> {
        for device in &self.devices {
            device.validate()?;
        }
        for scene in &self.scenes {
            scene.validate()?;
        }
        for input in &self.channels {
            input.validate()?;
        }
        for input in &self.buttons {
            input.validate()?;
        }

        ensure_unique("device", self.devices.iter().map(|d| d.id))?;
        ensure_unique("scene", self.scenes.iter().map(|s| s.id))?;
        ensure_unique(
            "input",
            self.channels
                .iter()
                .map(|c| c.id)
                .chain(self.buttons.iter().map(|b| b.id)),
        )?;
        ensure_unique(
            "panel button",
            self.buttons
                .iter()
                .map(|b| PanelKey(b.panel.get(), b.button)),
        )?;

        let known: HashSet<SceneId> = self.scenes.iter().map(|s| s.id).collect();
        let references = self
            .channels
            .iter()
            .map(|c| (c.name.as_str(), &c.scenes))
            .chain(self.buttons.iter().map(|b| (b.name.as_str(), &b.scenes)));
        for (input, scenes) in references {
            if let Some(missing) = scenes.iter().find(|s| !known.contains(s)) {
                return Err(ValidationError::UnknownScene {
                    input: input.to_string(),
                    scene: missing.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }
}

#[derive(PartialEq, Eq, Hash)]
struct PanelKey(u8, u8);

impl Display for PanelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

fn ensure_unique<T: Eq + Hash + Display>(
    kind: &'static str,
    ids: impl Iterator<Item = T>,
) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        let text = id.to_string();
        if !seen.insert(id) {
            return Err(ValidationError::DuplicateId { kind, id: text });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceKind;
    use crate::input::TriggerKind;

    fn lamp(id: u16) -> Device {
        Device::builder()
            .id(id)
            .name("Lamp")
            .kind(DeviceKind::Lamp { channel: 1 })
            .build()
            .unwrap()
    }

    fn scene(id: u16) -> Scene {
        Scene::builder().id(id).name("Scene").build().unwrap()
    }

    #[test]
    fn should_accept_consistent_layout() {
        let layout = RoomLayout::new()
            .device(lamp(1))
            .scene(scene(1))
            .channel(ChannelInputSpec::new(1u16, "Door", 2, TriggerKind::LowLevel).scene(1u16))
            .button(PanelButtonSpec::new(2u16, "Key", 1u8, 0).scene(1u16));
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn should_reject_duplicate_device_ids() {
        let layout = RoomLayout::new().device(lamp(1)).device(lamp(1));
        assert!(matches!(
            layout.validate(),
            Err(RoomError::Validation(ValidationError::DuplicateId {
                kind: "device",
                ..
            }))
        ));
    }

    #[test]
    fn should_reject_input_id_shared_by_channel_and_button() {
        let layout = RoomLayout::new()
            .channel(ChannelInputSpec::new(5u16, "Door", 2, TriggerKind::LowLevel))
            .button(PanelButtonSpec::new(5u16, "Key", 1u8, 0));
        assert!(matches!(
            layout.validate(),
            Err(RoomError::Validation(ValidationError::DuplicateId {
                kind: "input",
                ..
            }))
        ));
    }

    #[test]
    fn should_reject_same_key_configured_twice() {
        let layout = RoomLayout::new()
            .button(PanelButtonSpec::new(1u16, "A", 1u8, 3))
            .button(PanelButtonSpec::new(2u16, "B", 1u8, 3));
        let err = layout.validate().unwrap_err();
        assert!(matches!(
            err,
            RoomError::Validation(ValidationError::DuplicateId { kind: "panel button", ref id }) if id == "1:3"
        ));
    }

    #[test]
    fn should_reject_input_referring_to_unknown_scene() {
        let layout = RoomLayout::new()
            .scene(scene(1))
            .button(PanelButtonSpec::new(1u16, "Key", 1u8, 0).scene(2u16));
        assert!(matches!(
            layout.validate(),
            Err(RoomError::Validation(ValidationError::UnknownScene { .. }))
        ));
    }

    #[test]
    fn should_accept_link_to_missing_device() {
        let mut device = lamp(1);
        device.links.push(crate::id::DeviceId::new(99));
        assert!(RoomLayout::new().device(device).validate().is_ok());
    }
}
