//! Device: anything a scene can operate: relay-backed switches and the
//! built-in helper devices (heartbeat, room state, delayer, …).
//!
//! A device also carries the configuration of the propagation graph: the
//! devices that mirror it (`links`), the devices it forces off when it turns
//! on (`repels`) and the panel buttons whose backlight follows its state
//! (`indicators`).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RoomError, ValidationError};
use crate::id::{DeviceId, PanelId};
use crate::panel::BUTTONS_PER_PANEL;

/// What a device is and, for switches, which relay channel drives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeviceKind {
    Lamp { channel: u8 },
    Relay { channel: u8 },
    DryContact { channel: u8 },
    /// Panel backlight / occupancy heartbeat (sleep, card in, card out).
    Heartbeat,
    /// Edits the shared room-state tag set.
    RoomState,
    /// Pauses the executing scene.
    Delayer,
    /// Runs, cancels or arms other scenes.
    SceneControl,
    /// Records and restores the on/off state of every switch.
    Snapshot,
    /// Drives a single panel backlight directly.
    Indicator,
}

impl DeviceKind {
    /// Relay channel for switch kinds, `None` for helper devices.
    #[must_use]
    pub fn relay_channel(&self) -> Option<u8> {
        match self {
            Self::Lamp { channel } | Self::Relay { channel } | Self::DryContact { channel } => {
                Some(*channel)
            }
            _ => None,
        }
    }

    /// Whether the device has an on/off state backed by a relay.
    #[must_use]
    pub fn is_switch(&self) -> bool {
        self.relay_channel().is_some()
    }

    /// Short lowercase name used in logs and errors.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lamp { .. } => "lamp",
            Self::Relay { .. } => "relay",
            Self::DryContact { .. } => "dry_contact",
            Self::Heartbeat => "heartbeat",
            Self::RoomState => "room_state",
            Self::Delayer => "delayer",
            Self::SceneControl => "scene_control",
            Self::Snapshot => "snapshot",
            Self::Indicator => "indicator",
        }
    }
}

/// A panel button whose backlight mirrors a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorRef {
    pub panel: PanelId,
    pub button: u8,
}

/// A controllable device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub kind: DeviceKind,
    /// Room-state tag present in the room-state set while this device is on.
    pub carry_state: Option<String>,
    pub links: Vec<DeviceId>,
    pub repels: Vec<DeviceId>,
    pub indicators: Vec<IndicatorRef>,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Associate a panel button with this device.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::ButtonOutOfRange`] if `button` is not a
    /// valid key index.
    pub fn add_indicator(&mut self, panel: PanelId, button: u8) -> Result<(), RoomError> {
        if button >= BUTTONS_PER_PANEL {
            return Err(ValidationError::ButtonOutOfRange(button).into());
        }
        let indicator = IndicatorRef { panel, button };
        if !self.indicators.contains(&indicator) {
            self.indicators.push(indicator);
        }
        Ok(())
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] when:
    /// - `name` is empty ([`ValidationError::EmptyName`])
    /// - an indicator points past the last key ([`ValidationError::ButtonOutOfRange`])
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if let Some(bad) = self
            .indicators
            .iter()
            .find(|i| i.button >= BUTTONS_PER_PANEL)
        {
            return Err(ValidationError::ButtonOutOfRange(bad.button).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    name: Option<String>,
    kind: Option<DeviceKind>,
    carry_state: Option<String>,
    links: Vec<DeviceId>,
    repels: Vec<DeviceId>,
    indicators: Vec<IndicatorRef>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn carry_state(mut self, tag: impl Into<String>) -> Self {
        self.carry_state = Some(tag.into());
        self
    }

    #[must_use]
    pub fn link(mut self, id: impl Into<DeviceId>) -> Self {
        self.links.push(id.into());
        self
    }

    #[must_use]
    pub fn repel(mut self, id: impl Into<DeviceId>) -> Self {
        self.repels.push(id.into());
        self
    }

    #[must_use]
    pub fn indicator(mut self, panel: impl Into<PanelId>, button: u8) -> Self {
        self.indicators.push(IndicatorRef {
            panel: panel.into(),
            button,
        });
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// Defaults to an id of `0` and the [`DeviceKind::Heartbeat`] kind when
    /// those are not set.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] if the name is empty or an indicator
    /// is out of range.
    pub fn build(self) -> Result<Device, RoomError> {
        let device = Device {
            id: self.id.unwrap_or(DeviceId::new(0)),
            name: self.name.unwrap_or_default(),
            kind: self.kind.unwrap_or(DeviceKind::Heartbeat),
            carry_state: self.carry_state.filter(|tag| !tag.is_empty()),
            links: self.links,
            repels: self.repels,
            indicators: self.indicators,
        };
        device.validate()?;
        Ok(device)
    }
}

/// Something suspicious about the link/repel graph.
///
/// None of these is fatal: propagation tolerates all of them at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkWarning {
    SelfLink(DeviceId),
    SelfRepel(DeviceId),
    DanglingLink { from: DeviceId, to: DeviceId },
    DanglingRepel { from: DeviceId, to: DeviceId },
    /// Devices forming a link cycle, in traversal order.
    LinkCycle(Vec<DeviceId>),
}

impl fmt::Display for LinkWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfLink(id) => write!(f, "device {id} links to itself"),
            Self::SelfRepel(id) => write!(f, "device {id} repels itself"),
            Self::DanglingLink { from, to } => {
                write!(f, "device {from} links to unknown device {to}")
            }
            Self::DanglingRepel { from, to } => {
                write!(f, "device {from} repels unknown device {to}")
            }
            Self::LinkCycle(path) => {
                let names: Vec<String> = path.iter().map(ToString::to_string).collect();
                write!(f, "link cycle {}", names.join(" -> "))
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Inspect the link/repel graph for self references, dangling ids and cycles.
#[must_use]
pub fn diagnose_links(devices: &[Device]) -> Vec<LinkWarning> {
    let graph: HashMap<DeviceId, &Device> = devices.iter().map(|d| (d.id, d)).collect();
    let mut warnings = Vec::new();

    for device in devices {
        for &to in &device.links {
            if to == device.id {
                warnings.push(LinkWarning::SelfLink(to));
            } else if !graph.contains_key(&to) {
                warnings.push(LinkWarning::DanglingLink {
                    from: device.id,
                    to,
                });
            }
        }
        for &to in &device.repels {
            if to == device.id {
                warnings.push(LinkWarning::SelfRepel(to));
            } else if !graph.contains_key(&to) {
                warnings.push(LinkWarning::DanglingRepel {
                    from: device.id,
                    to,
                });
            }
        }
    }

    let mut ids: Vec<DeviceId> = graph.keys().copied().collect();
    ids.sort_unstable();
    let mut marks = HashMap::new();
    let mut path = Vec::new();
    for id in ids {
        if !marks.contains_key(&id) {
            visit(id, &graph, &mut marks, &mut path, &mut warnings);
        }
    }
    warnings
}

fn visit(
    id: DeviceId,
    graph: &HashMap<DeviceId, &Device>,
    marks: &mut HashMap<DeviceId, Mark>,
    path: &mut Vec<DeviceId>,
    warnings: &mut Vec<LinkWarning>,
) {
    marks.insert(id, Mark::InProgress);
    path.push(id);
    if let Some(device) = graph.get(&id) {
        for &next in &device.links {
            if next == id || !graph.contains_key(&next) {
                continue;
            }
            match marks.get(&next) {
                None => visit(next, graph, marks, path, warnings),
                Some(Mark::InProgress) => {
                    let start = path.iter().position(|p| *p == next).unwrap_or(0);
                    warnings.push(LinkWarning::LinkCycle(path[start..].to_vec()));
                }
                Some(Mark::Done) => {}
            }
        }
    }
    path.pop();
    marks.insert(id, Mark::Done);
}
