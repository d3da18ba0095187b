//! Command: the typed form of an atomic action's `(operation, parameter)`
//! pair, interpreted against the kind of the target device.
//!
//! Scenes store operations as plain strings (that is what configuration
//! provides); parsing happens at execution time so that a single bad action
//! is logged and skipped instead of rejecting the whole layout.

use std::time::Duration;

use crate::device::DeviceKind;
use crate::error::ValidationError;
use crate::id::{PanelId, SceneId};
use crate::panel::BUTTONS_PER_PANEL;

/// Room-state tag whose addition triggers an immediate state report.
pub const SOS_STATE: &str = "SOS";

/// Room-state tag ("do not disturb") that mutes the doorbell.
pub const DND_STATE: &str = "DND";

/// Operation for relay-backed switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Switching {
    On,
    Off,
    Toggle,
}

impl Switching {
    /// Resolve the target state given the current one.
    #[must_use]
    pub fn target(self, currently_on: bool) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Toggle => !currently_on,
        }
    }
}

/// What an indicator device does to its button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorMode {
    On,
    Off,
    /// Light up immediately, then go dark after the configured flash time.
    Flash,
}

/// A parsed device operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Switch(Switching),
    Sleep,
    CardIn,
    CardOut,
    AddState(String),
    RemoveState(String),
    ToggleState(String),
    /// Abort the executing scene when the tag is present.
    ExitIfState(String),
    Delay(Duration),
    InvokeScene(SceneId),
    CancelScene(SceneId),
    ArmAnyKey(SceneId),
    ClearAnyKey,
    RecordSnapshot,
    RestoreSnapshot,
    DiscardSnapshot,
    DiscardSnapshotAndExit,
    Indicator {
        panel: PanelId,
        button: u8,
        mode: IndicatorMode,
    },
}

impl Command {
    /// Interpret `operation`/`parameter` for a device of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownOperation`] when the kind does not
    /// understand `operation`, or [`ValidationError::InvalidParameter`] when
    /// the parameter cannot be parsed.
    pub fn parse(kind: &DeviceKind, operation: &str, parameter: &str) -> Result<Self, ValidationError> {
        let op = operation.trim();
        let unknown = || ValidationError::UnknownOperation {
            kind: kind.label(),
            operation: operation.to_string(),
        };
        let invalid = || ValidationError::InvalidParameter {
            operation: operation.to_string(),
            parameter: parameter.to_string(),
        };

        match kind {
            DeviceKind::Lamp { .. } | DeviceKind::Relay { .. } | DeviceKind::DryContact { .. } => {
                parse_switching(op).map(Self::Switch).ok_or_else(unknown)
            }
            DeviceKind::Heartbeat => match op {
                "sleep" => Ok(Self::Sleep),
                "card_in" => Ok(Self::CardIn),
                "card_out" => Ok(Self::CardOut),
                _ => Err(unknown()),
            },
            DeviceKind::RoomState => {
                let tag = parameter.trim();
                if tag.is_empty() {
                    return Err(invalid());
                }
                let tag = tag.to_string();
                match op {
                    "add" => Ok(Self::AddState(tag)),
                    "remove" => Ok(Self::RemoveState(tag)),
                    "toggle" => Ok(Self::ToggleState(tag)),
                    "exit_if_present" => Ok(Self::ExitIfState(tag)),
                    _ => Err(unknown()),
                }
            }
            DeviceKind::Delayer => match op {
                "delay" => parameter
                    .trim()
                    .parse::<u64>()
                    .map(|secs| Self::Delay(Duration::from_secs(secs)))
                    .map_err(|_| invalid()),
                _ => Err(unknown()),
            },
            DeviceKind::SceneControl => {
                if op == "clear_any_key" {
                    return Ok(Self::ClearAnyKey);
                }
                let build: fn(SceneId) -> Self = match op {
                    "invoke" => Self::InvokeScene,
                    "cancel" => Self::CancelScene,
                    "arm_any_key" => Self::ArmAnyKey,
                    _ => return Err(unknown()),
                };
                parameter
                    .parse::<SceneId>()
                    .map(build)
                    .map_err(|_| invalid())
            }
            DeviceKind::Snapshot => match op {
                "record" => Ok(Self::RecordSnapshot),
                "restore" => Ok(Self::RestoreSnapshot),
                "discard" => Ok(Self::DiscardSnapshot),
                "discard_and_exit" => Ok(Self::DiscardSnapshotAndExit),
                _ => Err(unknown()),
            },
            DeviceKind::Indicator => {
                let mode = match op {
                    "on" => IndicatorMode::On,
                    "off" => IndicatorMode::Off,
                    "flash" => IndicatorMode::Flash,
                    _ => return Err(unknown()),
                };
                let (panel, button) = parameter.split_once(',').ok_or_else(invalid)?;
                let panel = panel.parse::<PanelId>().map_err(|_| invalid())?;
                let button = button.trim().parse::<u8>().map_err(|_| invalid())?;
                if button >= BUTTONS_PER_PANEL {
                    return Err(ValidationError::ButtonOutOfRange(button));
                }
                Ok(Self::Indicator {
                    panel,
                    button,
                    mode,
                })
            }
        }
    }
}

fn parse_switching(op: &str) -> Option<Switching> {
    match op {
        "on" | "open" => Some(Switching::On),
        "off" | "close" => Some(Switching::Off),
        "toggle" => Some(Switching::Toggle),
        _ => None,
    }
}
