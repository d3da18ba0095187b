//! A small demo room: lights, a curtain pair, doorbell, hall sensor, door
//! contact and one five-key panel.
//!
//! | Input | Kind | Scenes |
//! |-------|------|--------|
//! | hall sensor, channel 1 | infrared, occupancy | Welcome |
//! | hall timeout, channel 1 | infrared timeout | Goodbye |
//! | door, channel 2 | low level, door | |
//! | doorbell, channel 3 | high level, doorbell | Ring |
//! | panel 1 key 0 | key | Welcome, Lights off |
//! | panel 1 key 1 | key | Reading |
//! | panel 1 key 2 | key | Curtain open, Curtain close |
//! | panel 1 key 3 | key | Do not disturb |
//! | panel 1 key 4 | key | Sleep (mode) |

use std::time::Duration;

use roomctl_domain::device::{Device, DeviceKind};
use roomctl_domain::error::RoomError;
use roomctl_domain::input::{ChannelInputSpec, InputTag, PanelButtonSpec, TriggerKind};
use roomctl_domain::layout::RoomLayout;
use roomctl_domain::scene::Scene;

/// Panel carrying every demo key.
pub const DEMO_PANEL: u8 = 1;

/// Physical channel of the hall presence sensor.
pub const HALL_SENSOR_CHANNEL: u8 = 1;

/// Physical channel of the door contact.
pub const DOOR_CHANNEL: u8 = 2;

/// Physical channel of the doorbell.
pub const DOORBELL_CHANNEL: u8 = 3;

const CEILING: u16 = 1;
const BEDSIDE: u16 = 2;
const READING: u16 = 3;
const CURTAIN_OPEN: u16 = 4;
const CURTAIN_CLOSE: u16 = 5;
const BELL: u16 = 6;
const HEARTBEAT: u16 = 20;
const ROOM_STATE: u16 = 21;
const DELAYER: u16 = 22;
const SNAPSHOT: u16 = 24;
const INDICATOR: u16 = 25;

fn switch(id: u16, name: &str, kind: DeviceKind) -> Device {
    Device {
        id: id.into(),
        name: name.to_string(),
        kind,
        carry_state: None,
        links: Vec::new(),
        repels: Vec::new(),
        indicators: Vec::new(),
    }
}

fn devices() -> Result<Vec<Device>, RoomError> {
    let mut ceiling = switch(CEILING, "Ceiling", DeviceKind::Lamp { channel: 1 });
    ceiling.links.push(BEDSIDE.into());
    ceiling.add_indicator(DEMO_PANEL.into(), 0)?;

    let bedside = switch(BEDSIDE, "Bedside", DeviceKind::Lamp { channel: 2 });

    let mut reading = switch(READING, "Reading lamp", DeviceKind::Lamp { channel: 3 });
    reading.carry_state = Some("reading".to_string());
    reading.add_indicator(DEMO_PANEL.into(), 1)?;

    let mut open = switch(CURTAIN_OPEN, "Curtain open", DeviceKind::Relay { channel: 4 });
    open.repels.push(CURTAIN_CLOSE.into());
    open.add_indicator(DEMO_PANEL.into(), 2)?;

    let mut close = switch(CURTAIN_CLOSE, "Curtain close", DeviceKind::Relay { channel: 5 });
    close.repels.push(CURTAIN_OPEN.into());

    let bell = switch(BELL, "Doorbell chime", DeviceKind::DryContact { channel: 6 });

    let helpers = [
        (HEARTBEAT, "Heartbeat", DeviceKind::Heartbeat),
        (ROOM_STATE, "Room state", DeviceKind::RoomState),
        (DELAYER, "Delayer", DeviceKind::Delayer),
        (SNAPSHOT, "Snapshot", DeviceKind::Snapshot),
        (INDICATOR, "Indicator", DeviceKind::Indicator),
    ];

    let mut devices = vec![ceiling, bedside, reading, open, close, bell];
    for (id, name, kind) in helpers {
        devices.push(Device::builder().id(id).name(name).kind(kind).build()?);
    }
    Ok(devices)
}

fn scenes() -> Result<Vec<Scene>, RoomError> {
    Ok(vec![
        Scene::builder()
            .id(1u16)
            .name("Welcome")
            .action(HEARTBEAT, "card_in", "")
            .action(CEILING, "on", "")
            .action(SNAPSHOT, "restore", "")
            .build()?,
        Scene::builder()
            .id(2u16)
            .name("Lights off")
            .action(CEILING, "off", "")
            .action(READING, "off", "")
            .build()?,
        Scene::builder()
            .id(3u16)
            .name("Goodbye")
            .action(SNAPSHOT, "record", "")
            .action(CEILING, "off", "")
            .action(READING, "off", "")
            .action(CURTAIN_CLOSE, "on", "")
            .action(HEARTBEAT, "card_out", "")
            .build()?,
        Scene::builder()
            .id(4u16)
            .name("Sleep")
            .mode(true)
            .action(READING, "off", "")
            .action(CEILING, "off", "")
            .action(DELAYER, "delay", "2")
            .action(BEDSIDE, "off", "")
            .action(HEARTBEAT, "sleep", "")
            .build()?,
        Scene::builder()
            .id(5u16)
            .name("Do not disturb")
            .action(ROOM_STATE, "toggle", "DND")
            .action(INDICATOR, "flash", "1,3")
            .build()?,
        Scene::builder()
            .id(6u16)
            .name("Curtain open")
            .action(CURTAIN_OPEN, "on", "")
            .build()?,
        Scene::builder()
            .id(7u16)
            .name("Curtain close")
            .action(CURTAIN_CLOSE, "on", "")
            .build()?,
        Scene::builder()
            .id(8u16)
            .name("Reading")
            .action(READING, "toggle", "")
            .build()?,
        Scene::builder()
            .id(9u16)
            .name("Ring")
            .action(BELL, "on", "")
            .action(DELAYER, "delay", "1")
            .action(BELL, "off", "")
            .build()?,
    ])
}

/// Build the demo room. The room starts unoccupied.
///
/// # Errors
///
/// Returns [`RoomError::Validation`] if the hardcoded layout is invalid
/// (should not happen).
pub fn demo_layout() -> Result<RoomLayout, RoomError> {
    let mut layout = RoomLayout::new().occupied(false);
    for device in devices()? {
        layout = layout.device(device);
    }
    for scene in scenes()? {
        layout = layout.scene(scene);
    }

    let layout = layout
        .channel(
            ChannelInputSpec::new(1u16, "Hall sensor", HALL_SENSOR_CHANNEL, TriggerKind::Infrared)
                .tag(InputTag::OccupancyChannel)
                .tag(InputTag::RemoveCardUsable)
                .debounce(Duration::from_secs(30))
                .scene(1u16),
        )
        .channel(
            ChannelInputSpec::new(2u16, "Hall timeout", HALL_SENSOR_CHANNEL, TriggerKind::InfraredTimeout)
                .tag(InputTag::IgnoreAnyKey)
                .scene(3u16),
        )
        .channel(
            ChannelInputSpec::new(3u16, "Door", DOOR_CHANNEL, TriggerKind::LowLevel)
                .tag(InputTag::DoorChannel)
                .tag(InputTag::RemoveCardUsable),
        )
        .channel(
            ChannelInputSpec::new(4u16, "Doorbell", DOORBELL_CHANNEL, TriggerKind::HighLevel)
                .tag(InputTag::DoorbellChannel)
                .tag(InputTag::RemoveCardUsable)
                .scene(9u16),
        )
        .button(
            PanelButtonSpec::new(10u16, "Master", DEMO_PANEL, 0)
                .scene(1u16)
                .scene(2u16),
        )
        .button(PanelButtonSpec::new(11u16, "Reading", DEMO_PANEL, 1).scene(8u16))
        .button(
            PanelButtonSpec::new(12u16, "Curtain", DEMO_PANEL, 2)
                .scene(6u16)
                .scene(7u16),
        )
        .button(PanelButtonSpec::new(13u16, "Do not disturb", DEMO_PANEL, 3).scene(5u16))
        .button(PanelButtonSpec::new(14u16, "Sleep", DEMO_PANEL, 4).scene(4u16));

    layout.validate()?;
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomctl_domain::device::diagnose_links;

    #[test]
    fn should_build_valid_demo_layout() {
        let layout = demo_layout().unwrap();
        assert_eq!(layout.scenes.len(), 9);
        assert_eq!(layout.buttons.len(), 5);
        assert!(!layout.occupied);
    }

    #[test]
    fn should_have_no_link_warnings_in_demo() {
        let layout = demo_layout().unwrap();
        assert!(diagnose_links(&layout.devices).is_empty());
    }
}
