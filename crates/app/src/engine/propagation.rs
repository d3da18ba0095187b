//! Device execution with link and repel propagation.
//!
//! `execute` applies an operation to one device, then:
//! - keeps the device's carried room-state tag in line with its new state,
//! - outside of modes, logs the operation and mirrors it onto every linked
//!   device,
//! - when the device was switched on, forces every repelled device off.
//!
//! A visited set travels with each top-level call, so link cycles
//! terminate and every device is reached through links at most once per
//! call. The set is local to the call; concurrent scenes never see each
//! other's. Repels are always applied, even to devices already visited.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use roomctl_domain::event::EventKind;
use roomctl_domain::id::DeviceId;

use super::Orchestrator;
use super::scene_engine::SceneRun;
use crate::registry::Registry;

/// What the executing scene should do after a device call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Sleep for the given time, cancellably.
    Pause(Duration),
    /// Stop the scene here.
    Abort,
}

/// State of one top-level `execute` call.
pub(crate) struct Walk<'a> {
    pub registry: &'a Arc<Registry>,
    pub run: Option<&'a SceneRun>,
    visited: HashSet<DeviceId>,
}

impl Orchestrator {
    /// Execute `operation(parameter)` on `device` and propagate it.
    ///
    /// `run` is the scene on whose behalf this happens, if any. `should_log`
    /// is `false` inside a mode: the operation is then neither logged nor
    /// mirrored onto linked devices.
    ///
    /// Unknown devices and unsupported operations are logged and skipped.
    pub fn execute(
        &self,
        device: DeviceId,
        operation: &str,
        parameter: &str,
        run: Option<&SceneRun>,
        should_log: bool,
    ) -> Flow {
        let registry = self.registry();
        let mut walk = Walk {
            registry: &registry,
            run,
            visited: HashSet::new(),
        };
        self.propagate(&mut walk, device, operation, parameter, should_log)
    }

    /// Whether `device` is currently on. Helper devices are never on.
    #[must_use]
    pub fn is_on(&self, device: DeviceId) -> bool {
        self.registry()
            .device(device)
            .and_then(|d| d.kind.relay_channel())
            .is_some_and(|channel| self.inner.ports.relays.relay_state(channel))
    }

    fn propagate(
        &self,
        walk: &mut Walk<'_>,
        id: DeviceId,
        operation: &str,
        parameter: &str,
        should_log: bool,
    ) -> Flow {
        let registry = walk.registry;
        let Some(device) = registry.device(id) else {
            tracing::warn!(device = %id, operation, "device not found, skipped");
            return Flow::Continue;
        };
        if !walk.visited.insert(id) {
            return Flow::Continue;
        }

        let effect = self.apply(registry, device, operation, parameter, walk.run);

        if let (Some(tag), Some(on)) = (&device.carry_state, effect.switched) {
            self.context().with_room_states(|states| states.set(tag, on));
        }

        if should_log {
            self.publish(EventKind::DeviceOperated {
                device: id,
                name: device.name.clone(),
                operation: operation.to_string(),
                parameter: parameter.to_string(),
            });
            for &link in &device.links {
                if !walk.visited.contains(&link) {
                    self.propagate(walk, link, operation, parameter, true);
                }
            }
        }

        // Repels ignore the visited set: a device switched on earlier in
        // this call must still be forced off. "off" never repels further.
        if effect.switched == Some(true) {
            for &repel in &device.repels {
                let mut forced = Walk {
                    registry,
                    run: walk.run,
                    visited: HashSet::new(),
                };
                self.propagate(&mut forced, repel, "off", "", false);
            }
        }

        effect.flow
    }
}

#[cfg(test)]
mod tests {
    use roomctl_domain::device::{Device, DeviceBuilder, DeviceKind};
    use roomctl_domain::event::EventKind;
    use roomctl_domain::id::DeviceId;
    use roomctl_domain::layout::RoomLayout;

    use super::Flow;
    use crate::engine::testing::rig;
    use crate::ports::RelayBus;

    fn lamp(id: u16) -> DeviceBuilder {
        Device::builder()
            .id(id)
            .name(format!("Lamp {id}"))
            .kind(DeviceKind::Lamp {
                channel: u8::try_from(id).unwrap(),
            })
    }

    fn operated(kinds: &[EventKind]) -> Vec<DeviceId> {
        kinds
            .iter()
            .filter_map(|k| match k {
                EventKind::DeviceOperated { device, .. } => Some(*device),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn should_terminate_when_links_form_a_cycle() {
        let layout = RoomLayout::new()
            .device(lamp(1).link(2u16).build().unwrap())
            .device(lamp(2).link(1u16).build().unwrap());
        let rig = rig(layout);

        let flow = rig.engine.execute(DeviceId::new(1), "on", "", None, true);

        assert_eq!(flow, Flow::Continue);
        assert_eq!(rig.relays.commands(), vec![(1, true), (2, true)]);
    }

    #[test]
    fn should_execute_each_device_once_when_links_converge() {
        // 1 -> 2, 1 -> 3, 2 -> 3, 3 -> 1
        let layout = RoomLayout::new()
            .device(lamp(1).link(2u16).link(3u16).build().unwrap())
            .device(lamp(2).link(3u16).build().unwrap())
            .device(lamp(3).link(1u16).build().unwrap());
        let rig = rig(layout);

        rig.engine.execute(DeviceId::new(1), "toggle", "", None, true);

        assert_eq!(rig.relays.commands(), vec![(1, true), (2, true), (3, true)]);
        assert_eq!(
            operated(&rig.events.kinds()),
            vec![DeviceId::new(1), DeviceId::new(2), DeviceId::new(3)]
        );
    }

    #[test]
    fn should_not_follow_links_when_inside_mode() {
        let layout = RoomLayout::new()
            .device(lamp(1).link(2u16).build().unwrap())
            .device(lamp(2).build().unwrap());
        let rig = rig(layout);

        rig.engine.execute(DeviceId::new(1), "on", "", None, false);

        assert_eq!(rig.relays.commands(), vec![(1, true)]);
        assert!(operated(&rig.events.kinds()).is_empty());
    }

    #[test]
    fn should_force_repelled_devices_off_when_turned_on() {
        let layout = RoomLayout::new()
            .device(lamp(1).repel(2u16).build().unwrap())
            .device(lamp(2).build().unwrap());
        let rig = rig(layout);
        rig.relays.set_relay(2, true);

        rig.engine.execute(DeviceId::new(1), "on", "", None, false);

        assert!(rig.relays.is_on(1));
        assert!(!rig.relays.is_on(2));
    }

    #[test]
    fn should_force_repelled_device_off_when_link_switched_it_on() {
        // 1 links 2 and 3, 3 repels 2
        let layout = RoomLayout::new()
            .device(lamp(1).link(2u16).link(3u16).build().unwrap())
            .device(lamp(2).build().unwrap())
            .device(lamp(3).repel(2u16).build().unwrap());
        let rig = rig(layout);

        rig.engine.execute(DeviceId::new(1), "on", "", None, true);

        assert!(rig.relays.is_on(1));
        assert!(rig.relays.is_on(3));
        assert!(!rig.relays.is_on(2));
        assert_eq!(
            rig.relays.commands(),
            vec![(1, true), (2, true), (3, true), (2, false)]
        );
    }

    #[test]
    fn should_force_repelled_device_off_when_inside_mode() {
        let layout = RoomLayout::new()
            .device(lamp(1).repel(2u16).build().unwrap())
            .device(lamp(2).repel(1u16).build().unwrap());
        let rig = rig(layout);
        rig.relays.set_relay(1, true);

        rig.engine.execute(DeviceId::new(2), "on", "", None, false);

        assert!(rig.relays.is_on(2));
        assert!(!rig.relays.is_on(1));
    }

    #[test]
    fn should_terminate_and_end_off_when_device_repels_itself() {
        let layout = RoomLayout::new().device(lamp(1).repel(1u16).build().unwrap());
        let rig = rig(layout);

        let flow = rig.engine.execute(DeviceId::new(1), "on", "", None, true);

        assert_eq!(flow, Flow::Continue);
        assert_eq!(rig.relays.commands(), vec![(1, true), (1, false)]);
    }

    #[test]
    fn should_leave_repelled_devices_alone_when_turned_off() {
        let layout = RoomLayout::new()
            .device(lamp(1).repel(2u16).build().unwrap())
            .device(lamp(2).build().unwrap());
        let rig = rig(layout);
        rig.relays.set_relay(1, true);
        rig.relays.set_relay(2, true);

        rig.engine.execute(DeviceId::new(1), "off", "", None, true);

        assert!(rig.relays.is_on(2));
    }

    #[test]
    fn should_skip_missing_link_and_continue() {
        let layout = RoomLayout::new()
            .device(lamp(1).link(9u16).link(2u16).build().unwrap())
            .device(lamp(2).build().unwrap());
        let rig = rig(layout);

        rig.engine.execute(DeviceId::new(1), "on", "", None, true);

        assert!(rig.relays.is_on(2));
    }

    #[test]
    fn should_track_carried_state_when_switched() {
        let layout = RoomLayout::new().device(lamp(1).carry_state("reading").build().unwrap());
        let rig = rig(layout);

        rig.engine.execute(DeviceId::new(1), "on", "", None, true);
        assert!(rig.engine.context().has_state("reading"));

        rig.engine.execute(DeviceId::new(1), "off", "", None, true);
        assert!(!rig.engine.context().has_state("reading"));
    }

    #[test]
    fn should_ignore_unknown_device() {
        let rig = rig(RoomLayout::new());
        let flow = rig.engine.execute(DeviceId::new(7), "on", "", None, true);
        assert_eq!(flow, Flow::Continue);
        assert!(rig.relays.commands().is_empty());
    }

    #[test]
    fn should_report_switch_state_through_is_on() {
        let rig = rig(RoomLayout::new().device(lamp(1).build().unwrap()));
        assert!(!rig.engine.is_on(DeviceId::new(1)));
        rig.engine.execute(DeviceId::new(1), "open", "", None, true);
        assert!(rig.engine.is_on(DeviceId::new(1)));
    }
}
