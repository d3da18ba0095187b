//! Channel report routing and the presence debouncer.
//!
//! Several inputs may share one physical channel number. A report is
//! routed to all of them: level inputs fire when the bit matches their
//! trigger, infrared inputs feed their debouncer. Tag checks (card bypass,
//! door, doorbell) look at the first input configured on the channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use roomctl_domain::command::DND_STATE;
use roomctl_domain::input::{InputTag, TriggerKind};
use roomctl_domain::presence::{
    PresenceEffect, PresenceState, TimeoutVerdict, debounce_duration, judge_timeout,
};

use super::Orchestrator;
use crate::registry::{ChannelSlot, Registry};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Debouncer of one infrared input.
///
/// `generation` changes whenever the pending timer is replaced or
/// disarmed; a timer that fires with a stale generation does nothing.
#[derive(Debug, Default)]
pub(crate) struct PresenceSlot {
    state: PresenceState,
    timer: Option<AbortHandle>,
    generation: u64,
}

impl PresenceSlot {
    pub(crate) fn state(&self) -> PresenceState {
        self.state
    }

    pub(crate) fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Report {
    Level,
    Infrared,
}

impl Orchestrator {
    /// A dry-contact channel reported `bit`.
    #[tracing::instrument(skip(self))]
    pub fn on_channel_level(&self, channel: u8, bit: bool) {
        self.route_channel(channel, bit, Report::Level);
    }

    /// An infrared channel reported a presence sample.
    #[tracing::instrument(skip(self))]
    pub fn on_channel_infrared(&self, channel: u8, bit: bool) {
        self.route_channel(channel, bit, Report::Infrared);
    }

    fn route_channel(&self, channel: u8, bit: bool, report: Report) {
        let registry = self.registry();
        let Some((_, first)) = registry.inputs_on_channel(channel).next() else {
            tracing::warn!(channel, "no input configured on channel");
            return;
        };
        let ctx = self.context();

        if !ctx.is_occupied() && !first.spec.has_tag(InputTag::RemoveCardUsable) {
            tracing::info!(channel, "room unoccupied, report dropped");
            return;
        }

        if first.spec.has_tag(InputTag::DoorChannel) {
            if bit {
                ctx.record_door_closed();
            } else {
                ctx.record_door_opened();
            }
            tracing::debug!(channel, closed = bit, "door");
            self.feed_door_to_occupancy(&registry);
        } else if first.spec.has_tag(InputTag::DoorbellChannel) && ctx.has_state(DND_STATE) {
            tracing::info!(channel, "doorbell muted");
            return;
        }

        for (index, slot) in registry.inputs_on_channel(channel) {
            match report {
                Report::Level if slot.spec.trigger.matches_level(bit) => {
                    self.dispatch_channel(&registry, slot);
                }
                Report::Infrared if slot.spec.trigger == TriggerKind::Infrared => {
                    self.sample_presence(&registry, index, bit);
                }
                _ => {}
            }
        }
    }

    /// A door movement counts as a missing presence pulse on an infrared
    /// occupancy channel.
    fn feed_door_to_occupancy(&self, registry: &Arc<Registry>) {
        let Some(occupancy) = registry.occupancy_channel() else {
            return;
        };
        if !occupancy.spec.trigger.is_infrared() {
            return;
        }
        let channel = occupancy.spec.channel;
        let sensors: Vec<usize> = registry
            .inputs_on_channel(channel)
            .filter(|(_, slot)| slot.spec.trigger == TriggerKind::Infrared)
            .map(|(index, _)| index)
            .collect();
        for index in sensors {
            self.sample_presence(registry, index, false);
        }
    }

    /// Fire a level or timeout input: wake the room, then the any-key
    /// override or the input's next scene.
    fn dispatch_channel(&self, registry: &Arc<Registry>, slot: &ChannelSlot) {
        self.wake_if_sleeping(registry);
        let override_scene = if slot.spec.has_tag(InputTag::IgnoreAnyKey) {
            None
        } else {
            self.context().take_any_key()
        };
        match override_scene.or_else(|| slot.cycle.advance()) {
            Some(scene) => {
                tracing::debug!(input = %slot.spec.id, %scene, "channel input fired");
                self.run_scene(scene);
            }
            None => tracing::debug!(input = %slot.spec.id, "channel input has no scene"),
        }
    }

    fn sample_presence(&self, registry: &Arc<Registry>, index: usize, present: bool) {
        let Some(slot) = registry.channel_at(index) else {
            return;
        };
        let transition = {
            let mut presence = lock(&slot.presence);
            let transition = presence.state.on_sample(present);
            presence.state = transition.next;
            match transition.effect {
                PresenceEffect::ArmTimer => self.arm_timer(registry, index, &mut presence),
                PresenceEffect::DisarmTimer => presence.disarm(),
                PresenceEffect::Dispatch | PresenceEffect::Nothing => {}
            }
            transition
        };
        tracing::debug!(input = %slot.spec.id, present, state = ?transition.next, "presence sample");

        let ctx = self.context();
        if transition.presence_seen {
            ctx.stamp_presence();
        }
        if transition.effect == PresenceEffect::Dispatch
            && let Some(scene) = ctx.take_any_key().or_else(|| slot.cycle.advance())
        {
            self.run_scene(scene);
        }
    }

    /// (Re)start the debounce timer, replacing any pending one.
    fn arm_timer(&self, registry: &Arc<Registry>, index: usize, presence: &mut PresenceSlot) {
        let Some(slot) = registry.channel_at(index) else {
            return;
        };
        presence.disarm();
        let generation = presence.generation;
        let duration = debounce_duration(
            slot.spec.debounce,
            self.inner.ports.clock.local_hour(),
            self.inner.settings.night,
        );

        let Ok(runtime) = Handle::try_current() else {
            tracing::error!(input = %slot.spec.id, "no runtime, debounce timer not armed");
            return;
        };
        let engine = self.clone();
        let registry = Arc::clone(registry);
        let task = runtime.spawn(async move {
            tokio::time::sleep(duration).await;
            engine.on_presence_timeout(&registry, index, generation);
        });
        presence.timer = Some(task.abort_handle());
        tracing::debug!(input = %slot.spec.id, ?duration, "debounce timer armed");
    }

    fn on_presence_timeout(&self, registry: &Arc<Registry>, index: usize, generation: u64) {
        let Some(slot) = registry.channel_at(index) else {
            return;
        };
        {
            let mut presence = lock(&slot.presence);
            if presence.generation != generation || presence.state != PresenceState::Uncertain {
                return;
            }
            presence.timer = None;

            if slot.spec.has_tag(InputTag::OccupancyChannel) {
                let evidence = self.context().occupancy_evidence();
                match judge_timeout(evidence, self.inner.settings.recent_activity) {
                    TimeoutVerdict::Rearm => {
                        tracing::info!(input = %slot.spec.id, ?evidence, "guest may still be present, waiting");
                        self.arm_timer(registry, index, &mut presence);
                        return;
                    }
                    TimeoutVerdict::Reject => {
                        presence.state = PresenceState::Idle;
                        tracing::info!(input = %slot.spec.id, "no leave cycle observed, timeout ignored");
                        return;
                    }
                    TimeoutVerdict::Proceed => {}
                }
            }
            presence.state = PresenceState::Idle;
        }
        tracing::info!(input = %slot.spec.id, "presence timed out");

        for (_, input) in registry.inputs_on_channel(slot.spec.channel) {
            if input.spec.trigger == TriggerKind::InfraredTimeout {
                self.dispatch_channel(registry, input);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use roomctl_domain::device::{Device, DeviceKind};
    use roomctl_domain::event::EventKind;
    use roomctl_domain::id::SceneId;
    use roomctl_domain::input::{ChannelInputSpec, InputTag, TriggerKind};
    use roomctl_domain::layout::RoomLayout;
    use roomctl_domain::presence::PresenceState;
    use roomctl_domain::scene::Scene;

    use crate::engine::testing::{Rig, rig, rig_at};

    const SENSOR: u8 = 4;
    const DOOR: u8 = 5;

    fn lamp(id: u16) -> Device {
        Device::builder()
            .id(id)
            .name(format!("Lamp {id}"))
            .kind(DeviceKind::Lamp {
                channel: u8::try_from(id).unwrap(),
            })
            .build()
            .unwrap()
    }

    fn scene(id: u16, lamp: Option<u16>) -> Scene {
        let mut builder = Scene::builder().id(id).name(format!("Scene {id}"));
        if let Some(lamp) = lamp {
            builder = builder.action(lamp, "on", "");
        }
        builder.build().unwrap()
    }

    fn base() -> RoomLayout {
        RoomLayout::new()
            .occupied(true)
            .device(lamp(1))
            .device(lamp(2))
            .device(lamp(3))
            .scene(scene(1, Some(1)))
            .scene(scene(2, Some(2)))
            .scene(scene(3, Some(3)))
            .scene(scene(9, None))
    }

    /// Sensor on channel 4 with a 10 s debounce: presence runs scene 1,
    /// timeout runs scene 2.
    fn sensor_layout(occupancy: bool) -> RoomLayout {
        let mut sensor = ChannelInputSpec::new(1u16, "Hall", SENSOR, TriggerKind::Infrared)
            .debounce(Duration::from_secs(10))
            .scene(1u16);
        if occupancy {
            sensor = sensor.tag(InputTag::OccupancyChannel);
        }
        base()
            .channel(sensor)
            .channel(
                ChannelInputSpec::new(2u16, "Hall timeout", SENSOR, TriggerKind::InfraredTimeout)
                    .scene(2u16),
            )
            .channel(ChannelInputSpec::new(3u16, "Door", DOOR, TriggerKind::LowLevel).tag(InputTag::DoorChannel))
    }

    fn presence(rig: &Rig) -> PresenceState {
        rig.engine.registry().channel_at(0).unwrap().presence()
    }

    async fn settle() {
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_run_scene_when_presence_appears() {
        let rig = rig(sensor_layout(false));

        rig.engine.on_channel_infrared(SENSOR, true);
        settle().await;

        assert!(rig.relays.is_on(1));
        assert_eq!(presence(&rig), PresenceState::Active);
        assert!(rig.engine.context().timeline().last_presence.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_dispatch_again_when_presence_continues() {
        let rig = rig(sensor_layout(false));

        rig.engine.on_channel_infrared(SENSOR, true);
        settle().await;
        rig.engine.on_channel_infrared(SENSOR, true);
        settle().await;

        assert_eq!(rig.relays.commands(), vec![(1, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_timeout_scene_when_debounce_expires() {
        let rig = rig(sensor_layout(false));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);
        assert_eq!(presence(&rig), PresenceState::Uncertain);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(!rig.relays.is_on(2));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rig.relays.is_on(2));
        assert_eq!(presence(&rig), PresenceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn should_double_debounce_when_hour_is_at_night() {
        let rig = rig_at(sensor_layout(false), Some(23));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert!(!rig.relays.is_on(2));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_use_base_debounce_when_clock_unavailable() {
        let rig = rig_at(sensor_layout(false), None);

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_cancel_timeout_when_presence_returns() {
        let rig = rig(sensor_layout(false));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        rig.engine.on_channel_infrared(SENSOR, true);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!rig.relays.is_on(2));
        assert_eq!(presence(&rig), PresenceState::Active);
        assert_eq!(rig.relays.commands(), vec![(1, true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_deadline_when_absence_repeats() {
        let rig = rig(sensor_layout(false));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);
        tokio::time::sleep(Duration::from_secs(5)).await;
        rig.engine.on_channel_infrared(SENSOR, false);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_rearm_when_door_still_open() {
        let rig = rig(sensor_layout(true));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_level(DOOR, false);
        assert!(rig.engine.context().is_door_open());
        assert_eq!(presence(&rig), PresenceState::Uncertain);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(!rig.relays.is_on(2));
        assert_eq!(presence(&rig), PresenceState::Uncertain);

        rig.engine.on_channel_level(DOOR, true);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(!rig.relays.is_on(2));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_ignore_timeout_when_no_leave_cycle_observed() {
        let rig = rig(sensor_layout(true));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(!rig.relays.is_on(2));
        assert_eq!(presence(&rig), PresenceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn should_rearm_when_scene_ran_recently() {
        let rig = rig(sensor_layout(true));

        rig.engine.on_channel_infrared(SENSOR, true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        rig.engine.on_channel_level(DOOR, false);
        rig.engine.on_channel_level(DOOR, true);

        tokio::time::sleep(Duration::from_secs(5)).await;
        rig.engine.run_scene(SceneId::new(9));

        // deadline at 11 s, last scene 5 s old: wait another 10 s
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(!rig.relays.is_on(2));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_timeout_scene_once_when_guest_left() {
        let rig = rig(sensor_layout(true));

        rig.engine.on_channel_infrared(SENSOR, true);
        tokio::time::sleep(Duration::from_secs(1)).await;
        rig.engine.on_channel_level(DOOR, false);
        rig.engine.on_channel_level(DOOR, true);

        // deadline at 11 s; run well past a second debounce period
        tokio::time::sleep(Duration::from_secs(60)).await;

        let started = rig
            .events
            .kinds()
            .into_iter()
            .filter(|kind| {
                matches!(kind, EventKind::SceneStarted { scene, .. } if *scene == SceneId::new(2))
            })
            .count();
        assert_eq!(started, 1);
        let switched: Vec<_> = rig
            .relays
            .commands()
            .into_iter()
            .filter(|(channel, _)| *channel == 2)
            .collect();
        assert_eq!(switched, vec![(2, true)]);
        assert_eq!(presence(&rig), PresenceState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn should_drop_report_when_room_unoccupied() {
        let layout = base()
            .occupied(false)
            .channel(ChannelInputSpec::new(1u16, "Bath", 6, TriggerKind::HighLevel).scene(1u16))
            .channel(
                ChannelInputSpec::new(2u16, "Night light", 7, TriggerKind::HighLevel)
                    .tag(InputTag::RemoveCardUsable)
                    .scene(2u16),
            );
        let rig = rig(layout);

        rig.engine.on_channel_level(6, true);
        rig.engine.on_channel_level(7, true);
        settle().await;

        assert!(!rig.relays.is_on(1));
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_level_input_only_when_bit_matches() {
        let layout = base()
            .channel(ChannelInputSpec::new(1u16, "Rising", 6, TriggerKind::HighLevel).scene(1u16))
            .channel(ChannelInputSpec::new(2u16, "Falling", 6, TriggerKind::LowLevel).scene(2u16));
        let rig = rig(layout);

        rig.engine.on_channel_level(6, true);
        settle().await;
        assert!(rig.relays.is_on(1));
        assert!(!rig.relays.is_on(2));

        rig.engine.on_channel_level(6, false);
        settle().await;
        assert!(rig.relays.is_on(2));
    }

    #[tokio::test(start_paused = true)]
    async fn should_mute_doorbell_when_do_not_disturb() {
        let layout = base().channel(
            ChannelInputSpec::new(1u16, "Bell", 8, TriggerKind::HighLevel)
                .tag(InputTag::DoorbellChannel)
                .scene(1u16),
        );
        let rig = rig(layout);
        rig.engine.context().with_room_states(|s| s.add("DND"));

        rig.engine.on_channel_level(8, true);
        settle().await;
        assert!(!rig.relays.is_on(1));

        rig.engine.context().with_room_states(|s| s.remove("DND"));
        rig.engine.on_channel_level(8, true);
        settle().await;
        assert!(rig.relays.is_on(1));
    }

    #[tokio::test(start_paused = true)]
    async fn should_consume_any_key_unless_input_ignores_it() {
        let layout = base()
            .channel(ChannelInputSpec::new(1u16, "Switch", 6, TriggerKind::HighLevel).scene(1u16))
            .channel(
                ChannelInputSpec::new(2u16, "Sensor", 7, TriggerKind::HighLevel)
                    .tag(InputTag::IgnoreAnyKey)
                    .scene(2u16),
            );
        let rig = rig(layout);
        rig.engine.context().arm_any_key(SceneId::new(3));

        rig.engine.on_channel_level(7, true);
        settle().await;
        assert!(rig.relays.is_on(2));
        assert_eq!(rig.engine.context().any_key(), Some(SceneId::new(3)));

        rig.engine.on_channel_level(6, true);
        settle().await;
        assert!(rig.relays.is_on(3));
        assert!(!rig.relays.is_on(1));
        assert_eq!(rig.engine.context().any_key(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn should_wake_room_when_level_input_fires() {
        let layout = base().channel(ChannelInputSpec::new(1u16, "Switch", 6, TriggerKind::HighLevel).scene(9u16));
        let rig = rig(layout);
        rig.engine.context().set_sleeping(true);

        rig.engine.on_channel_level(6, true);

        assert!(!rig.engine.context().is_sleeping());
    }

    #[tokio::test(start_paused = true)]
    async fn should_disarm_timer_when_reconfigured() {
        let rig = rig(sensor_layout(false));

        rig.engine.on_channel_infrared(SENSOR, true);
        rig.engine.on_channel_infrared(SENSOR, false);
        rig.engine.reconfigure(sensor_layout(false)).unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!rig.relays.is_on(2));
    }

    #[test]
    fn should_ignore_unconfigured_channel() {
        let rig = rig(base());
        rig.engine.on_channel_level(12, true);
        rig.engine.on_channel_infrared(12, true);
        assert!(rig.relays.commands().is_empty());
    }
}
