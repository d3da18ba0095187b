//! Presence debouncing for infrared channels.
//!
//! Raw infrared pulses are noisy: a guest sitting still stops producing
//! them. The debouncer therefore has a third state, [`PresenceState::Uncertain`],
//! entered on the first missing pulse and left either by a new pulse (false
//! dropout) or by the debounce timer expiring (the guest really left).
//!
//! This module holds the pure parts: the transition table, the time-of-day
//! scaling of the debounce duration and the occupancy guards applied on
//! expiry. Timers live in the app crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Debounced presence of one infrared channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceState {
    #[default]
    Idle,
    Active,
    Uncertain,
}

/// Side effect requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEffect {
    /// Run the channel's next scene (or the any-key override).
    Dispatch,
    /// Start, or restart, the debounce timer.
    ArmTimer,
    DisarmTimer,
    Nothing,
}

/// Result of feeding one sample into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: PresenceState,
    pub effect: PresenceEffect,
    /// The sample proves somebody is present; stamp "last presence".
    pub presence_seen: bool,
}

impl PresenceState {
    /// Feed one presence bit.
    #[must_use]
    pub fn on_sample(self, present: bool) -> Transition {
        let (next, effect) = match (self, present) {
            (Self::Idle, true) => (Self::Active, PresenceEffect::Dispatch),
            (Self::Active, true) => (Self::Active, PresenceEffect::Nothing),
            (Self::Uncertain, true) => (Self::Active, PresenceEffect::DisarmTimer),
            // keep waiting for the pending deadline
            (Self::Uncertain, false) => (Self::Uncertain, PresenceEffect::Nothing),
            (Self::Idle | Self::Active, false) => (Self::Uncertain, PresenceEffect::ArmTimer),
        };
        Transition {
            next,
            effect,
            presence_seen: present,
        }
    }
}

/// Hours of the day considered "night". `night_start` may be later than
/// `day_start` (the window wraps past midnight) or earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NightWindow {
    pub day_start: u32,
    pub night_start: u32,
}

impl Default for NightWindow {
    fn default() -> Self {
        Self {
            day_start: 6,
            night_start: 22,
        }
    }
}

impl NightWindow {
    #[must_use]
    pub fn is_night(&self, hour: u32) -> bool {
        if self.night_start == self.day_start {
            return false;
        }
        if self.night_start > self.day_start {
            hour >= self.night_start || hour < self.day_start
        } else {
            hour >= self.night_start && hour < self.day_start
        }
    }
}

/// Debounce duration for the given local hour: doubled at night, the base
/// value when the wall clock is not available.
#[must_use]
pub fn debounce_duration(base: Duration, hour: Option<u32>, window: NightWindow) -> Duration {
    match hour {
        Some(h) if window.is_night(h) => base.saturating_mul(2),
        _ => base,
    }
}

/// What the context knows about recent room activity when an occupancy
/// channel's debounce timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OccupancyEvidence {
    pub door_open: bool,
    /// The last door close happened after the last presence pulse.
    pub door_closed_after_presence: bool,
    /// Age of the last scene run, `None` if no scene ran yet.
    pub since_last_scene: Option<Duration>,
}

/// Decision for an expired occupancy-channel timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutVerdict {
    /// The guest left: go idle and fire the timeout scenes.
    Proceed,
    /// Somebody may still be there: arm the timer again.
    Rearm,
    /// No enter/leave cycle was observed: do nothing.
    Reject,
}

/// Apply the occupancy guards, in order: open door, enter/leave cycle,
/// recent scene activity.
#[must_use]
pub fn judge_timeout(evidence: OccupancyEvidence, recent_activity: Duration) -> TimeoutVerdict {
    if evidence.door_open {
        return TimeoutVerdict::Rearm;
    }
    if !evidence.door_closed_after_presence {
        return TimeoutVerdict::Reject;
    }
    match evidence.since_last_scene {
        Some(age) if age < recent_activity => TimeoutVerdict::Rearm,
        _ => TimeoutVerdict::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECENT: Duration = Duration::from_secs(10);

    fn evidence() -> OccupancyEvidence {
        OccupancyEvidence {
            door_open: false,
            door_closed_after_presence: true,
            since_last_scene: Some(Duration::from_secs(60)),
        }
    }

    #[test]
    fn should_dispatch_when_idle_sees_presence() {
        let t = PresenceState::Idle.on_sample(true);
        assert_eq!(t.next, PresenceState::Active);
        assert_eq!(t.effect, PresenceEffect::Dispatch);
        assert!(t.presence_seen);
    }

    #[test]
    fn should_arm_timer_when_active_loses_presence() {
        let t = PresenceState::Active.on_sample(false);
        assert_eq!(t.next, PresenceState::Uncertain);
        assert_eq!(t.effect, PresenceEffect::ArmTimer);
        assert!(!t.presence_seen);
    }

    #[test]
    fn should_arm_timer_when_idle_receives_dropout() {
        let t = PresenceState::Idle.on_sample(false);
        assert_eq!(t.next, PresenceState::Uncertain);
        assert_eq!(t.effect, PresenceEffect::ArmTimer);
    }

    #[test]
    fn should_disarm_without_dispatch_when_uncertain_sees_presence() {
        let t = PresenceState::Uncertain.on_sample(true);
        assert_eq!(t.next, PresenceState::Active);
        assert_eq!(t.effect, PresenceEffect::DisarmTimer);
    }

    #[test]
    fn should_keep_pending_deadline_when_uncertain_sees_dropout() {
        let t = PresenceState::Uncertain.on_sample(false);
        assert_eq!(t.next, PresenceState::Uncertain);
        assert_eq!(t.effect, PresenceEffect::Nothing);
    }

    #[test]
    fn should_detect_night_when_window_wraps_midnight() {
        let window = NightWindow::default();
        assert!(window.is_night(23));
        assert!(window.is_night(0));
        assert!(window.is_night(5));
        assert!(!window.is_night(6));
        assert!(!window.is_night(21));
    }

    #[test]
    fn should_detect_night_when_window_does_not_wrap() {
        let window = NightWindow {
            day_start: 8,
            night_start: 1,
        };
        assert!(window.is_night(1));
        assert!(window.is_night(7));
        assert!(!window.is_night(8));
        assert!(!window.is_night(0));
    }

    #[test]
    fn should_double_debounce_when_hour_is_at_night() {
        let base = Duration::from_secs(30);
        let window = NightWindow::default();
        assert_eq!(debounce_duration(base, Some(23), window), base * 2);
        assert_eq!(debounce_duration(base, Some(12), window), base);
    }

    #[test]
    fn should_use_base_debounce_when_clock_unavailable() {
        let base = Duration::from_secs(30);
        assert_eq!(debounce_duration(base, None, NightWindow::default()), base);
    }

    #[test]
    fn should_rearm_when_door_is_open() {
        let verdict = judge_timeout(
            OccupancyEvidence {
                door_open: true,
                ..evidence()
            },
            RECENT,
        );
        assert_eq!(verdict, TimeoutVerdict::Rearm);
    }

    #[test]
    fn should_reject_when_door_not_closed_after_presence() {
        let verdict = judge_timeout(
            OccupancyEvidence {
                door_closed_after_presence: false,
                ..evidence()
            },
            RECENT,
        );
        assert_eq!(verdict, TimeoutVerdict::Reject);
    }

    #[test]
    fn should_rearm_when_scene_ran_recently() {
        let verdict = judge_timeout(
            OccupancyEvidence {
                since_last_scene: Some(Duration::from_secs(3)),
                ..evidence()
            },
            RECENT,
        );
        assert_eq!(verdict, TimeoutVerdict::Rearm);
    }

    #[test]
    fn should_proceed_when_all_guards_pass() {
        assert_eq!(judge_timeout(evidence(), RECENT), TimeoutVerdict::Proceed);
        let never_ran = OccupancyEvidence {
            since_last_scene: None,
            ..evidence()
        };
        assert_eq!(judge_timeout(never_ran, RECENT), TimeoutVerdict::Proceed);
    }
}
