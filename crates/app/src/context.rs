//! Room context: the mutable, process-wide state shared by every worker:
//! current mode, occupancy, sleep, door and activity timestamps, the
//! any-key override, room-state tags and the switch snapshot.
//!
//! Each field has its own lock or atomic; no method holds more than one
//! lock at a time.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use roomctl_domain::id::{DeviceId, InputId, SceneId};
use roomctl_domain::presence::OccupancyEvidence;
use roomctl_domain::room_state::RoomStates;

/// Instants of the last notable events, `None` until first seen.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timeline {
    pub last_scene: Option<Instant>,
    pub last_presence: Option<Instant>,
    pub last_door_open: Option<Instant>,
    pub last_door_close: Option<Instant>,
}

/// Shared orchestration state.
#[derive(Debug, Default)]
pub struct RoomContext {
    mode: Mutex<String>,
    occupied: AtomicBool,
    sleeping: AtomicBool,
    door_open: AtomicBool,
    timeline: Mutex<Timeline>,
    any_key: Mutex<Option<SceneId>>,
    last_button: Mutex<Option<InputId>>,
    room_states: Mutex<RoomStates>,
    snapshot: Mutex<BTreeMap<DeviceId, bool>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RoomContext {
    #[must_use]
    pub fn new(occupied: bool) -> Self {
        let context = Self::default();
        context.occupied.store(occupied, Ordering::SeqCst);
        context
    }

    /// Forget everything, as after a fresh boot.
    pub fn reset(&self, occupied: bool) {
        lock(&self.mode).clear();
        self.occupied.store(occupied, Ordering::SeqCst);
        self.sleeping.store(false, Ordering::SeqCst);
        self.door_open.store(false, Ordering::SeqCst);
        *lock(&self.timeline) = Timeline::default();
        *lock(&self.any_key) = None;
        *lock(&self.last_button) = None;
        lock(&self.room_states).clear();
        lock(&self.snapshot).clear();
    }

    // ── Mode ───────────────────────────────────────────────────────

    /// Current mode name, empty when no mode is active.
    #[must_use]
    pub fn mode(&self) -> String {
        lock(&self.mode).clone()
    }

    /// Enter `name`. Returns `true` when this changed the current mode.
    pub fn enter_mode(&self, name: &str) -> bool {
        let mut mode = lock(&self.mode);
        if *mode == name {
            return false;
        }
        name.clone_into(&mut *mode);
        true
    }

    // ── Occupancy and sleep ────────────────────────────────────────

    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.occupied.load(Ordering::SeqCst)
    }

    pub fn set_occupied(&self, occupied: bool) {
        self.occupied.store(occupied, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_sleeping(&self) -> bool {
        self.sleeping.load(Ordering::SeqCst)
    }

    pub fn set_sleeping(&self, sleeping: bool) {
        self.sleeping.store(sleeping, Ordering::SeqCst);
    }

    /// Leave sleep. Returns `true` only for the caller that actually woke
    /// the room.
    pub fn wake(&self) -> bool {
        self.sleeping
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    // ── Door and timestamps ────────────────────────────────────────

    #[must_use]
    pub fn is_door_open(&self) -> bool {
        self.door_open.load(Ordering::SeqCst)
    }

    pub fn record_door_opened(&self) {
        self.door_open.store(true, Ordering::SeqCst);
        lock(&self.timeline).last_door_open = Some(Instant::now());
    }

    pub fn record_door_closed(&self) {
        self.door_open.store(false, Ordering::SeqCst);
        lock(&self.timeline).last_door_close = Some(Instant::now());
    }

    pub fn stamp_scene(&self) {
        lock(&self.timeline).last_scene = Some(Instant::now());
    }

    pub fn stamp_presence(&self) {
        lock(&self.timeline).last_presence = Some(Instant::now());
    }

    #[must_use]
    pub fn timeline(&self) -> Timeline {
        *lock(&self.timeline)
    }

    /// Time since the last scene started, `None` if none did.
    #[must_use]
    pub fn since_last_scene(&self) -> Option<Duration> {
        self.timeline().last_scene.map(|at| at.elapsed())
    }

    /// Gather what the occupancy guards need.
    #[must_use]
    pub fn occupancy_evidence(&self) -> OccupancyEvidence {
        let timeline = self.timeline();
        let door_closed_after_presence = match (timeline.last_door_close, timeline.last_presence) {
            (Some(close), Some(presence)) => close > presence,
            (Some(_), None) => true,
            (None, _) => false,
        };
        OccupancyEvidence {
            door_open: self.is_door_open(),
            door_closed_after_presence,
            since_last_scene: timeline.last_scene.map(|at| at.elapsed()),
        }
    }

    // ── Any-key override ───────────────────────────────────────────

    pub fn arm_any_key(&self, scene: SceneId) {
        *lock(&self.any_key) = Some(scene);
    }

    pub fn clear_any_key(&self) {
        *lock(&self.any_key) = None;
    }

    /// Consume the override, if armed.
    pub fn take_any_key(&self) -> Option<SceneId> {
        lock(&self.any_key).take()
    }

    #[must_use]
    pub fn any_key(&self) -> Option<SceneId> {
        *lock(&self.any_key)
    }

    /// Record `button` as the last dispatched key and return the previous one.
    pub fn swap_last_button(&self, button: InputId) -> Option<InputId> {
        lock(&self.last_button).replace(button)
    }

    // ── Room states ────────────────────────────────────────────────

    #[must_use]
    pub fn room_states(&self) -> RoomStates {
        lock(&self.room_states).clone()
    }

    #[must_use]
    pub fn has_state(&self, tag: &str) -> bool {
        lock(&self.room_states).contains(tag)
    }

    /// Run `f` with exclusive access to the room-state set.
    pub fn with_room_states<R>(&self, f: impl FnOnce(&mut RoomStates) -> R) -> R {
        f(&mut lock(&self.room_states))
    }

    // ── Snapshot ───────────────────────────────────────────────────

    pub fn record_snapshot(&self, states: BTreeMap<DeviceId, bool>) {
        *lock(&self.snapshot) = states;
    }

    /// Take the recorded snapshot, leaving it empty.
    pub fn take_snapshot(&self) -> BTreeMap<DeviceId, bool> {
        std::mem::take(&mut *lock(&self.snapshot))
    }

    pub fn discard_snapshot(&self) {
        lock(&self.snapshot).clear();
    }
}
