//! Registry: the immutable index built from a [`RoomLayout`], plus the
//! per-scene, per-input and per-panel runtime slots hanging off it.
//!
//! A registry is never mutated structurally; reconfiguration builds a new
//! one and swaps it in. Workers that already hold the old one finish
//! against it.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use roomctl_domain::device::{Device, diagnose_links};
use roomctl_domain::error::RoomError;
use roomctl_domain::id::{DeviceId, PanelId, SceneId};
use roomctl_domain::input::{ChannelInputSpec, InputTag, PanelButtonSpec};
use roomctl_domain::layout::RoomLayout;
use roomctl_domain::panel::PanelState;
use roomctl_domain::presence::PresenceState;
use roomctl_domain::scene::Scene;

use crate::engine::channel::PresenceSlot;
use crate::engine::scene_engine::RunState;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Round-robin cursor over an input's private scene list.
#[derive(Debug)]
pub struct SceneCycle {
    scenes: Vec<SceneId>,
    cursor: AtomicUsize,
}

impl SceneCycle {
    #[must_use]
    pub fn new(scenes: Vec<SceneId>) -> Self {
        Self {
            scenes,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Scene at the cursor; moves the cursor to the next one.
    pub fn advance(&self) -> Option<SceneId> {
        let len = self.scenes.len();
        if len == 0 {
            return None;
        }
        let (Ok(previous) | Err(previous)) =
            self.cursor
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % len));
        self.scenes.get(previous % len).copied()
    }

    pub fn reset(&self) {
        self.cursor.store(0, Ordering::SeqCst);
    }
}

/// A scene and its run slot.
#[derive(Debug)]
pub struct SceneSlot {
    pub scene: Scene,
    pub(crate) run: RunState,
}

impl SceneSlot {
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.run.is_running()
    }
}

/// A dry-contact input with its cursor and debouncer.
#[derive(Debug)]
pub struct ChannelSlot {
    pub spec: ChannelInputSpec,
    pub cycle: SceneCycle,
    pub(crate) presence: Mutex<PresenceSlot>,
}

impl ChannelSlot {
    /// Debounced presence of this input.
    #[must_use]
    pub fn presence(&self) -> PresenceState {
        lock(&self.presence).state()
    }
}

/// A panel key with its cursor.
#[derive(Debug)]
pub struct ButtonSlot {
    pub spec: PanelButtonSpec,
    pub cycle: SceneCycle,
}

/// A panel: backlight/held memory and configured keys.
#[derive(Debug)]
pub struct PanelSlot {
    pub id: PanelId,
    state: Mutex<PanelState>,
    buttons: BTreeMap<u8, ButtonSlot>,
}

impl PanelSlot {
    fn new(id: PanelId) -> Self {
        Self {
            id,
            state: Mutex::new(PanelState::default()),
            buttons: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn button(&self, button: u8) -> Option<&ButtonSlot> {
        self.buttons.get(&button)
    }

    #[must_use]
    pub fn backlight(&self) -> u8 {
        lock(&self.state).backlight
    }

    /// Run `f` with exclusive access to the panel state.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut PanelState) -> R) -> R {
        f(&mut lock(&self.state))
    }
}

/// Lookup index over one room layout.
#[derive(Debug)]
pub struct Registry {
    devices: BTreeMap<DeviceId, Device>,
    scenes: HashMap<SceneId, Arc<SceneSlot>>,
    channels: Vec<ChannelSlot>,
    panels: BTreeMap<PanelId, PanelSlot>,
    occupied_at_start: bool,
}

impl Registry {
    /// Validate `layout` and index it.
    ///
    /// Suspicious but tolerated configuration (actions on unknown devices,
    /// link cycles, dangling links) is logged at `warn`.
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] if the layout is inconsistent.
    pub fn build(layout: RoomLayout) -> Result<Self, RoomError> {
        layout.validate()?;

        for warning in diagnose_links(&layout.devices) {
            tracing::warn!(%warning, "suspicious device link configuration");
        }

        let devices: BTreeMap<DeviceId, Device> =
            layout.devices.into_iter().map(|d| (d.id, d)).collect();

        for scene in &layout.scenes {
            for action in &scene.actions {
                if !devices.contains_key(&action.device) {
                    tracing::warn!(
                        scene = %scene.id,
                        device = %action.device,
                        action = %action,
                        "scene action targets unknown device"
                    );
                }
            }
        }

        let scenes: HashMap<SceneId, Arc<SceneSlot>> = layout
            .scenes
            .into_iter()
            .map(|scene| {
                let slot = SceneSlot {
                    scene,
                    run: RunState::default(),
                };
                (slot.scene.id, Arc::new(slot))
            })
            .collect();

        let channels: Vec<ChannelSlot> = layout
            .channels
            .into_iter()
            .map(|spec| ChannelSlot {
                cycle: SceneCycle::new(spec.scenes.clone()),
                presence: Mutex::new(PresenceSlot::default()),
                spec,
            })
            .collect();

        let mut panels: BTreeMap<PanelId, PanelSlot> = BTreeMap::new();
        for spec in layout.buttons {
            let panel = panels
                .entry(spec.panel)
                .or_insert_with(|| PanelSlot::new(spec.panel));
            panel.buttons.insert(
                spec.button,
                ButtonSlot {
                    cycle: SceneCycle::new(spec.scenes.clone()),
                    spec,
                },
            );
        }
        for indicator in devices.values().flat_map(|d| &d.indicators) {
            panels
                .entry(indicator.panel)
                .or_insert_with(|| PanelSlot::new(indicator.panel));
        }

        tracing::info!(
            devices = devices.len(),
            scenes = scenes.len(),
            channels = channels.len(),
            panels = panels.len(),
            "registry built"
        );

        Ok(Self {
            devices,
            scenes,
            channels,
            panels,
            occupied_at_start: layout.occupied,
        })
    }

    #[must_use]
    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    #[must_use]
    pub fn scene(&self, id: SceneId) -> Option<&Arc<SceneSlot>> {
        self.scenes.get(&id)
    }

    pub fn scenes(&self) -> impl Iterator<Item = &Arc<SceneSlot>> {
        self.scenes.values()
    }

    /// Every input configured on physical `channel`, in configuration order.
    pub fn inputs_on_channel(&self, channel: u8) -> impl Iterator<Item = (usize, &ChannelSlot)> {
        self.channels
            .iter()
            .enumerate()
            .filter(move |(_, slot)| slot.spec.channel == channel)
    }

    #[must_use]
    pub fn channel_at(&self, index: usize) -> Option<&ChannelSlot> {
        self.channels.get(index)
    }

    /// The input whose presence decides whether the room is occupied.
    #[must_use]
    pub fn occupancy_channel(&self) -> Option<&ChannelSlot> {
        self.channels
            .iter()
            .find(|slot| slot.spec.has_tag(InputTag::OccupancyChannel))
    }

    #[must_use]
    pub fn panel(&self, id: PanelId) -> Option<&PanelSlot> {
        self.panels.get(&id)
    }

    pub fn panels(&self) -> impl Iterator<Item = &PanelSlot> {
        self.panels.values()
    }

    #[must_use]
    pub fn occupied_at_start(&self) -> bool {
        self.occupied_at_start
    }

    /// Cancel every running scene and disarm every debounce timer.
    pub(crate) fn shutdown(&self) {
        for slot in self.scenes.values() {
            slot.run.cancel();
        }
        for slot in &self.channels {
            lock(&slot.presence).disarm();
        }
    }
}
