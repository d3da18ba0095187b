//! Scene (action group): a named, ordered list of atomic actions run as a
//! unit.

use serde::{Deserialize, Serialize};

use crate::error::{RoomError, ValidationError};
use crate::id::{DeviceId, SceneId};

/// One step of a scene: an operation with its parameter on a target device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicAction {
    pub device: DeviceId,
    pub operation: String,
    #[serde(default)]
    pub parameter: String,
}

impl AtomicAction {
    #[must_use]
    pub fn new(
        device: impl Into<DeviceId>,
        operation: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        Self {
            device: device.into(),
            operation: operation.into(),
            parameter: parameter.into(),
        }
    }
}

impl std::fmt::Display for AtomicAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.parameter.is_empty() {
            write!(f, "{}({})", self.operation, self.device)
        } else {
            write!(f, "{}({}, {})", self.operation, self.device, self.parameter)
        }
    }
}

/// How a scene run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Cancelled,
    /// A step of the scene asked to stop (e.g. `exit_if_present`).
    Aborted,
}

/// A scene. When `is_mode` is set, running it also enters the mode named
/// after the scene.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: SceneId,
    pub name: String,
    pub is_mode: bool,
    pub actions: Vec<AtomicAction>,
}

impl Scene {
    /// Create a builder for constructing a [`Scene`].
    #[must_use]
    pub fn builder() -> SceneBuilder {
        SceneBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyName`] when the name is blank; the
    /// name doubles as the mode name.
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Scene`].
#[derive(Debug, Default)]
pub struct SceneBuilder {
    id: Option<SceneId>,
    name: Option<String>,
    is_mode: bool,
    actions: Vec<AtomicAction>,
}

impl SceneBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<SceneId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn mode(mut self, is_mode: bool) -> Self {
        self.is_mode = is_mode;
        self
    }

    #[must_use]
    pub fn action(
        mut self,
        device: impl Into<DeviceId>,
        operation: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        self.actions
            .push(AtomicAction::new(device, operation, parameter));
        self
    }

    /// Consume the builder, validate, and return a [`Scene`].
    ///
    /// # Errors
    ///
    /// Returns [`RoomError::Validation`] if the name is empty.
    pub fn build(self) -> Result<Scene, RoomError> {
        let scene = Scene {
            id: self.id.unwrap_or(SceneId::new(0)),
            name: self.name.unwrap_or_default(),
            is_mode: self.is_mode,
            actions: self.actions,
        };
        scene.validate()?;
        Ok(scene)
    }
}
