//! Event: an immutable record of something observable the engine did.
//!
//! Events carry the operation log and the state-report trigger: mode
//! changes, logged device operations, scene start/finish and "please report
//! room state now" requests.

use serde::{Deserialize, Serialize};

use crate::id::{DeviceId, EventId, SceneId};
use crate::scene::RunOutcome;
use crate::time::{Timestamp, now};

/// Why a state report was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    /// A mode scene finished running.
    ModeChange,
    /// The `SOS` room state was raised.
    Sos,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    ModeEntered {
        mode: String,
    },
    DeviceOperated {
        device: DeviceId,
        name: String,
        operation: String,
        parameter: String,
    },
    SceneStarted {
        scene: SceneId,
        name: String,
    },
    SceneFinished {
        scene: SceneId,
        name: String,
        outcome: RunOutcome,
    },
    StateReport {
        reason: ReportReason,
    },
}

/// A timestamped [`EventKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    /// Stamp `kind` with a fresh id and the current time.
    #[must_use]
    pub fn new(kind: EventKind) -> Self {
        Self {
            id: EventId::new(),
            timestamp: now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_assign_distinct_ids_when_created() {
        let a = Event::new(EventKind::StateReport {
            reason: ReportReason::Sos,
        });
        let b = Event::new(EventKind::StateReport {
            reason: ReportReason::Sos,
        });
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn should_serialize_with_flattened_type_tag() {
        let event = Event::new(EventKind::SceneFinished {
            scene: SceneId::new(7),
            name: "Sleep".to_string(),
            outcome: RunOutcome::Cancelled,
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "scene_finished");
        assert_eq!(json["scene"], 7);
        assert_eq!(json["outcome"], "cancelled");
        assert!(json.get("timestamp").is_some());
    }
}
