//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts via `#[from]`.
//! Runtime paths of the engine never surface these to their callers; they
//! are produced while building a layout or parsing a device command and are
//! logged where they are recovered.

/// Top-level domain error.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("validation error")]
    Validation(#[from] ValidationError),
}

/// A domain invariant was violated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("duplicate {kind} id {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("button index {0} is out of range (panels have 8 buttons)")]
    ButtonOutOfRange(u8),

    #[error("input {input} refers to unknown scene {scene}")]
    UnknownScene { input: String, scene: String },

    #[error("operation {operation:?} is not supported by {kind} devices")]
    UnknownOperation {
        kind: &'static str,
        operation: String,
    },

    #[error("operation {operation:?} got malformed parameter {parameter:?}")]
    InvalidParameter {
        operation: String,
        parameter: String,
    },
}
