//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`DwellError`]
//! via `#[from]`. Storage adapters box their own error type into
//! [`DwellError::Storage`].

use crate::device::DeviceKindTag;

/// Top-level error shared by every layer of the workspace.
#[derive(Debug, thiserror::Error)]
pub enum DwellError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("invalid state: {0}")]
    InvalidState(#[from] InvalidStateError),

    #[error(transparent)]
    PartialApplication(#[from] PartialApplicationError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations on user-supplied data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("device {0} is bound more than once")]
    DuplicateBinding(String),

    #[error("bindings cannot be replaced while the rule or mode is active")]
    BindingsLocked,

    #[error("invalid time of day: {0}")]
    InvalidTime(String),

    #[error("device {0} is not in the mode's room")]
    DeviceOutsideRoom(String),
}

/// A referenced record does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A value falls outside the domain a device accepts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidStateError {
    #[error("{kind} devices are read-only")]
    ReadOnly { kind: DeviceKindTag },

    #[error("{kind} devices do not accept a {value} value")]
    KindMismatch {
        kind: DeviceKindTag,
        value: &'static str,
    },

    #[error("`{0}` is not an integer")]
    NotAnInteger(String),

    #[error("`{value}` is not one of the device options")]
    UnknownOption { value: String },

    #[error("device must be on to change its state")]
    DeviceOff,
}

/// A transition was computed from a flag value that changed before commit.
///
/// Raised when a scheduler tick and a manual toggle race on the same rule
/// or mode; the losing transition is rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} changed concurrently")]
pub struct ConflictError {
    pub entity: &'static str,
    pub id: String,
}

/// Some bindings of a multi-binding transition failed while others succeeded.
#[derive(Debug, thiserror::Error)]
#[error("{} of {total} bindings could not be applied", .failures.len())]
pub struct PartialApplicationError {
    pub total: usize,
    pub failures: Vec<(String, DwellError)>,
}
