//! Device — a controllable or monitoring thing placed in a room.
//!
//! The device kind is a closed set. Each kind carries its own state payload,
//! so reads and writes of device state always go through an exhaustive match
//! instead of probing for a subtype at runtime.

use serde::{Deserialize, Serialize};

use crate::error::{DwellError, InvalidStateError, ValidationError};
use crate::id::{DeviceId, RoomId};

/// On/off status shared by every device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    On,
    #[default]
    Off,
}

impl DeviceStatus {
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    /// The opposite status.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::On => Self::Off,
            Self::Off => Self::On,
        }
    }
}

impl From<bool> for DeviceStatus {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
        }
    }
}

/// Typed device state, used for live state, targets and snapshots alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StateValue {
    /// A named option of a fixed-option device.
    Text(String),
    /// The integer level of a variable-option device.
    Level(i64),
}

impl StateValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Level(_) => "level",
        }
    }

    /// Interpret raw user input as a state value for the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError::NotAnInteger`] when a variable kind
    /// receives non-numeric text.
    pub fn parse_for(kind: DeviceKindTag, raw: &str) -> Result<Self, InvalidStateError> {
        let raw = raw.trim();
        match kind {
            DeviceKindTag::Fixed | DeviceKindTag::MonitorFixed => Ok(Self::Text(raw.to_string())),
            DeviceKindTag::Variable | DeviceKindTag::MonitorVariable => raw
                .parse()
                .map(Self::Level)
                .map_err(|_| InvalidStateError::NotAnInteger(raw.to_string())),
        }
    }
}

impl std::fmt::Display for StateValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Level(level) => write!(f, "{level}"),
        }
    }
}

/// Inclusive bounds for a variable-option device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelRange {
    pub min: i64,
    pub max: i64,
}

impl LevelRange {
    /// Bounds of the thermostat set point, in °C.
    pub const THERMOSTAT: Self = Self { min: 16, max: 32 };

    #[must_use]
    pub fn clamp(self, level: i64) -> i64 {
        level.clamp(self.min, self.max)
    }
}

/// Discriminant of [`DeviceKind`], without the state payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKindTag {
    Fixed,
    Variable,
    MonitorFixed,
    MonitorVariable,
}

impl std::fmt::Display for DeviceKindTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed => f.write_str("fixed"),
            Self::Variable => f.write_str("variable"),
            Self::MonitorFixed => f.write_str("monitor_fixed"),
            Self::MonitorVariable => f.write_str("monitor_variable"),
        }
    }
}

/// The kind of a device together with its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceKind {
    /// Controllable, state chosen from `options`.
    Fixed { options: Vec<String>, state: String },
    /// Controllable integer level, optionally bounded.
    Variable {
        state: i64,
        range: Option<LevelRange>,
    },
    /// Read-only, state chosen from `options` by an external writer.
    MonitorFixed { options: Vec<String>, state: String },
    /// Read-only integer reading written by an external writer.
    MonitorVariable { state: i64 },
}

impl DeviceKind {
    #[must_use]
    pub fn tag(&self) -> DeviceKindTag {
        match self {
            Self::Fixed { .. } => DeviceKindTag::Fixed,
            Self::Variable { .. } => DeviceKindTag::Variable,
            Self::MonitorFixed { .. } => DeviceKindTag::MonitorFixed,
            Self::MonitorVariable { .. } => DeviceKindTag::MonitorVariable,
        }
    }

    /// Whether the scheduler, toggles and users may write this device.
    #[must_use]
    pub fn is_controllable(&self) -> bool {
        matches!(self, Self::Fixed { .. } | Self::Variable { .. })
    }

    /// Current state as a typed value.
    #[must_use]
    pub fn state(&self) -> StateValue {
        match self {
            Self::Fixed { state, .. } | Self::MonitorFixed { state, .. } => {
                StateValue::Text(state.clone())
            }
            Self::Variable { state, .. } | Self::MonitorVariable { state } => {
                StateValue::Level(*state)
            }
        }
    }

    /// Check that `value` is an acceptable control target for this kind.
    ///
    /// Fixed devices with a non-empty option list only accept one of their
    /// options. Variable levels are not range-checked here: bounds are
    /// enforced where users adjust the level directly.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError`] for monitor kinds, mismatched value
    /// types and unknown options.
    pub fn check_target(&self, value: &StateValue) -> Result<(), InvalidStateError> {
        match (self, value) {
            (Self::Fixed { options, .. }, StateValue::Text(text)) => {
                if options.is_empty() || options.iter().any(|o| o == text) {
                    Ok(())
                } else {
                    Err(InvalidStateError::UnknownOption {
                        value: text.clone(),
                    })
                }
            }
            (Self::Variable { .. }, StateValue::Level(_)) => Ok(()),
            (Self::MonitorFixed { .. } | Self::MonitorVariable { .. }, _) => {
                Err(InvalidStateError::ReadOnly { kind: self.tag() })
            }
            (Self::Fixed { .. } | Self::Variable { .. }, other) => {
                Err(InvalidStateError::KindMismatch {
                    kind: self.tag(),
                    value: other.type_name(),
                })
            }
        }
    }

    /// Overwrite the state payload.
    ///
    /// Accepts monitor kinds: this is the raw store-level write used by
    /// external writers. Control paths go through [`Device::apply`].
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError::KindMismatch`] when the value type does
    /// not match the kind.
    pub fn set_state(&mut self, value: StateValue) -> Result<(), InvalidStateError> {
        let tag = self.tag();
        match (self, value) {
            (Self::Fixed { state, .. } | Self::MonitorFixed { state, .. }, StateValue::Text(v)) => {
                *state = v;
                Ok(())
            }
            (
                Self::Variable { state, .. } | Self::MonitorVariable { state },
                StateValue::Level(v),
            ) => {
                *state = v;
                Ok(())
            }
            (_, other) => Err(InvalidStateError::KindMismatch {
                kind: tag,
                value: other.type_name(),
            }),
        }
    }
}

/// A device write computed by the rule engine or a toggle handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceWrite {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
    /// `None` leaves the state untouched.
    pub state: Option<StateValue>,
}

/// A device placed in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub room_id: RoomId,
    pub name: String,
    pub status: DeviceStatus,
    pub kind: DeviceKind,
    /// Incremented on every write.
    pub version: i64,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), DwellError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> StateValue {
        self.kind.state()
    }

    /// Apply a control write. Monitor devices are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError::ReadOnly`] for monitor devices and
    /// [`InvalidStateError::KindMismatch`] for a state of the wrong type.
    pub fn apply(&mut self, write: &DeviceWrite) -> Result<(), InvalidStateError> {
        if !self.kind.is_controllable() {
            return Err(InvalidStateError::ReadOnly {
                kind: self.kind.tag(),
            });
        }
        if let Some(state) = &write.state {
            self.kind.set_state(state.clone())?;
        }
        self.status = write.status;
        self.version += 1;
        Ok(())
    }

    /// Store-level state write, accepted for every kind.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidStateError::KindMismatch`] for a state of the wrong type.
    pub fn set_state(&mut self, value: StateValue) -> Result<(), InvalidStateError> {
        self.kind.set_state(value)?;
        self.version += 1;
        Ok(())
    }

    pub fn set_status(&mut self, status: DeviceStatus) {
        self.status = status;
        self.version += 1;
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    room_id: Option<RoomId>,
    name: Option<String>,
    status: Option<DeviceStatus>,
    kind: Option<DeviceKind>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn room_id(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: DeviceStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: DeviceKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// Defaults to an `off` fixed-option device with no options.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] if `name` is missing or empty.
    pub fn build(self) -> Result<Device, DwellError> {
        let device = Device {
            id: self.id.unwrap_or_default(),
            room_id: self.room_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            status: self.status.unwrap_or_default(),
            kind: self.kind.unwrap_or(DeviceKind::Fixed {
                options: Vec::new(),
                state: String::new(),
            }),
            version: 0,
        };
        device.validate()?;
        Ok(device)
    }
}
