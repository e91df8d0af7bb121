//! Ambiance mode — a room-scoped preset switched on and off by hand.
//!
//! Switching a mode on snapshots every bound device, applies the preset
//! state and turns the device on. Switching it off restores the snapshots.

use serde::{Deserialize, Serialize};

use crate::binding::{Binding, find_duplicate};
use crate::device::{DeviceStatus, StateValue};
use crate::error::{DwellError, ValidationError};
use crate::id::{AmbianceModeId, DeviceId, RoomId};

/// A named preset over devices of one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbianceMode {
    pub id: AmbianceModeId,
    pub room_id: RoomId,
    pub name: String,
    pub status: DeviceStatus,
    pub bindings: Vec<Binding>,
}

impl AmbianceMode {
    /// Create a builder for constructing an [`AmbianceMode`].
    #[must_use]
    pub fn builder() -> AmbianceModeBuilder {
        AmbianceModeBuilder::default()
    }

    /// Preset binding for one device: apply `state` and switch the device on.
    #[must_use]
    pub fn binding(device_id: DeviceId, state: StateValue) -> Binding {
        Binding::new(device_id, state, DeviceStatus::On)
    }

    #[must_use]
    pub fn is_on(&self) -> bool {
        self.status.is_on()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] when `name` is empty or a device
    /// is bound twice.
    pub fn validate(&self) -> Result<(), DwellError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if let Some(id) = find_duplicate(&self.bindings) {
            return Err(ValidationError::DuplicateBinding(id.to_string()).into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`AmbianceMode`].
#[derive(Debug, Default)]
pub struct AmbianceModeBuilder {
    id: Option<AmbianceModeId>,
    room_id: Option<RoomId>,
    name: Option<String>,
    bindings: Vec<Binding>,
}

impl AmbianceModeBuilder {
    #[must_use]
    pub fn id(mut self, id: AmbianceModeId) -> Self {
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
    pub fn device(mut self, device_id: DeviceId, state: StateValue) -> Self {
        self.bindings.push(AmbianceMode::binding(device_id, state));
        self
    }

    /// Consume the builder, validate, and return a mode that is `off`.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] if `name` is missing or a device is
    /// bound twice.
    pub fn build(self) -> Result<AmbianceMode, DwellError> {
        let mode = AmbianceMode {
            id: self.id.unwrap_or_default(),
            room_id: self.room_id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            status: DeviceStatus::Off,
            bindings: self.bindings,
        };
        mode.validate()?;
        Ok(mode)
    }
}
