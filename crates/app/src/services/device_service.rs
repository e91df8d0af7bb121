//! Device service — registration and direct user control of devices.
//!
//! This is where per-device invariants that do not belong to transitions
//! live: a device must be on before its state changes, and level steps are
//! clamped to the device range.

use dwell_domain::device::{Device, DeviceKind, StateValue};
use dwell_domain::error::{DwellError, InvalidStateError};
use dwell_domain::id::{DeviceId, RoomId};

use crate::ports::DeviceRepository;

/// Application service for device registration and control.
pub struct DeviceService<R> {
    repo: R,
}

impl<R: DeviceRepository> DeviceService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Register a new device after validating domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, device), fields(device_name = %device.name))]
    pub async fn register_device(&self, device: Device) -> Result<Device, DwellError> {
        device.validate()?;
        self.repo.create(device).await
    }

    /// Look up a device by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when no device with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_device(&self, id: DeviceId) -> Result<Device, DwellError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| id.not_found().into())
    }

    /// List all devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self) -> Result<Vec<Device>, DwellError> {
        self.repo.get_all().await
    }

    /// List the devices of one room.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_for_room(&self, room_id: RoomId) -> Result<Vec<Device>, DwellError> {
        self.repo.find_by_room(room_id).await
    }

    /// Flip a device on or off.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when the device does not exist,
    /// [`InvalidStateError::ReadOnly`] for monitor devices, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_device(&self, id: DeviceId) -> Result<Device, DwellError> {
        let device = self.controllable(id).await?;
        self.repo.set_status(id, device.status.toggled()).await
    }

    /// Set the state of a device from raw user input.
    ///
    /// The device must be on. Variable devices only accept integers; fixed
    /// devices only accept one of their options when they declare some.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when the device does not exist,
    /// [`DwellError::InvalidState`] when it is off, read-only or the value
    /// does not fit, or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn update_state(&self, id: DeviceId, raw: &str) -> Result<Device, DwellError> {
        let device = self.controllable(id).await?;
        if !device.status.is_on() {
            return Err(InvalidStateError::DeviceOff.into());
        }
        let value = StateValue::parse_for(device.kind.tag(), raw)?;
        device.kind.check_target(&value)?;
        self.repo.set_state(id, value).await
    }

    /// Step the level of a variable device by `delta`, clamped to its range.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when the device does not exist,
    /// [`DwellError::InvalidState`] when it is off or not a variable device,
    /// or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_level(&self, id: DeviceId, delta: i64) -> Result<Device, DwellError> {
        let device = self.controllable(id).await?;
        if !device.status.is_on() {
            return Err(InvalidStateError::DeviceOff.into());
        }
        let DeviceKind::Variable { state, range } = device.kind else {
            return Err(InvalidStateError::KindMismatch {
                kind: device.kind.tag(),
                value: "level",
            }
            .into());
        };

        let stepped = state.saturating_add(delta);
        let level = range.map_or(stepped, |range| range.clamp(stepped));
        tracing::debug!(from = state, to = level, "adjusting level");
        self.repo.set_state(id, StateValue::Level(level)).await
    }

    /// Delete a device. Bindings referencing it are removed with it.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_device(&self, id: DeviceId) -> Result<(), DwellError> {
        self.repo.delete(id).await
    }

    async fn controllable(&self, id: DeviceId) -> Result<Device, DwellError> {
        let device = self.get_device(id).await?;
        if !device.kind.is_controllable() {
            return Err(InvalidStateError::ReadOnly {
                kind: device.kind.tag(),
            }
            .into());
        }
        Ok(device)
    }
}
