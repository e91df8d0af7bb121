//! Device store port — the live state of every device.
//!
//! Writes must be visible to subsequent reads immediately. Every write bumps
//! the device `version`.

use std::future::Future;
use std::sync::Arc;

use dwell_domain::device::{Device, DeviceStatus, StateValue};
use dwell_domain::error::DwellError;
use dwell_domain::id::{DeviceId, RoomId};

/// Repository for persisting and querying [`Device`]s.
pub trait DeviceRepository {
    /// Create a new device in storage.
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, DwellError>> + Send;

    /// Get a device by its unique identifier.
    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, DwellError>> + Send;

    /// Get all devices.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send;

    /// Get all devices placed in a room.
    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send;

    /// Overwrite the state of a device of any kind, monitors included.
    ///
    /// Returns [`DwellError::NotFound`] when the device does not exist.
    fn set_state(
        &self,
        id: DeviceId,
        state: StateValue,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send;

    /// Overwrite the on/off status of a device.
    ///
    /// Returns [`DwellError::NotFound`] when the device does not exist.
    fn set_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send;

    /// Delete a device, cascading to every binding that references it.
    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), DwellError>> + Send;
}

impl<T: DeviceRepository + Send + Sync> DeviceRepository for Arc<T> {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, DwellError>> + Send {
        (**self).create(device)
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, DwellError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send {
        (**self).get_all()
    }

    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send {
        (**self).find_by_room(room_id)
    }

    fn set_state(
        &self,
        id: DeviceId,
        state: StateValue,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send {
        (**self).set_state(id, state)
    }

    fn set_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send {
        (**self).set_status(id, status)
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), DwellError>> + Send {
        (**self).delete(id)
    }
}
