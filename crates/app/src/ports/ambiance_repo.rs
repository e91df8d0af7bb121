//! Ambiance repository port — persistence for ambiance modes.

use std::future::Future;
use std::sync::Arc;

use dwell_domain::ambiance::AmbianceMode;
use dwell_domain::device::{DeviceStatus, DeviceWrite};
use dwell_domain::error::DwellError;
use dwell_domain::id::{AmbianceModeId, RoomId};

/// Repository for persisting and querying [`AmbianceMode`]s.
pub trait AmbianceRepository {
    /// Create a new mode and its bindings.
    fn create(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send;

    /// Get a mode by its unique identifier.
    fn get_by_id(
        &self,
        id: AmbianceModeId,
    ) -> impl Future<Output = Result<Option<AmbianceMode>, DwellError>> + Send;

    /// Get all modes.
    fn get_all(&self) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send;

    /// Get all modes of a room.
    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send;

    /// Update name, room and bindings of an existing mode.
    ///
    /// `status` and snapshots are only written by
    /// [`commit_transition`](Self::commit_transition): stored snapshots are
    /// kept whenever the binding targets are unchanged. Changing the targets
    /// of a mode that is on at write time returns [`DwellError::Conflict`]
    /// and writes nothing.
    fn update(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send;

    /// Delete a mode, cascading to its bindings.
    fn delete(&self, id: AmbianceModeId) -> impl Future<Output = Result<(), DwellError>> + Send;

    /// Apply `writes` to the device store and persist the mode's status and
    /// binding snapshots in one transaction.
    ///
    /// The commit only happens while the stored status still equals
    /// `previous`; otherwise nothing is written and
    /// [`DwellError::Conflict`] is returned.
    fn commit_transition(
        &self,
        mode: AmbianceMode,
        previous: DeviceStatus,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send;
}

impl<T: AmbianceRepository + Send + Sync> AmbianceRepository for Arc<T> {
    fn create(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        (**self).create(mode)
    }

    fn get_by_id(
        &self,
        id: AmbianceModeId,
    ) -> impl Future<Output = Result<Option<AmbianceMode>, DwellError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send {
        (**self).get_all()
    }

    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send {
        (**self).find_by_room(room_id)
    }

    fn update(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        (**self).update(mode)
    }

    fn delete(&self, id: AmbianceModeId) -> impl Future<Output = Result<(), DwellError>> + Send {
        (**self).delete(id)
    }

    fn commit_transition(
        &self,
        mode: AmbianceMode,
        previous: DeviceStatus,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        (**self).commit_transition(mode, previous, writes)
    }
}
