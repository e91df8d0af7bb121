//! Ambiance service — use-cases for room presets switched by hand.

use dwell_domain::ambiance::AmbianceMode;
use dwell_domain::binding::Binding;
use dwell_domain::device::DeviceStatus;
use dwell_domain::engine::Direction;
use dwell_domain::error::{DwellError, ValidationError};
use dwell_domain::id::{AmbianceModeId, RoomId};

use super::{check_bindings, without_snapshots};
use crate::ports::{AmbianceRepository, DeviceRepository};
use crate::transition::{self, ApplyMode};

/// Changes to an existing mode. `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct AmbianceUpdate {
    pub name: Option<String>,
    pub bindings: Option<Vec<Binding>>,
}

/// Application service for ambiance modes.
pub struct AmbianceService<D, M> {
    devices: D,
    modes: M,
}

impl<D, M> AmbianceService<D, M>
where
    D: DeviceRepository,
    M: AmbianceRepository,
{
    /// Create a new service backed by the given repositories.
    pub fn new(devices: D, modes: M) -> Self {
        Self { devices, modes }
    }

    async fn check_mode_bindings(&self, room_id: RoomId, bindings: &[Binding]) -> Result<(), DwellError> {
        let devices = check_bindings(&self.devices, bindings).await?;
        if let Some(outsider) = devices.iter().find(|d| d.room_id != room_id) {
            return Err(ValidationError::DeviceOutsideRoom(outsider.id.to_string()).into());
        }
        Ok(())
    }

    /// Create a new mode, switched off.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::Validation`] if invariants fail or a bound
    /// device belongs to another room, [`DwellError::NotFound`] or
    /// [`DwellError::InvalidState`] for a bad binding, or a storage error.
    #[tracing::instrument(skip(self, mode), fields(mode_name = %mode.name))]
    pub async fn create_mode(&self, mut mode: AmbianceMode) -> Result<AmbianceMode, DwellError> {
        mode.validate()?;
        self.check_mode_bindings(mode.room_id, &mode.bindings).await?;

        mode.status = DeviceStatus::Off;
        mode.bindings = without_snapshots(mode.bindings);
        self.modes.create(mode).await
    }

    /// Look up a mode by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when no mode with `id` exists,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn get_mode(&self, id: AmbianceModeId) -> Result<AmbianceMode, DwellError> {
        self.modes
            .get_by_id(id)
            .await?
            .ok_or_else(|| id.not_found().into())
    }

    /// List all modes.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_modes(&self) -> Result<Vec<AmbianceMode>, DwellError> {
        self.modes.get_all().await
    }

    /// List the modes of one room.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_for_room(&self, room_id: RoomId) -> Result<Vec<AmbianceMode>, DwellError> {
        self.modes.find_by_room(room_id).await
    }

    /// Rename a mode or replace its bindings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::BindingsLocked`] when bindings are replaced
    /// while the mode is on, [`DwellError::Conflict`] when the mode was
    /// switched on before the new bindings were written, plus the errors of
    /// [`create_mode`](Self::create_mode).
    #[tracing::instrument(skip(self, update))]
    pub async fn update_mode(
        &self,
        id: AmbianceModeId,
        update: AmbianceUpdate,
    ) -> Result<AmbianceMode, DwellError> {
        let mut mode = self.get_mode(id).await?;

        if let Some(name) = update.name {
            mode.name = name;
        }
        if let Some(bindings) = update.bindings {
            if mode.is_on() {
                return Err(ValidationError::BindingsLocked.into());
            }
            self.check_mode_bindings(mode.room_id, &bindings).await?;
            mode.bindings = without_snapshots(bindings);
        }

        mode.validate()?;
        self.modes.update(mode).await
    }

    /// Delete a mode, restoring its devices first if it is on.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when no mode with `id` exists, or a
    /// storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn delete_mode(&self, id: AmbianceModeId) -> Result<(), DwellError> {
        let mode = self.get_mode(id).await?;
        if mode.is_on() {
            let applied = transition::apply_mode(
                &self.devices,
                &self.modes,
                mode,
                Direction::Deactivate,
                ApplyMode::Lenient,
            )
            .await?;
            if let Some(partial) = applied.partial {
                tracing::warn!(error = %partial, "some devices could not be restored");
            }
        }
        self.modes.delete(id).await
    }

    /// Switch a mode on if it is off, off if it is on.
    ///
    /// Switching on snapshots every bound device, then applies the preset and
    /// turns the device on. Switching off writes the snapshots back.
    ///
    /// # Errors
    ///
    /// Returns [`DwellError::NotFound`] when the mode or a bound device is
    /// missing, [`DwellError::InvalidState`] when a preset no longer fits its
    /// device, [`DwellError::Conflict`] on a concurrent toggle, or a storage
    /// error. Nothing is written on error.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_mode(&self, id: AmbianceModeId) -> Result<AmbianceMode, DwellError> {
        let mode = self.get_mode(id).await?;
        let direction = if mode.is_on() {
            Direction::Deactivate
        } else {
            Direction::Activate
        };

        let applied =
            transition::apply_mode(&self.devices, &self.modes, mode, direction, ApplyMode::Strict).await?;
        Ok(applied.value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dwell_domain::device::StateValue;
    use dwell_domain::error::InvalidStateError;

    use super::*;
    use crate::testing::{InMemoryStore, fixed_device, monitor_device, variable_device};

    type Service = AmbianceService<Arc<InMemoryStore>, Arc<InMemoryStore>>;

    fn make_service() -> (Service, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::default());
        (AmbianceService::new(Arc::clone(&store), Arc::clone(&store)), store)
    }

    #[tokio::test]
    async fn should_apply_and_restore_two_bindings() {
        let (svc, store) = make_service();
        let room = RoomId::new();
        let lamp = store.insert_device(fixed_device(room, &["dim", "normal", "bright"], "dim"));
        let dimmer = store.insert_device(variable_device(room, 30));
        let mode = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(room)
                    .name("Evening")
                    .device(lamp.id, StateValue::Text("bright".to_string()))
                    .device(dimmer.id, StateValue::Level(75))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        let on = svc.toggle_mode(mode.id).await.unwrap();
        assert!(on.is_on());
        let lamp_on = store.device(lamp.id);
        let dimmer_on = store.device(dimmer.id);
        assert_eq!((lamp_on.status, lamp_on.state()), (DeviceStatus::On, StateValue::Text("bright".to_string())));
        assert_eq!((dimmer_on.status, dimmer_on.state()), (DeviceStatus::On, StateValue::Level(75)));

        let off = svc.toggle_mode(mode.id).await.unwrap();
        assert!(!off.is_on());
        let lamp_off = store.device(lamp.id);
        let dimmer_off = store.device(dimmer.id);
        assert_eq!((lamp_off.status, lamp_off.state()), (lamp.status, lamp.state()));
        assert_eq!((dimmer_off.status, dimmer_off.state()), (dimmer.status, dimmer.state()));
        assert!(store.mode(mode.id).bindings.iter().all(|b| b.snapshot.is_none()));
    }

    #[tokio::test]
    async fn should_reject_device_from_another_room() {
        let (svc, store) = make_service();
        let lamp = store.insert_device(fixed_device(RoomId::new(), &[], "off"));
        let result = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(RoomId::new())
                    .name("Elsewhere")
                    .device(lamp.id, StateValue::Text("on".to_string()))
                    .build()
                    .unwrap(),
            )
            .await;
        assert!(matches!(
            result,
            Err(DwellError::Validation(ValidationError::DeviceOutsideRoom(_)))
        ));
    }

    #[tokio::test]
    async fn should_reject_unknown_option() {
        let (svc, store) = make_service();
        let room = RoomId::new();
        let lamp = store.insert_device(fixed_device(room, &["dim", "bright"], "dim"));
        let result = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(room)
                    .name("Party")
                    .device(lamp.id, StateValue::Text("strobe".to_string()))
                    .build()
                    .unwrap(),
            )
            .await;
        assert!(matches!(
            result,
            Err(DwellError::InvalidState(InvalidStateError::UnknownOption { .. }))
        ));
    }

    #[tokio::test]
    async fn should_reject_monitor_binding() {
        let (svc, store) = make_service();
        let room = RoomId::new();
        let sensor = store.insert_device(monitor_device(room));
        let result = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(room)
                    .name("Quiet")
                    .device(sensor.id, StateValue::Level(10))
                    .build()
                    .unwrap(),
            )
            .await;
        assert!(matches!(result, Err(DwellError::InvalidState(_))));
    }

    #[tokio::test]
    async fn should_lock_bindings_while_on() {
        let (svc, store) = make_service();
        let room = RoomId::new();
        let dimmer = store.insert_device(variable_device(room, 30));
        let mode = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(room)
                    .name("Reading")
                    .device(dimmer.id, StateValue::Level(90))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        svc.toggle_mode(mode.id).await.unwrap();

        let locked = svc
            .update_mode(
                mode.id,
                AmbianceUpdate {
                    bindings: Some(Vec::new()),
                    ..AmbianceUpdate::default()
                },
            )
            .await;
        assert!(matches!(
            locked,
            Err(DwellError::Validation(ValidationError::BindingsLocked))
        ));

        let renamed = svc
            .update_mode(
                mode.id,
                AmbianceUpdate {
                    name: Some("Study".to_string()),
                    bindings: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.name, "Study");
        assert!(renamed.is_on());
    }

    #[tokio::test]
    async fn should_reject_toggle_without_mutation_when_device_vanished() {
        let (svc, store) = make_service();
        let room = RoomId::new();
        let lamp = store.insert_device(fixed_device(room, &[], "off"));
        let dimmer = store.insert_device(variable_device(room, 30));
        let mode = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(room)
                    .name("Evening")
                    .device(dimmer.id, StateValue::Level(75))
                    .device(lamp.id, StateValue::Text("on".to_string()))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        store.remove_device(lamp.id);

        let result = svc.toggle_mode(mode.id).await;

        assert!(matches!(result, Err(DwellError::NotFound(_))));
        assert!(!store.mode(mode.id).is_on());
        assert_eq!(store.device(dimmer.id), dimmer);
    }

    #[tokio::test]
    async fn should_restore_devices_before_deleting_active_mode() {
        let (svc, store) = make_service();
        let room = RoomId::new();
        let dimmer = store.insert_device(variable_device(room, 30));
        let mode = svc
            .create_mode(
                AmbianceMode::builder()
                    .room_id(room)
                    .name("Reading")
                    .device(dimmer.id, StateValue::Level(90))
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();
        svc.toggle_mode(mode.id).await.unwrap();

        svc.delete_mode(mode.id).await.unwrap();

        assert_eq!(store.device(dimmer.id).state(), StateValue::Level(30));
        assert!(svc.list_for_room(room).await.unwrap().is_empty());
    }
}
