//! `SQLite` implementation of [`AmbianceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use dwell_app::ports::AmbianceRepository;
use dwell_domain::ambiance::AmbianceMode;
use dwell_domain::device::{DeviceStatus, DeviceWrite};
use dwell_domain::error::DwellError;
use dwell_domain::id::{AmbianceModeId, RoomId};

use crate::binding_rows::{self, Owner};
use crate::device_repo;
use crate::error::{StorageError, decode};

/// Mode row without its bindings.
struct Wrapper(AmbianceMode);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let room_id: String = row.try_get("room_id")?;
        let name: String = row.try_get("name")?;
        let is_on: bool = row.try_get("is_on")?;

        Ok(Self(AmbianceMode {
            id: AmbianceModeId::from_str(&id).map_err(decode)?,
            room_id: RoomId::from_str(&room_id).map_err(decode)?,
            name,
            status: DeviceStatus::from(is_on),
            bindings: Vec::new(),
        }))
    }
}

const INSERT: &str = "INSERT INTO ambiance_modes (id, room_id, name, is_on) VALUES (?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM ambiance_modes WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM ambiance_modes ORDER BY name";
const SELECT_BY_ROOM: &str = "SELECT * FROM ambiance_modes WHERE room_id = ? ORDER BY name";
const UPDATE: &str = "UPDATE ambiance_modes SET room_id = ?, name = ? WHERE id = ?";
const UPDATE_STATUS_IF: &str = "UPDATE ambiance_modes SET is_on = ? WHERE id = ? AND is_on = ?";
const EXISTS: &str = "SELECT COUNT(*) FROM ambiance_modes WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM ambiance_modes WHERE id = ?";

fn not_found(id: AmbianceModeId) -> DwellError {
    id.not_found().into()
}

async fn load_one(
    conn: &mut SqliteConnection,
    id: AmbianceModeId,
) -> Result<Option<AmbianceMode>, StorageError> {
    let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    let Some(Wrapper(mut mode)) = row else {
        return Ok(None);
    };
    mode.bindings = binding_rows::load(conn, Owner::Ambiance, &id.to_string()).await?;
    Ok(Some(mode))
}

async fn list(
    pool: &SqlitePool,
    sql: &'static str,
    room_id: Option<RoomId>,
) -> Result<Vec<AmbianceMode>, StorageError> {
    let mut conn = pool.acquire().await?;
    let mut query = sqlx::query_as::<_, Wrapper>(sql);
    if let Some(room_id) = room_id {
        query = query.bind(room_id.to_string());
    }
    let rows = query.fetch_all(&mut *conn).await?;
    let mut bindings = binding_rows::load_all(&mut conn, Owner::Ambiance).await?;
    Ok(rows
        .into_iter()
        .map(|Wrapper(mut mode)| {
            mode.bindings = bindings.remove(&mode.id.to_string()).unwrap_or_default();
            mode
        })
        .collect())
}

/// `SQLite`-backed ambiance mode repository.
pub struct SqliteAmbianceRepository {
    pool: SqlitePool,
}

impl SqliteAmbianceRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AmbianceRepository for SqliteAmbianceRepository {
    fn create(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = mode.id.to_string();
            sqlx::query(INSERT)
                .bind(&id)
                .bind(mode.room_id.to_string())
                .bind(&mode.name)
                .bind(mode.status.is_on())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            binding_rows::replace(&mut tx, Owner::Ambiance, &id, &mode.bindings).await?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(mode)
        }
    }

    fn get_by_id(
        &self,
        id: AmbianceModeId,
    ) -> impl Future<Output = Result<Option<AmbianceMode>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut conn = pool.acquire().await.map_err(StorageError::from)?;
            load_one(&mut conn, id).await.map_err(DwellError::from)
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move { list(&pool, SELECT_ALL, None).await.map_err(DwellError::from) }
    }

    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<AmbianceMode>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move { list(&pool, SELECT_BY_ROOM, Some(room_id)).await.map_err(DwellError::from) }
    }

    fn update(
        &self,
        mode: AmbianceMode,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = mode.id.to_string();
            let result = sqlx::query(UPDATE)
                .bind(mode.room_id.to_string())
                .bind(&mode.name)
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                return Err(not_found(mode.id));
            }
            let Some(Wrapper(mut stored)) = sqlx::query_as::<_, Wrapper>(SELECT_BY_ID)
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::from)?
            else {
                return Err(not_found(mode.id));
            };
            let Some(bindings) = binding_rows::redefine(
                &mut tx,
                Owner::Ambiance,
                &id,
                &mode.bindings,
                stored.is_on(),
            )
            .await?
            else {
                return Err(mode.id.conflict().into());
            };
            stored.bindings = bindings;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(stored)
        }
    }

    fn delete(&self, id: AmbianceModeId) -> impl Future<Output = Result<(), DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(())
        }
    }

    fn commit_transition(
        &self,
        mode: AmbianceMode,
        previous: DeviceStatus,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AmbianceMode, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = mode.id.to_string();

            let result = sqlx::query(UPDATE_STATUS_IF)
                .bind(mode.status.is_on())
                .bind(&id)
                .bind(previous.is_on())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                let (count,): (i64,) = sqlx::query_as(EXISTS)
                    .bind(&id)
                    .fetch_one(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
                if count > 0 {
                    return Err(mode.id.conflict().into());
                }
                return Err(not_found(mode.id));
            }

            device_repo::apply_writes(&mut tx, &writes).await?;
            binding_rows::replace(&mut tx, Owner::Ambiance, &id, &mode.bindings).await?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(mode)
        }
    }
}

#[cfg(test)]
mod tests {
    use dwell_app::ports::DeviceRepository;
    use dwell_domain::binding::Snapshot;
    use dwell_domain::device::{Device, DeviceKind, StateValue};

    use super::*;
    use crate::device_repo::SqliteDeviceRepository;
    use crate::pool::Config;

    async fn setup() -> (SqliteAmbianceRepository, SqliteDeviceRepository) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        (
            SqliteAmbianceRepository::new(db.pool().clone()),
            SqliteDeviceRepository::new(db.pool().clone()),
        )
    }

    fn dimmer(room_id: RoomId) -> Device {
        Device::builder()
            .name("Dimmer")
            .room_id(room_id)
            .kind(DeviceKind::Variable {
                state: 20,
                range: None,
            })
            .build()
            .unwrap()
    }

    fn reading_mode(room_id: RoomId, device: &Device) -> AmbianceMode {
        AmbianceMode::builder()
            .room_id(room_id)
            .name("Reading")
            .device(device.id, StateValue::Level(75))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_mode_with_bindings() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mode = reading_mode(room, &device);

        modes.create(mode.clone()).await.unwrap();

        assert_eq!(modes.get_by_id(mode.id).await.unwrap(), Some(mode));
    }

    #[tokio::test]
    async fn should_list_modes_by_room() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        modes.create(reading_mode(room, &device)).await.unwrap();
        modes
            .create(
                AmbianceMode::builder()
                    .room_id(RoomId::new())
                    .name("Elsewhere")
                    .build()
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(modes.get_all().await.unwrap().len(), 2);
        let in_room = modes.find_by_room(room).await.unwrap();
        assert_eq!(in_room.len(), 1);
        assert_eq!(in_room[0].bindings.len(), 1);
    }

    #[tokio::test]
    async fn should_update_name_and_bindings_but_not_status() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mode = reading_mode(room, &device);
        modes.create(mode.clone()).await.unwrap();

        let mut changed = mode;
        changed.name = "Study".to_string();
        changed.status = DeviceStatus::On;
        changed.bindings.clear();
        let updated = modes.update(changed).await.unwrap();

        assert_eq!(updated.name, "Study");
        assert!(!updated.is_on());
        assert!(updated.bindings.is_empty());
    }

    #[tokio::test]
    async fn should_commit_transition_and_persist_snapshots() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mut mode = reading_mode(room, &device);
        modes.create(mode.clone()).await.unwrap();

        mode.status = DeviceStatus::On;
        mode.bindings[0].snapshot = Some(Snapshot {
            status: device.status,
            state: device.state(),
        });
        let write = DeviceWrite {
            device_id: device.id,
            status: DeviceStatus::On,
            state: Some(StateValue::Level(75)),
        };
        modes
            .commit_transition(mode.clone(), DeviceStatus::Off, vec![write])
            .await
            .unwrap();

        assert_eq!(modes.get_by_id(mode.id).await.unwrap(), Some(mode));
        let device = devices.get_by_id(device.id).await.unwrap().unwrap();
        assert_eq!(device.state(), StateValue::Level(75));
        assert_eq!(device.status, DeviceStatus::On);
    }

    /// Switch `mode` on in storage, returning the committed value.
    async fn switched_on(
        modes: &SqliteAmbianceRepository,
        mut mode: AmbianceMode,
        device: &Device,
    ) -> AmbianceMode {
        mode.status = DeviceStatus::On;
        mode.bindings[0].snapshot = Some(Snapshot {
            status: device.status,
            state: device.state(),
        });
        let write = DeviceWrite {
            device_id: device.id,
            status: DeviceStatus::On,
            state: Some(StateValue::Level(75)),
        };
        modes
            .commit_transition(mode, DeviceStatus::Off, vec![write])
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn should_keep_snapshots_when_stale_rename_lands_on_active_mode() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mode = reading_mode(room, &device);
        modes.create(mode.clone()).await.unwrap();
        let stale = modes.get_by_id(mode.id).await.unwrap().unwrap();
        let active = switched_on(&modes, mode, &device).await;

        let mut renamed = stale;
        renamed.name = "Study".to_string();
        let updated = modes.update(renamed).await.unwrap();

        assert_eq!(updated.name, "Study");
        assert!(updated.is_on());
        assert_eq!(updated.bindings, active.bindings);
        let stored = modes.get_by_id(active.id).await.unwrap().unwrap();
        assert!(stored.bindings[0].snapshot.is_some());
    }

    #[tokio::test]
    async fn should_report_conflict_when_stale_binding_change_lands_on_active_mode() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mode = reading_mode(room, &device);
        modes.create(mode.clone()).await.unwrap();
        let stale = modes.get_by_id(mode.id).await.unwrap().unwrap();
        let active = switched_on(&modes, mode, &device).await;

        let mut changed = stale;
        changed.bindings[0].target_state = Some(StateValue::Level(10));
        let result = modes.update(changed).await;

        assert!(matches!(result, Err(DwellError::Conflict(_))));
        assert_eq!(modes.get_by_id(active.id).await.unwrap(), Some(active));
    }

    #[tokio::test]
    async fn should_report_conflict_on_stale_status() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mut mode = reading_mode(room, &device);
        modes.create(mode.clone()).await.unwrap();

        mode.status = DeviceStatus::Off;
        let result = modes
            .commit_transition(mode, DeviceStatus::On, Vec::new())
            .await;

        assert!(matches!(result, Err(DwellError::Conflict(_))));
    }

    #[tokio::test]
    async fn should_return_not_found_for_missing_mode() {
        let (modes, _) = setup().await;
        let mode = AmbianceMode::builder().name("Ghost").build().unwrap();
        let result = modes
            .commit_transition(mode, DeviceStatus::Off, Vec::new())
            .await;
        assert!(matches!(result, Err(DwellError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_delete_mode_and_its_bindings() {
        let (modes, devices) = setup().await;
        let room = RoomId::new();
        let device = devices.create(dimmer(room)).await.unwrap();
        let mode = reading_mode(room, &device);
        modes.create(mode.clone()).await.unwrap();

        modes.delete(mode.id).await.unwrap();

        assert!(modes.get_by_id(mode.id).await.unwrap().is_none());
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ambiance_bindings")
            .fetch_one(&modes.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
