//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use dwell_app::ports::DeviceRepository;
use dwell_domain::device::{Device, DeviceKind, DeviceStatus, DeviceWrite, StateValue};
use dwell_domain::error::DwellError;
use dwell_domain::id::{DeviceId, RoomId};

use crate::error::{StorageError, decode};

/// Wrapper for converting database rows into domain [`Device`].
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let room_id: String = row.try_get("room_id")?;
        let name: String = row.try_get("name")?;
        let is_on: bool = row.try_get("is_on")?;
        let kind: String = row.try_get("kind")?;
        let version: i64 = row.try_get("version")?;

        let id = DeviceId::from_str(&id).map_err(decode)?;
        let room_id = RoomId::from_str(&room_id).map_err(decode)?;
        let kind: DeviceKind = serde_json::from_str(&kind).map_err(decode)?;

        Ok(Self(Device {
            id,
            room_id,
            name,
            status: DeviceStatus::from(is_on),
            kind,
            version,
        }))
    }
}

const INSERT: &str =
    "INSERT INTO devices (id, room_id, name, is_on, kind, version) VALUES (?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY name";
const SELECT_BY_ROOM: &str = "SELECT * FROM devices WHERE room_id = ? ORDER BY name";
const UPDATE_STATE: &str = "UPDATE devices SET is_on = ?, kind = ?, version = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";

fn not_found(id: DeviceId) -> DwellError {
    id.not_found().into()
}

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    id: DeviceId,
) -> Result<Option<Device>, StorageError> {
    let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(Wrapper::maybe(row))
}

async fn store(conn: &mut SqliteConnection, device: &Device) -> Result<(), StorageError> {
    let kind = serde_json::to_string(&device.kind)?;
    sqlx::query(UPDATE_STATE)
        .bind(device.status.is_on())
        .bind(kind)
        .bind(device.version)
        .bind(device.id.to_string())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Apply control writes inside an open transaction.
///
/// Stops at the first missing device or rejected write; the caller drops
/// the transaction, rolling back what was already written.
pub(crate) async fn apply_writes(
    conn: &mut SqliteConnection,
    writes: &[DeviceWrite],
) -> Result<(), DwellError> {
    for write in writes {
        let mut device = fetch(conn, write.device_id)
            .await?
            .ok_or_else(|| not_found(write.device_id))?;
        device.apply(write)?;
        store(conn, &device).await?;
    }
    Ok(())
}

/// `SQLite`-backed device repository.
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Read, change and write back one device in a single transaction.
async fn modify<F>(pool: &SqlitePool, id: DeviceId, change: F) -> Result<Device, DwellError>
where
    F: FnOnce(&mut Device) -> Result<(), DwellError>,
{
    let mut tx = pool.begin().await.map_err(StorageError::from)?;
    let mut device = fetch(&mut tx, id).await?.ok_or_else(|| not_found(id))?;
    change(&mut device)?;
    store(&mut tx, &device).await?;
    tx.commit().await.map_err(StorageError::from)?;
    Ok(device)
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let kind = serde_json::to_string(&device.kind).map_err(StorageError::from)?;
            sqlx::query(INSERT)
                .bind(device.id.to_string())
                .bind(device.room_id.to_string())
                .bind(&device.name)
                .bind(device.status.is_on())
                .bind(kind)
                .bind(device.version)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn find_by_room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<Device>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ROOM)
                .bind(room_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn set_state(
        &self,
        id: DeviceId,
        state: StateValue,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            modify(&pool, id, |device| {
                device.set_state(state)?;
                Ok(())
            })
            .await
        }
    }

    fn set_status(
        &self,
        id: DeviceId,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Device, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            modify(&pool, id, |device| {
                device.set_status(status);
                Ok(())
            })
            .await
        }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), DwellError>> + Send {
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
}
