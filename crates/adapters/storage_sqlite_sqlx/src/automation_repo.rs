//! `SQLite` implementation of [`AutomationRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection, SqlitePool};

use dwell_app::ports::AutomationRepository;
use dwell_domain::automation::{AutomationRule, TimeWindow};
use dwell_domain::device::DeviceWrite;
use dwell_domain::error::DwellError;
use dwell_domain::id::{AutomationId, HouseId};
use dwell_domain::time::{TimeOfDay, parse_time_of_day};

use crate::binding_rows::{self, Owner};
use crate::device_repo;
use crate::error::{StorageError, decode};

/// Rule row without its bindings, which live in their own table.
struct Wrapper(AutomationRule);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let house_id: String = row.try_get("house_id")?;
        let name: String = row.try_get("name")?;
        let window_start: String = row.try_get("window_start")?;
        let window_end: String = row.try_get("window_end")?;
        let enabled: bool = row.try_get("enabled")?;
        let is_running: bool = row.try_get("is_running")?;
        let last_triggered: Option<String> = row.try_get("last_triggered")?;

        let id = AutomationId::from_str(&id).map_err(decode)?;
        let house_id = HouseId::from_str(&house_id).map_err(decode)?;
        let window = TimeWindow::new(
            parse_time_of_day(&window_start).map_err(decode)?,
            parse_time_of_day(&window_end).map_err(decode)?,
        );
        let last_triggered = last_triggered
            .map(|s| {
                chrono::DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.to_utc())
                    .map_err(decode)
            })
            .transpose()?;

        Ok(Self(AutomationRule {
            id,
            house_id,
            name,
            window,
            enabled,
            is_running,
            last_triggered,
            bindings: Vec::new(),
        }))
    }
}

const INSERT: &str = "INSERT INTO automations (id, house_id, name, window_start, window_end, enabled, is_running, last_triggered) VALUES (?, ?, ?, ?, ?, ?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM automations WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM automations ORDER BY name";
const SELECT_SCHEDULABLE: &str =
    "SELECT * FROM automations WHERE enabled = 1 OR is_running = 1 ORDER BY name";
const SELECT_BY_HOUSE: &str = "SELECT * FROM automations WHERE house_id = ? ORDER BY name";
const UPDATE: &str =
    "UPDATE automations SET house_id = ?, name = ?, window_start = ?, window_end = ? WHERE id = ?";
const UPDATE_FLAGS_IF_RUNNING_IS: &str = "UPDATE automations SET enabled = ?, is_running = ?, last_triggered = ? WHERE id = ? AND is_running = ?";
const EXISTS: &str = "SELECT COUNT(*) FROM automations WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM automations WHERE id = ?";

fn format_time(time: TimeOfDay) -> String {
    time.format("%H:%M:%S").to_string()
}

fn not_found(id: AutomationId) -> DwellError {
    id.not_found().into()
}

async fn exists(conn: &mut SqliteConnection, id: AutomationId) -> Result<bool, StorageError> {
    let (count,): (i64,) = sqlx::query_as(EXISTS)
        .bind(id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    Ok(count > 0)
}

async fn with_bindings(
    conn: &mut SqliteConnection,
    rows: Vec<Wrapper>,
) -> Result<Vec<AutomationRule>, StorageError> {
    let mut bindings = binding_rows::load_all(conn, Owner::Automation).await?;
    Ok(rows
        .into_iter()
        .map(|Wrapper(mut rule)| {
            rule.bindings = bindings.remove(&rule.id.to_string()).unwrap_or_default();
            rule
        })
        .collect())
}

/// `SQLite`-backed automation repository.
pub struct SqliteAutomationRepository {
    pool: SqlitePool,
}

impl SqliteAutomationRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Run a listing query and attach the bindings of every returned rule.
async fn list(
    pool: &SqlitePool,
    sql: &'static str,
    house_id: Option<HouseId>,
) -> Result<Vec<AutomationRule>, StorageError> {
    let mut conn = pool.acquire().await?;
    let mut query = sqlx::query_as::<_, Wrapper>(sql);
    if let Some(house_id) = house_id {
        query = query.bind(house_id.to_string());
    }
    let rows: Vec<Wrapper> = query.fetch_all(&mut *conn).await?;
    with_bindings(&mut conn, rows).await
}

impl AutomationRepository for SqliteAutomationRepository {
    fn create(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = rule.id.to_string();
            sqlx::query(INSERT)
                .bind(&id)
                .bind(rule.house_id.to_string())
                .bind(&rule.name)
                .bind(format_time(rule.window.start))
                .bind(format_time(rule.window.end))
                .bind(rule.enabled)
                .bind(rule.is_running)
                .bind(rule.last_triggered.map(|ts| ts.to_rfc3339()))
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            binding_rows::replace(&mut tx, Owner::Automation, &id, &rule.bindings).await?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(rule)
        }
    }

    fn get_by_id(
        &self,
        id: AutomationId,
    ) -> impl Future<Output = Result<Option<AutomationRule>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut conn = pool.acquire().await.map_err(StorageError::from)?;
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await
                .map_err(StorageError::from)?;
            let Some(Wrapper(mut rule)) = row else {
                return Ok(None);
            };
            rule.bindings =
                binding_rows::load(&mut conn, Owner::Automation, &id.to_string()).await?;
            Ok(Some(rule))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move { list(&pool, SELECT_ALL, None).await.map_err(DwellError::from) }
    }

    fn get_schedulable(
        &self,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move { list(&pool, SELECT_SCHEDULABLE, None).await.map_err(DwellError::from) }
    }

    fn find_by_house(
        &self,
        house_id: HouseId,
    ) -> impl Future<Output = Result<Vec<AutomationRule>, DwellError>> + Send {
        let pool = self.pool.clone();
        async move { list(&pool, SELECT_BY_HOUSE, Some(house_id)).await.map_err(DwellError::from) }
    }

    fn update(
        &self,
        rule: AutomationRule,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = rule.id.to_string();
            let result = sqlx::query(UPDATE)
                .bind(rule.house_id.to_string())
                .bind(&rule.name)
                .bind(format_time(rule.window.start))
                .bind(format_time(rule.window.end))
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                return Err(not_found(rule.id));
            }
            let Some(Wrapper(mut stored)) = sqlx::query_as::<_, Wrapper>(SELECT_BY_ID)
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::from)?
            else {
                return Err(not_found(rule.id));
            };
            let Some(bindings) = binding_rows::redefine(
                &mut tx,
                Owner::Automation,
                &id,
                &rule.bindings,
                stored.is_running,
            )
            .await?
            else {
                return Err(rule.id.conflict().into());
            };
            stored.bindings = bindings;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(stored)
        }
    }

    fn delete(&self, id: AutomationId) -> impl Future<Output = Result<(), DwellError>> + Send {
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
        rule: AutomationRule,
        was_running: bool,
        writes: Vec<DeviceWrite>,
    ) -> impl Future<Output = Result<AutomationRule, DwellError>> + Send {
        let pool = self.pool.clone();
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let id = rule.id.to_string();

            let result = sqlx::query(UPDATE_FLAGS_IF_RUNNING_IS)
                .bind(rule.enabled)
                .bind(rule.is_running)
                .bind(rule.last_triggered.map(|ts| ts.to_rfc3339()))
                .bind(&id)
                .bind(was_running)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            if result.rows_affected() == 0 {
                if exists(&mut tx, rule.id).await? {
                    return Err(rule.id.conflict().into());
                }
                return Err(not_found(rule.id));
            }

            device_repo::apply_writes(&mut tx, &writes).await?;
            binding_rows::replace(&mut tx, Owner::Automation, &id, &rule.bindings).await?;
            tx.commit().await.map_err(StorageError::from)?;

            Ok(rule)
        }
    }
}
