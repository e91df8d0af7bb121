//! Rows of `automation_bindings` and `ambiance_bindings`.
//!
//! Both tables share one layout apart from the owner column, so the SQL is
//! picked per [`Owner`] and the row mapping is shared.

use std::collections::HashMap;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqliteConnection};

use dwell_domain::binding::{Binding, Snapshot, same_targets};
use dwell_domain::device::{DeviceStatus, StateValue};
use dwell_domain::id::DeviceId;

use crate::error::{StorageError, decode};

/// Which binding table a query targets.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Owner {
    Automation,
    Ambiance,
}

impl Owner {
    const fn insert(self) -> &'static str {
        match self {
            Self::Automation => {
                "INSERT INTO automation_bindings (automation_id, device_id, position, target_state, target_on, snapshot) VALUES (?, ?, ?, ?, ?, ?)"
            }
            Self::Ambiance => {
                "INSERT INTO ambiance_bindings (mode_id, device_id, position, target_state, target_on, snapshot) VALUES (?, ?, ?, ?, ?, ?)"
            }
        }
    }

    const fn delete(self) -> &'static str {
        match self {
            Self::Automation => "DELETE FROM automation_bindings WHERE automation_id = ?",
            Self::Ambiance => "DELETE FROM ambiance_bindings WHERE mode_id = ?",
        }
    }

    const fn select_for_owner(self) -> &'static str {
        match self {
            Self::Automation => {
                "SELECT automation_id AS owner_id, device_id, target_state, target_on, snapshot FROM automation_bindings WHERE automation_id = ? ORDER BY position"
            }
            Self::Ambiance => {
                "SELECT mode_id AS owner_id, device_id, target_state, target_on, snapshot FROM ambiance_bindings WHERE mode_id = ? ORDER BY position"
            }
        }
    }

    const fn select_all(self) -> &'static str {
        match self {
            Self::Automation => {
                "SELECT automation_id AS owner_id, device_id, target_state, target_on, snapshot FROM automation_bindings ORDER BY automation_id, position"
            }
            Self::Ambiance => {
                "SELECT mode_id AS owner_id, device_id, target_state, target_on, snapshot FROM ambiance_bindings ORDER BY mode_id, position"
            }
        }
    }
}

/// A binding together with the id of the rule or mode owning it.
pub(crate) struct BindingRow {
    owner_id: String,
    binding: Binding,
}

fn from_json<T: serde::de::DeserializeOwned>(value: Option<String>) -> Result<Option<T>, sqlx::Error> {
    value
        .map(|json| serde_json::from_str(&json).map_err(decode))
        .transpose()
}

impl<'r> FromRow<'r, SqliteRow> for BindingRow {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let owner_id: String = row.try_get("owner_id")?;
        let device_id: String = row.try_get("device_id")?;
        let target_state: Option<String> = row.try_get("target_state")?;
        let target_on: bool = row.try_get("target_on")?;
        let snapshot: Option<String> = row.try_get("snapshot")?;

        let device_id = DeviceId::from_str(&device_id).map_err(decode)?;
        let target_state: Option<StateValue> = from_json(target_state)?;
        let snapshot: Option<Snapshot> = from_json(snapshot)?;

        Ok(Self {
            owner_id,
            binding: Binding {
                device_id,
                target_state,
                target_status: DeviceStatus::from(target_on),
                snapshot,
            },
        })
    }
}

/// Load the bindings of one owner, in insertion order.
pub(crate) async fn load(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
) -> Result<Vec<Binding>, StorageError> {
    let rows: Vec<BindingRow> = sqlx::query_as(owner.select_for_owner())
        .bind(owner_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(|row| row.binding).collect())
}

/// Load every binding of a table, grouped by owner id.
pub(crate) async fn load_all(
    conn: &mut SqliteConnection,
    owner: Owner,
) -> Result<HashMap<String, Vec<Binding>>, StorageError> {
    let rows: Vec<BindingRow> = sqlx::query_as(owner.select_all())
        .fetch_all(&mut *conn)
        .await?;
    let mut grouped: HashMap<String, Vec<Binding>> = HashMap::new();
    for row in rows {
        grouped.entry(row.owner_id).or_default().push(row.binding);
    }
    Ok(grouped)
}

/// Replace the bindings of one owner.
pub(crate) async fn replace(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
    bindings: &[Binding],
) -> Result<(), StorageError> {
    sqlx::query(owner.delete())
        .bind(owner_id)
        .execute(&mut *conn)
        .await?;

    for (position, binding) in (0_i64..).zip(bindings) {
        let target_state = binding
            .target_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let snapshot = binding
            .snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(owner.insert())
            .bind(owner_id)
            .bind(binding.device_id.to_string())
            .bind(position)
            .bind(target_state)
            .bind(binding.target_status.is_on())
            .bind(snapshot)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Apply a definition change to the bindings of one owner.
///
/// Stored snapshots are never overwritten: when the targets are unchanged the
/// stored rows are kept as they are, otherwise they are replaced with
/// snapshot-free rows. Returns `None` without writing when the targets
/// changed but the owner is `active`.
pub(crate) async fn redefine(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
    incoming: &[Binding],
    active: bool,
) -> Result<Option<Vec<Binding>>, StorageError> {
    let stored = load(conn, owner, owner_id).await?;
    if same_targets(&stored, incoming) {
        return Ok(Some(stored));
    }
    if active {
        return Ok(None);
    }

    let fresh: Vec<Binding> = incoming
        .iter()
        .map(|binding| Binding {
            snapshot: None,
            ..binding.clone()
        })
        .collect();
    replace(conn, owner, owner_id, &fresh).await?;
    Ok(Some(fresh))
}
