//! Append-only change history for config versions.

use chrono::Utc;
use configd_core::{ConfigChangeId, EnvironmentId, Error, Result};
use rusqlite::Connection;

use crate::models::{ChangeAction, ConfigChange};

/// Record a change. Called in the same transaction as the version insert it
/// documents so the audit log never drifts from the version table.
pub fn insert_change(
    conn: &Connection,
    env_id: EnvironmentId,
    version_from: Option<i64>,
    version_to: i64,
    action: ChangeAction,
    created_by: &str,
) -> Result<ConfigChange> {
    let id = ConfigChangeId::new();
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO config_changes (id, env_id, version_from, version_to, action, created_at, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            id.to_string(),
            env_id.to_string(),
            version_from,
            version_to,
            action.as_str(),
            created_at.to_rfc3339(),
            created_by,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ConfigChange {
        id,
        env_id,
        version_from,
        version_to,
        action,
        created_at,
        created_by: created_by.to_string(),
    })
}

/// Change history for an environment, newest first, with offset/limit pagination.
pub fn list_changes(
    conn: &Connection,
    env_id: EnvironmentId,
    limit: i64,
    offset: i64,
) -> Result<Vec<ConfigChange>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, env_id, version_from, version_to, action, created_at, created_by
             FROM config_changes WHERE env_id = ?1
             ORDER BY created_at DESC, version_to DESC LIMIT ?2 OFFSET ?3",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![env_id.to_string(), limit, offset], ConfigChange::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
