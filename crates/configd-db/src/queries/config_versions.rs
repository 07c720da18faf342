//! Config version queries: publish, rollback, active-lookup, listing.
//!
//! Every version-mutating operation here runs inside a caller-provided
//! transaction so the single-active-row invariant and the dense version
//! sequence stay consistent even under concurrent publishes to the same
//! environment. The partial unique index on `config_versions(env_id) WHERE
//! is_active = 1` backstops the invariant at the storage layer; SQLite's
//! single-writer model backstops the sequence.

use chrono::Utc;
use configd_core::{ConfigVersionId, EnvironmentId, Error, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::ConfigVersion;

/// The currently active version for an environment, if any.
pub fn get_active_version(conn: &Connection, env_id: EnvironmentId) -> Result<Option<ConfigVersion>> {
    let result = conn.query_row(
        "SELECT id, env_id, config, is_active, version, created_at, created_by
         FROM config_versions WHERE env_id = ?1 AND is_active = 1",
        [env_id.to_string()],
        ConfigVersion::from_row,
    );
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// The active config for an environment identified by (org slug, app slug, env slug).
pub fn get_active_config_by_slugs(
    conn: &Connection,
    org_slug: &str,
    app_slug: &str,
    env_slug: &str,
) -> Result<Option<(EnvironmentId, ConfigVersion)>> {
    let env_id: Option<String> = conn
        .query_row(
            "SELECT e.id FROM environments e
             JOIN applications a ON a.id = e.app_id
             JOIN organizations o ON o.id = a.org_id
             WHERE o.slug = ?1 AND a.slug = ?2 AND e.slug = ?3",
            [org_slug, app_slug, env_slug],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(env_id) = env_id else {
        return Ok(None);
    };
    let env_id = EnvironmentId::from(
        env_id.parse::<uuid::Uuid>().map_err(|e| Error::database(e.to_string()))?,
    );
    Ok(get_active_version(conn, env_id)?.map(|v| (env_id, v)))
}

/// The active config for an environment identified by application API key and env slug.
pub fn get_active_config_by_api_key(
    conn: &Connection,
    api_key: &str,
    env_slug: &str,
) -> Result<Option<(EnvironmentId, ConfigVersion)>> {
    let env_id: Option<String> = conn
        .query_row(
            "SELECT e.id FROM environments e
             JOIN applications a ON a.id = e.app_id
             WHERE a.api_key = ?1 AND e.slug = ?2",
            [api_key, env_slug],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(env_id) = env_id else {
        return Ok(None);
    };
    let env_id = EnvironmentId::from(
        env_id.parse::<uuid::Uuid>().map_err(|e| Error::database(e.to_string()))?,
    );
    Ok(get_active_version(conn, env_id)?.map(|v| (env_id, v)))
}

fn max_version(conn: &Connection, env_id: EnvironmentId) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM config_versions WHERE env_id = ?1",
        [env_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Publish a new config version for an environment: deactivates the
/// previously active version (if any) and inserts the next dense version
/// number as active. Must run inside a transaction opened by the caller so
/// that concurrent publishes to the same environment serialize.
pub fn insert_published_version(
    conn: &Connection,
    env_id: EnvironmentId,
    config: &serde_json::Value,
    created_by: &str,
) -> Result<ConfigVersion> {
    let next_version = max_version(conn, env_id)? + 1;
    deactivate_current(conn, env_id)?;

    let id = ConfigVersionId::new();
    let created_at = Utc::now();
    let config_text = serde_json::to_string(config).map_err(|e| Error::InvalidArgument(e.to_string()))?;

    conn.execute(
        "INSERT INTO config_versions (id, env_id, version, config, is_active, created_at, created_by)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
        rusqlite::params![
            id.to_string(),
            env_id.to_string(),
            next_version,
            config_text,
            created_at.to_rfc3339(),
            created_by,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ConfigVersion {
        id,
        env_id,
        version: next_version,
        config: config.clone(),
        is_active: true,
        created_at,
        created_by: created_by.to_string(),
    })
}

/// Roll back an environment to a previously published version: copies that
/// version's config into a brand-new version at the head of the sequence
/// (rollback never rewinds the version counter). Must run inside a
/// transaction opened by the caller.
pub fn insert_rollback_version(
    conn: &Connection,
    env_id: EnvironmentId,
    target_version: i64,
    created_by: &str,
) -> Result<ConfigVersion> {
    let target: Option<String> = conn
        .query_row(
            "SELECT config FROM config_versions WHERE env_id = ?1 AND version = ?2",
            rusqlite::params![env_id.to_string(), target_version],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(config_text) = target else {
        return Err(Error::not_found("config version", target_version.to_string()));
    };
    let config: serde_json::Value =
        serde_json::from_str(&config_text).map_err(|e| Error::Internal(e.to_string()))?;

    let next_version = max_version(conn, env_id)? + 1;
    deactivate_current(conn, env_id)?;

    let id = ConfigVersionId::new();
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO config_versions (id, env_id, version, config, is_active, created_at, created_by)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
        rusqlite::params![
            id.to_string(),
            env_id.to_string(),
            next_version,
            config_text,
            created_at.to_rfc3339(),
            created_by,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(ConfigVersion {
        id,
        env_id,
        version: next_version,
        config,
        is_active: true,
        created_at,
        created_by: created_by.to_string(),
    })
}

fn deactivate_current(conn: &Connection, env_id: EnvironmentId) -> Result<()> {
    conn.execute(
        "UPDATE config_versions SET is_active = 0 WHERE env_id = ?1 AND is_active = 1",
        [env_id.to_string()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// List versions for an environment, newest first, with simple offset/limit pagination.
pub fn list_versions(
    conn: &Connection,
    env_id: EnvironmentId,
    limit: i64,
    offset: i64,
) -> Result<Vec<ConfigVersion>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, env_id, config, is_active, version, created_at, created_by
             FROM config_versions WHERE env_id = ?1
             ORDER BY version DESC LIMIT ?2 OFFSET ?3",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(rusqlite::params![env_id.to_string(), limit, offset], ConfigVersion::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Fetch a single version by its version number.
pub fn get_version(conn: &Connection, env_id: EnvironmentId, version: i64) -> Result<Option<ConfigVersion>> {
    let result = conn.query_row(
        "SELECT id, env_id, config, is_active, version, created_at, created_by
         FROM config_versions WHERE env_id = ?1 AND version = ?2",
        rusqlite::params![env_id.to_string(), version],
        ConfigVersion::from_row,
    );
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::applications::create_application;
    use crate::queries::environments::create_environment;
    use crate::queries::organizations::create_organization;
    use serde_json::json;

    fn seed_env(conn: &Connection) -> EnvironmentId {
        create_organization(conn, "Demo", "demo-org").unwrap();
        create_application(conn, "demo-org", "App", "app").unwrap();
        create_environment(conn, "demo-org", "app", "Prod", "prod").unwrap().id
    }

    #[test]
    fn publish_first_version_is_one_and_active() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let env_id = seed_env(&conn);

        let v = insert_published_version(&conn, env_id, &json!({"a": 1}), "alice").unwrap();
        assert_eq!(v.version, 1);
        assert!(v.is_active);

        let active = get_active_version(&conn, env_id).unwrap().unwrap();
        assert_eq!(active.version, 1);
    }

    #[test]
    fn publishing_again_deactivates_previous_and_increments() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let env_id = seed_env(&conn);

        insert_published_version(&conn, env_id, &json!({"a": 1}), "alice").unwrap();
        let v2 = insert_published_version(&conn, env_id, &json!({"a": 2}), "alice").unwrap();
        assert_eq!(v2.version, 2);

        let versions = list_versions(&conn, env_id, 10, 0).unwrap();
        assert_eq!(versions.len(), 2);
        let active_count = versions.iter().filter(|v| v.is_active).count();
        assert_eq!(active_count, 1);
        assert!(versions[0].is_active);
    }

    #[test]
    fn rollback_creates_new_version_with_old_config() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let env_id = seed_env(&conn);

        insert_published_version(&conn, env_id, &json!({"a": 1}), "alice").unwrap();
        insert_published_version(&conn, env_id, &json!({"a": 2}), "alice").unwrap();
        let rolled = insert_rollback_version(&conn, env_id, 1, "bob").unwrap();

        assert_eq!(rolled.version, 3);
        assert_eq!(rolled.config, json!({"a": 1}));
        let active = get_active_version(&conn, env_id).unwrap().unwrap();
        assert_eq!(active.version, 3);
    }

    #[test]
    fn rollback_to_missing_version_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let env_id = seed_env(&conn);
        insert_published_version(&conn, env_id, &json!({"a": 1}), "alice").unwrap();

        let err = insert_rollback_version(&conn, env_id, 99, "bob").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn get_active_config_by_slugs_resolves_through_joins() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let env_id = seed_env(&conn);
        insert_published_version(&conn, env_id, &json!({"a": 1}), "alice").unwrap();

        let (found_env, version) = get_active_config_by_slugs(&conn, "demo-org", "app", "prod")
            .unwrap()
            .unwrap();
        assert_eq!(found_env, env_id);
        assert_eq!(version.version, 1);
    }

    #[test]
    fn no_active_config_before_first_publish() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed_env(&conn);

        let result = get_active_config_by_slugs(&conn, "demo-org", "app", "prod").unwrap();
        assert!(result.is_none());
    }
}
