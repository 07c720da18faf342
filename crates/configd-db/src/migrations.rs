//! Embedded SQL migrations and runner.
//!
//! Migrations are stored as `&str` constants and executed in order. A
//! `schema_migrations` table tracks which versions have been applied.

use configd_core::Error;
use rusqlite::Connection;

use configd_core::Result;

/// V1: initial schema -- organizations, applications, environments, config
/// versions, and the append-only change log.
const V1_INITIAL: &str = r#"
CREATE TABLE organizations (
    id         TEXT PRIMARY KEY,
    slug       TEXT NOT NULL UNIQUE,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE applications (
    id         TEXT PRIMARY KEY,
    org_id     TEXT NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
    slug       TEXT NOT NULL,
    name       TEXT NOT NULL,
    api_key    TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    UNIQUE(org_id, slug)
);

CREATE TABLE environments (
    id         TEXT PRIMARY KEY,
    app_id     TEXT NOT NULL REFERENCES applications(id) ON DELETE CASCADE,
    slug       TEXT NOT NULL,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(app_id, slug)
);

CREATE TABLE config_versions (
    id         TEXT PRIMARY KEY,
    env_id     TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
    version    INTEGER NOT NULL,
    config     TEXT NOT NULL,
    is_active  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE(env_id, version)
);

-- Enforces "at most one active version per environment" race-free at the
-- database layer, independent of any application-level locking.
CREATE UNIQUE INDEX idx_config_versions_one_active
    ON config_versions(env_id) WHERE is_active = 1;

CREATE TABLE config_changes (
    id           TEXT PRIMARY KEY,
    env_id       TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
    version_from INTEGER,
    version_to   INTEGER NOT NULL,
    action       TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    created_by   TEXT NOT NULL
);

CREATE INDEX idx_applications_org        ON applications(org_id);
CREATE INDEX idx_environments_app        ON environments(app_id);
CREATE INDEX idx_config_versions_env     ON config_versions(env_id);
CREATE INDEX idx_config_changes_env_time ON config_changes(env_id, created_at);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Run all pending migrations on `conn`.
///
/// Creates the `schema_migrations` tracking table if it does not exist,
/// then applies each outstanding migration inside a transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    for &(version, sql) in MIGRATIONS {
        let already: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
                [version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;

        if already {
            continue;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;

        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(|e| Error::database(e.to_string()))?;

        tx.commit().map_err(|e| Error::database(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
    }

    #[test]
    fn test_all_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();

        let tables = [
            "organizations",
            "applications",
            "environments",
            "config_versions",
            "config_changes",
            "schema_migrations",
        ];
        for t in &tables {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [t],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "table {t} should exist");
        }
    }

    #[test]
    fn test_single_active_index_rejects_second_active_row() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO organizations (id, slug, name, created_at) VALUES ('o1','demo','Demo',datetime('now'))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO applications (id, org_id, slug, name, api_key, created_at) VALUES ('a1','o1','app','App','key1',datetime('now'))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO environments (id, app_id, slug, name, created_at) VALUES ('e1','a1','prod','Prod',datetime('now'))",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO config_versions (id, env_id, version, config, is_active, created_at, created_by) VALUES ('v1','e1',1,'{}',1,datetime('now'),'tester')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO config_versions (id, env_id, version, config, is_active, created_at, created_by) VALUES ('v2','e1',2,'{}',1,datetime('now'),'tester')",
            [],
        );
        assert!(result.is_err(), "second active row for the same env must violate the partial unique index");
    }
}
