//! Environment CRUD operations.

use chrono::Utc;
use configd_core::{validate_slug, ApplicationId, EnvironmentId, Error, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::Environment;
use crate::queries::organizations::is_unique_violation;

/// Create a new environment under an application identified by
/// (org slug, app slug). Fails with [`Error::InvalidArgument`] if `slug` is
/// malformed, [`Error::NotFound`] if the application is missing, or
/// [`Error::AlreadyExists`] on `(app, slug)` collision.
pub fn create_environment(
    conn: &Connection,
    org_slug: &str,
    app_slug: &str,
    name: &str,
    slug: &str,
) -> Result<Environment> {
    validate_slug(slug).map_err(Error::InvalidArgument)?;

    let app_id: Option<String> = conn
        .query_row(
            "SELECT a.id FROM applications a JOIN organizations o ON o.id = a.org_id
             WHERE o.slug = ?1 AND a.slug = ?2",
            [org_slug, app_slug],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(app_id) = app_id else {
        return Err(Error::not_found("application", format!("{org_slug}/{app_slug}")));
    };
    let app_id_uuid = app_id
        .parse::<uuid::Uuid>()
        .map_err(|e| Error::database(e.to_string()))?;

    let id = EnvironmentId::new();
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO environments (id, app_id, slug, name, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id.to_string(), app_id, name, slug, created_at.to_rfc3339()],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyExists(format!("environment '{app_slug}/{slug}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Environment {
        id,
        app_id: ApplicationId::from(app_id_uuid),
        slug: slug.to_string(),
        name: name.to_string(),
        created_at,
    })
}

/// Get an environment by (org slug, app slug, env slug).
pub fn get_environment_by_slugs(
    conn: &Connection,
    org_slug: &str,
    app_slug: &str,
    env_slug: &str,
) -> Result<Option<Environment>> {
    let result = conn.query_row(
        "SELECT e.id, e.app_id, e.slug, e.name, e.created_at
         FROM environments e
         JOIN applications a ON a.id = e.app_id
         JOIN organizations o ON o.id = a.org_id
         WHERE o.slug = ?1 AND a.slug = ?2 AND e.slug = ?3",
        [org_slug, app_slug, env_slug],
        Environment::from_row,
    );
    match result {
        Ok(env) => Ok(Some(env)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get an environment by application API key and env slug.
pub fn get_environment_by_api_key(
    conn: &Connection,
    api_key: &str,
    env_slug: &str,
) -> Result<Option<Environment>> {
    let result = conn.query_row(
        "SELECT e.id, e.app_id, e.slug, e.name, e.created_at
         FROM environments e
         JOIN applications a ON a.id = e.app_id
         WHERE a.api_key = ?1 AND e.slug = ?2",
        [api_key, env_slug],
        Environment::from_row,
    );
    match result {
        Ok(env) => Ok(Some(env)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Resolve the (org slug, app slug, env slug) triple for an environment id.
/// Used to fill in [`configd_core::ConfigResponse`]'s scope fields when a
/// lookup started from an API key rather than slugs.
pub fn get_scope_slugs(conn: &Connection, env_id: EnvironmentId) -> Result<Option<(String, String, String)>> {
    let result = conn.query_row(
        "SELECT o.slug, a.slug, e.slug
         FROM environments e
         JOIN applications a ON a.id = e.app_id
         JOIN organizations o ON o.id = a.org_id
         WHERE e.id = ?1",
        [env_id.to_string()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    );
    match result {
        Ok(slugs) => Ok(Some(slugs)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List environments within an application, ordered by slug.
pub fn list_environments(conn: &Connection, org_slug: &str, app_slug: &str) -> Result<Vec<Environment>> {
    let mut stmt = conn
        .prepare(
            "SELECT e.id, e.app_id, e.slug, e.name, e.created_at
             FROM environments e
             JOIN applications a ON a.id = e.app_id
             JOIN organizations o ON o.id = a.org_id
             WHERE o.slug = ?1 AND a.slug = ?2
             ORDER BY e.slug",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([org_slug, app_slug], Environment::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::applications::create_application;
    use crate::queries::organizations::create_organization;

    fn seed(conn: &Connection) {
        create_organization(conn, "Demo", "demo-org").unwrap();
        create_application(conn, "demo-org", "App", "app").unwrap();
    }

    #[test]
    fn crud() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);

        let env = create_environment(&conn, "demo-org", "app", "Prod", "prod").unwrap();
        assert_eq!(env.slug, "prod");

        let found = get_environment_by_slugs(&conn, "demo-org", "app", "prod").unwrap().unwrap();
        assert_eq!(found.id, env.id);

        let envs = list_environments(&conn, "demo-org", "app").unwrap();
        assert_eq!(envs.len(), 1);
    }

    #[test]
    fn missing_app_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);
        let err = create_environment(&conn, "demo-org", "ghost", "Prod", "prod").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn duplicate_env_slug_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);
        create_environment(&conn, "demo-org", "app", "Prod", "prod").unwrap();
        let err = create_environment(&conn, "demo-org", "app", "Prod2", "prod").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn malformed_slug_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);
        let err = create_environment(&conn, "demo-org", "app", "Prod", "Not A Slug!!").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn lookup_by_api_key() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);
        create_environment(&conn, "demo-org", "app", "Prod", "prod").unwrap();
        let app = get_application_by_api_key_helper(&conn);
        let found = get_environment_by_api_key(&conn, &app, "prod").unwrap();
        assert!(found.is_some());
    }

    fn get_application_by_api_key_helper(conn: &Connection) -> String {
        conn.query_row("SELECT api_key FROM applications LIMIT 1", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn scope_slugs_resolve_from_env_id() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        seed(&conn);
        let env = create_environment(&conn, "demo-org", "app", "Prod", "prod").unwrap();

        let (org, app, env_slug) = get_scope_slugs(&conn, env.id).unwrap().unwrap();
        assert_eq!((org.as_str(), app.as_str(), env_slug.as_str()), ("demo-org", "app", "prod"));
    }
}
