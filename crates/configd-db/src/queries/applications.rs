//! Application CRUD operations.

use base64::Engine;
use chrono::Utc;
use configd_core::{validate_slug, ApplicationId, Error, OrganizationId, Result};
use rand::RngCore;
use rusqlite::{OptionalExtension, Connection};

use crate::models::Application;
use crate::queries::organizations::is_unique_violation;

/// Generate a random, high-entropy, URL-safe opaque API key (256 bits).
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Create a new application under an organization identified by slug.
/// Fails with [`Error::InvalidArgument`] if `slug` is malformed,
/// [`Error::NotFound`] if the organization is missing, or
/// [`Error::AlreadyExists`] on `(org, slug)` collision.
pub fn create_application(
    conn: &Connection,
    org_slug: &str,
    name: &str,
    slug: &str,
) -> Result<Application> {
    validate_slug(slug).map_err(Error::InvalidArgument)?;

    let org_id: Option<String> = conn
        .query_row(
            "SELECT id FROM organizations WHERE slug = ?1",
            [org_slug],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(org_id) = org_id else {
        return Err(Error::not_found("organization", org_slug));
    };
    let org_id = org_id
        .parse::<uuid::Uuid>()
        .map_err(|e| Error::database(e.to_string()))?;

    let id = ApplicationId::new();
    let api_key = generate_api_key();
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO applications (id, org_id, slug, name, api_key, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            id.to_string(),
            org_id.to_string(),
            slug,
            name,
            api_key,
            created_at.to_rfc3339()
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            Error::AlreadyExists(format!("application '{org_slug}/{slug}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Application {
        id,
        org_id: OrganizationId::from(org_id),
        slug: slug.to_string(),
        name: name.to_string(),
        api_key,
        created_at,
    })
}

/// Get an application by (org slug, app slug).
pub fn get_application_by_slugs(
    conn: &Connection,
    org_slug: &str,
    app_slug: &str,
) -> Result<Option<Application>> {
    let result = conn.query_row(
        "SELECT a.id, a.org_id, a.slug, a.name, a.api_key, a.created_at
         FROM applications a
         JOIN organizations o ON o.id = a.org_id
         WHERE o.slug = ?1 AND a.slug = ?2",
        [org_slug, app_slug],
        Application::from_row,
    );
    match result {
        Ok(app) => Ok(Some(app)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Get an application by its opaque API key.
pub fn get_application_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Application>> {
    let result = conn.query_row(
        "SELECT id, org_id, slug, name, api_key, created_at FROM applications WHERE api_key = ?1",
        [api_key],
        Application::from_row,
    );
    match result {
        Ok(app) => Ok(Some(app)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List applications within an organization, ordered by slug.
pub fn list_applications(conn: &Connection, org_slug: &str) -> Result<Vec<Application>> {
    let mut stmt = conn
        .prepare(
            "SELECT a.id, a.org_id, a.slug, a.name, a.api_key, a.created_at
             FROM applications a
             JOIN organizations o ON o.id = a.org_id
             WHERE o.slug = ?1
             ORDER BY a.slug",
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([org_slug], Application::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete an application by (org slug, app slug).
pub fn delete_application(conn: &Connection, org_slug: &str, app_slug: &str) -> Result<bool> {
    let n = conn
        .execute(
            "DELETE FROM applications WHERE org_id = (SELECT id FROM organizations WHERE slug = ?1) AND slug = ?2",
            [org_slug, app_slug],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::organizations::create_organization;

    #[test]
    fn crud() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_organization(&conn, "Demo", "demo-org").unwrap();

        let app = create_application(&conn, "demo-org", "App", "app").unwrap();
        assert_eq!(app.slug, "app");
        assert!(!app.api_key.is_empty());

        let found = get_application_by_slugs(&conn, "demo-org", "app").unwrap().unwrap();
        assert_eq!(found.id, app.id);

        let by_key = get_application_by_api_key(&conn, &app.api_key).unwrap().unwrap();
        assert_eq!(by_key.id, app.id);

        let apps = list_applications(&conn, "demo-org").unwrap();
        assert_eq!(apps.len(), 1);

        assert!(delete_application(&conn, "demo-org", "app").unwrap());
    }

    #[test]
    fn missing_org_is_not_found() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let err = create_application(&conn, "ghost-org", "App", "app").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn duplicate_app_slug_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_organization(&conn, "Demo", "demo-org").unwrap();
        create_application(&conn, "demo-org", "App", "app").unwrap();

        let err = create_application(&conn, "demo-org", "App2", "app").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn malformed_slug_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        create_organization(&conn, "Demo", "demo-org").unwrap();

        let err = create_application(&conn, "demo-org", "App", "Not A Slug!!").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn api_keys_are_high_entropy_and_unique() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
        // 32 bytes base64url-no-pad encodes to 43 characters.
        assert_eq!(a.len(), 43);
    }
}
