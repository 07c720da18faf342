//! Organization CRUD operations.

use chrono::Utc;
use configd_core::{validate_slug, Error, OrganizationId, Result};
use rusqlite::Connection;

use crate::models::Organization;

/// Create a new organization. Fails with [`Error::InvalidArgument`] if `slug`
/// is malformed, or [`Error::AlreadyExists`] if it collides with an existing
/// organization.
pub fn create_organization(conn: &Connection, name: &str, slug: &str) -> Result<Organization> {
    validate_slug(slug).map_err(Error::InvalidArgument)?;

    let id = OrganizationId::new();
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO organizations (id, slug, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), slug, name, created_at.to_rfc3339()],
    )
    .map_err(|e| map_insert_error(e, slug))?;

    Ok(Organization {
        id,
        slug: slug.to_string(),
        name: name.to_string(),
        created_at,
    })
}

fn map_insert_error(e: rusqlite::Error, slug: &str) -> Error {
    if is_unique_violation(&e) {
        Error::AlreadyExists(format!("organization with slug '{slug}' already exists"))
    } else {
        Error::database(e.to_string())
    }
}

pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code: rusqlite::ErrorCode::ConstraintViolation,
                ..
            },
            _
        )
    )
}

/// Get an organization by slug.
pub fn get_organization_by_slug(conn: &Connection, slug: &str) -> Result<Option<Organization>> {
    let result = conn.query_row(
        "SELECT id, slug, name, created_at FROM organizations WHERE slug = ?1",
        [slug],
        Organization::from_row,
    );
    match result {
        Ok(org) => Ok(Some(org)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// List all organizations ordered by slug.
pub fn list_organizations(conn: &Connection) -> Result<Vec<Organization>> {
    let mut stmt = conn
        .prepare("SELECT id, slug, name, created_at FROM organizations ORDER BY slug")
        .map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], Organization::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Delete an organization by slug (cascades to applications/environments).
pub fn delete_organization(conn: &Connection, slug: &str) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM organizations WHERE slug = ?1", [slug])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;

    #[test]
    fn crud() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let org = create_organization(&conn, "Demo", "demo-org").unwrap();
        assert_eq!(org.slug, "demo-org");

        let found = get_organization_by_slug(&conn, "demo-org").unwrap().unwrap();
        assert_eq!(found.name, "Demo");

        let orgs = list_organizations(&conn).unwrap();
        assert_eq!(orgs.len(), 1);

        assert!(delete_organization(&conn, "demo-org").unwrap());
        assert!(get_organization_by_slug(&conn, "demo-org").unwrap().is_none());
    }

    #[test]
    fn duplicate_slug_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        create_organization(&conn, "Demo", "demo-org").unwrap();
        let err = create_organization(&conn, "Other", "demo-org").unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[test]
    fn malformed_slug_rejected() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let err = create_organization(&conn, "Demo", "Not A Slug!!").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
