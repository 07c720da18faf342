//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for constructing itself from a
//! `rusqlite::Row`.

use chrono::{DateTime, Utc};
use configd_core::{ApplicationId, ConfigChangeId, ConfigVersionId, EnvironmentId, OrganizationId};
use uuid::Uuid;

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    let uuid = Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(T::from(uuid))
}

fn parse_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub id: OrganizationId,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            slug: row.get(1)?,
            name: row.get(2)?,
            created_at: parse_timestamp(row, 3)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: ApplicationId,
    pub org_id: OrganizationId,
    pub slug: String,
    pub name: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

impl Application {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            org_id: parse_id(row, 1)?,
            slug: row.get(2)?,
            name: row.get(3)?,
            api_key: row.get(4)?,
            created_at: parse_timestamp(row, 5)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub id: EnvironmentId,
    pub app_id: ApplicationId,
    pub slug: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Environment {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            app_id: parse_id(row, 1)?,
            slug: row.get(2)?,
            name: row.get(3)?,
            created_at: parse_timestamp(row, 4)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ConfigVersion
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigVersion {
    pub id: ConfigVersionId,
    pub env_id: EnvironmentId,
    pub version: i64,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl ConfigVersion {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let config_text: String = row.get(2)?;
        let config = serde_json::from_str(&config_text).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id: parse_id(row, 0)?,
            env_id: parse_id(row, 1)?,
            config,
            is_active: row.get::<_, i64>(3)? != 0,
            version: row.get(4)?,
            created_at: parse_timestamp(row, 5)?,
            created_by: row.get(6)?,
        })
    }
}

// ---------------------------------------------------------------------------
// ConfigChange
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    Create,
    Update,
    Rollback,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Rollback => "rollback",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(ChangeAction::Create),
            "update" => Some(ChangeAction::Update),
            "rollback" => Some(ChangeAction::Rollback),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    pub id: ConfigChangeId,
    pub env_id: EnvironmentId,
    pub version_from: Option<i64>,
    pub version_to: i64,
    pub action: ChangeAction,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl ConfigChange {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let action_text: String = row.get(4)?;
        let action = ChangeAction::parse(&action_text).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown change action: {action_text}").into(),
            )
        })?;
        Ok(Self {
            id: parse_id(row, 0)?,
            env_id: parse_id(row, 1)?,
            version_from: row.get(2)?,
            version_to: row.get(3)?,
            action,
            created_at: parse_timestamp(row, 5)?,
            created_by: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_action_roundtrip() {
        for action in [ChangeAction::Create, ChangeAction::Update, ChangeAction::Rollback] {
            let s = action.as_str();
            assert_eq!(ChangeAction::parse(s), Some(action));
        }
    }

    #[test]
    fn change_action_rejects_unknown() {
        assert_eq!(ChangeAction::parse("delete"), None);
    }
}
