//! Unified error type for the configuration delivery engine.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].

use std::fmt;

/// Unified error type covering all failure modes in configd.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "organization", "environment").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// A unique-key collision or a concurrent-update race.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A conflicting concurrent mutation (e.g. single-active invariant race).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed request data: bad JSON, missing field, invalid slug.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The API key presented does not resolve to an application.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A backing dependency (database, cache) is unreachable.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::NotFound { .. } => 404,
            Error::AlreadyExists(_) | Error::Conflict(_) => 409,
            Error::InvalidArgument(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Unavailable(_) => 503,
            Error::Database { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("environment", "prod");
        assert_eq!(err.to_string(), "environment not found: prod");
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn already_exists_status() {
        let err = Error::AlreadyExists("slug taken".into());
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn conflict_status() {
        let err = Error::Conflict("concurrent publish".into());
        assert_eq!(err.http_status(), 409);
    }

    #[test]
    fn invalid_argument_status() {
        let err = Error::InvalidArgument("config must be valid JSON".into());
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn unauthorized_status() {
        let err = Error::Unauthorized("unknown api key".into());
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn unavailable_status() {
        let err = Error::Unavailable("database pool exhausted".into());
        assert_eq!(err.http_status(), 503);
    }

    #[test]
    fn database_status() {
        let err = Error::database("connection refused");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn internal_status() {
        let err = Error::Internal("unreachable state".into());
        assert_eq!(err.http_status(), 500);
    }
}
