//! Wire-level types shared between the store, cache, broker, and HTTP layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The canonical document returned by read endpoints and carried in SSE
/// `config_update` events. Field order and naming are wire-exact and must
/// not change without a version bump to every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub organization: String,
    pub application: String,
    pub environment: String,
    pub version: i64,
    pub config: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate liveness/dependency status returned by `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: DependencyStatus,
    pub cache: DependencyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyStatus {
    Ok,
    Down,
}

impl HealthResponse {
    pub fn healthy(&self) -> bool {
        self.database == DependencyStatus::Ok
    }
}

/// Topic triple identifying a (org, app, env) scope for cache keys,
/// broker topics, and SSE subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    pub org: String,
    pub app: String,
    pub env: String,
}

impl Topic {
    pub fn new(org: impl Into<String>, app: impl Into<String>, env: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            app: app.into(),
            env: env.into(),
        }
    }

    /// Canonical string key used to index the broker's subscription map.
    pub fn canonical(&self) -> String {
        format!("{}/{}/{}", self.org, self.app, self.env)
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Validate a slug: lowercase ASCII alphanumerics and hyphens, non-empty,
/// must not start or end with a hyphen.
pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("slug must not be empty".into());
    }
    if slug.len() > 64 {
        return Err("slug must be 64 characters or fewer".into());
    }
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err("slug must contain only lowercase letters, digits, and hyphens".into());
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err("slug must not start or end with a hyphen".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_response_roundtrip() {
        let resp = ConfigResponse {
            organization: "demo-org".into(),
            application: "app".into(),
            environment: "prod".into(),
            version: 1,
            config: serde_json::json!({"feature": true}),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        let back: ConfigResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn topic_canonical_form() {
        let topic = Topic::new("demo-org", "app", "prod");
        assert_eq!(topic.canonical(), "demo-org/app/prod");
    }

    #[test]
    fn valid_slugs() {
        assert!(validate_slug("demo-org").is_ok());
        assert!(validate_slug("a").is_ok());
        assert!(validate_slug("app123").is_ok());
    }

    #[test]
    fn rejects_empty_slug() {
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(validate_slug("Demo-Org").is_err());
    }

    #[test]
    fn rejects_leading_trailing_hyphen() {
        assert!(validate_slug("-demo").is_err());
        assert!(validate_slug("demo-").is_err());
    }

    #[test]
    fn rejects_overlong_slug() {
        let slug = "a".repeat(65);
        assert!(validate_slug(&slug).is_err());
    }

    #[test]
    fn health_response_healthy() {
        let resp = HealthResponse {
            status: "ok",
            database: DependencyStatus::Ok,
            cache: DependencyStatus::Down,
        };
        assert!(resp.healthy());
    }
}
