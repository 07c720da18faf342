//! Core types shared across the configuration-delivery engine: the unified
//! error type, typed entity IDs, environment-driven configuration, and the
//! wire-level documents exchanged between the store, cache, broker, and HTTP
//! layers.

pub mod config;
pub mod error;
pub mod ids;
pub mod model;

pub use config::Config;
pub use error::{Error, Result};
pub use ids::{ApplicationId, ConfigChangeId, ConfigVersionId, EnvironmentId, OrganizationId};
pub use model::{validate_slug, ConfigResponse, DependencyStatus, HealthResponse, Topic};
