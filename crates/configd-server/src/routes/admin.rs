//! Admin surface: organization/application/environment CRUD, and the
//! publish/rollback/history endpoints for configs.
//!
//! Every mutating config endpoint follows the same order: commit to the
//! store (the only step that can fail), then invalidate the cache and
//! notify the broker on a best-effort basis. Cache invalidation targets the
//! exact keys for the scope (by slugs, and by the application's API key)
//! rather than a glob scan -- the store already knows both addressings, so
//! there's no need to pay for a pattern match.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use configd_cache::{key_by_api_key, key_by_slugs};
use configd_core::{ConfigResponse, Error, Topic};
use configd_db::models::{Application, ChangeAction, ConfigChange, ConfigVersion, Environment, Organization};
use serde::{Deserialize, Serialize};

use crate::context::AppContext;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub slug: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Organization> for OrganizationResponse {
    fn from(o: Organization) -> Self {
        Self { slug: o.slug, name: o.name, created_at: o.created_at }
    }
}

pub async fn create_organization(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateOrganization>,
) -> Result<(StatusCode, Json<OrganizationResponse>), AppError> {
    let org = ctx.store.create_organization(body.name, body.slug).await?;
    Ok((StatusCode::CREATED, Json(org.into())))
}

pub async fn get_organization(
    State(ctx): State<AppContext>,
    Path(org_slug): Path<String>,
) -> Result<Json<OrganizationResponse>, AppError> {
    let org = ctx
        .store
        .get_organization(org_slug.clone())
        .await?
        .ok_or_else(|| Error::not_found("organization", org_slug))?;
    Ok(Json(org.into()))
}

pub async fn list_organizations(
    State(ctx): State<AppContext>,
) -> Result<Json<Vec<OrganizationResponse>>, AppError> {
    let orgs = ctx.store.list_organizations().await?;
    Ok(Json(orgs.into_iter().map(Into::into).collect()))
}

pub async fn delete_organization(
    State(ctx): State<AppContext>,
    Path(org_slug): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = ctx.store.delete_organization(org_slug.clone()).await?;
    if !deleted {
        return Err(Error::not_found("organization", org_slug).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateApplication {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub slug: String,
    pub name: String,
    pub api_key: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Application> for ApplicationResponse {
    fn from(a: Application) -> Self {
        Self { slug: a.slug, name: a.name, api_key: a.api_key, created_at: a.created_at }
    }
}

pub async fn create_application(
    State(ctx): State<AppContext>,
    Path(org_slug): Path<String>,
    Json(body): Json<CreateApplication>,
) -> Result<(StatusCode, Json<ApplicationResponse>), AppError> {
    let app = ctx.store.create_application(org_slug, body.name, body.slug).await?;
    Ok((StatusCode::CREATED, Json(app.into())))
}

pub async fn get_application(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug)): Path<(String, String)>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let app = ctx
        .store
        .get_application(org_slug, app_slug.clone())
        .await?
        .ok_or_else(|| Error::not_found("application", app_slug))?;
    Ok(Json(app.into()))
}

pub async fn list_applications(
    State(ctx): State<AppContext>,
    Path(org_slug): Path<String>,
) -> Result<Json<Vec<ApplicationResponse>>, AppError> {
    let apps = ctx.store.list_applications(org_slug).await?;
    Ok(Json(apps.into_iter().map(Into::into).collect()))
}

pub async fn delete_application(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let deleted = ctx.store.delete_application(org_slug, app_slug.clone()).await?;
    if !deleted {
        return Err(Error::not_found("application", app_slug).into());
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct CreateEnvironment {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct EnvironmentResponse {
    pub slug: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<Environment> for EnvironmentResponse {
    fn from(e: Environment) -> Self {
        Self { slug: e.slug, name: e.name, created_at: e.created_at }
    }
}

pub async fn create_environment(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug)): Path<(String, String)>,
    Json(body): Json<CreateEnvironment>,
) -> Result<(StatusCode, Json<EnvironmentResponse>), AppError> {
    let env = ctx.store.create_environment(org_slug, app_slug, body.name, body.slug).await?;
    Ok((StatusCode::CREATED, Json(env.into())))
}

pub async fn get_environment(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug, env_slug)): Path<(String, String, String)>,
) -> Result<Json<EnvironmentResponse>, AppError> {
    let env = ctx
        .store
        .get_environment(org_slug, app_slug, env_slug.clone())
        .await?
        .ok_or_else(|| Error::not_found("environment", env_slug))?;
    Ok(Json(env.into()))
}

pub async fn list_environments(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug)): Path<(String, String)>,
) -> Result<Json<Vec<EnvironmentResponse>>, AppError> {
    let envs = ctx.store.list_environments(org_slug, app_slug).await?;
    Ok(Json(envs.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct PublishConfig {
    pub config: serde_json::Value,
    pub created_by: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigVersionResponse {
    pub version: i64,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub created_by: String,
}

impl From<ConfigVersion> for ConfigVersionResponse {
    fn from(v: ConfigVersion) -> Self {
        Self {
            version: v.version,
            config: v.config,
            is_active: v.is_active,
            created_at: v.created_at,
            created_by: v.created_by,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigChangeResponse {
    pub version_from: Option<i64>,
    pub version_to: i64,
    pub action: &'static str,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub created_by: String,
}

impl From<ConfigChange> for ConfigChangeResponse {
    fn from(c: ConfigChange) -> Self {
        Self {
            version_from: c.version_from,
            version_to: c.version_to,
            action: action_str(c.action),
            created_at: c.created_at,
            created_by: c.created_by,
        }
    }
}

fn action_str(action: ChangeAction) -> &'static str {
    match action {
        ChangeAction::Create => "create",
        ChangeAction::Update => "update",
        ChangeAction::Rollback => "rollback",
    }
}

pub async fn publish_config(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug, env_slug)): Path<(String, String, String)>,
    Json(body): Json<PublishConfig>,
) -> Result<(StatusCode, Json<ConfigVersionResponse>), AppError> {
    let version = ctx
        .store
        .publish_config(org_slug.clone(), app_slug.clone(), env_slug.clone(), body.config, body.created_by)
        .await?;

    announce(&ctx, &org_slug, &app_slug, &env_slug, &version).await;

    Ok((StatusCode::CREATED, Json(version.into())))
}

#[derive(Debug, Deserialize)]
pub struct RollbackConfig {
    pub created_by: String,
}

pub async fn rollback_config(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug, env_slug, target_version)): Path<(String, String, String, i64)>,
    Json(body): Json<RollbackConfig>,
) -> Result<Json<ConfigVersionResponse>, AppError> {
    let version = ctx
        .store
        .rollback_config(org_slug.clone(), app_slug.clone(), env_slug.clone(), target_version, body.created_by)
        .await?;

    announce(&ctx, &org_slug, &app_slug, &env_slug, &version).await;

    Ok(Json(version.into()))
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

pub async fn list_versions(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug, env_slug)): Path<(String, String, String)>,
    axum::extract::Query(Pagination { limit, offset }): axum::extract::Query<Pagination>,
) -> Result<Json<Vec<ConfigVersionResponse>>, AppError> {
    let versions = ctx.store.list_versions(org_slug, app_slug, env_slug, limit, offset).await?;
    Ok(Json(versions.into_iter().map(Into::into).collect()))
}

pub async fn get_history(
    State(ctx): State<AppContext>,
    Path((org_slug, app_slug, env_slug)): Path<(String, String, String)>,
    axum::extract::Query(Pagination { limit, offset }): axum::extract::Query<Pagination>,
) -> Result<Json<Vec<ConfigChangeResponse>>, AppError> {
    let history = ctx.store.get_change_history(org_slug, app_slug, env_slug, limit, offset).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

/// Best-effort cache invalidation and broker fan-out after a write commits.
/// Failures here are logged, never returned to the caller -- the write
/// already succeeded.
async fn announce(
    ctx: &AppContext,
    org_slug: &str,
    app_slug: &str,
    env_slug: &str,
    version: &ConfigVersion,
) {
    ctx.cache.delete(&key_by_slugs(org_slug, app_slug, env_slug)).await;

    if let Ok(Some(app)) = ctx.store.get_application(org_slug.to_string(), app_slug.to_string()).await {
        ctx.cache.delete(&key_by_api_key(&app.api_key, env_slug)).await;
    }

    let response = ConfigResponse {
        organization: org_slug.to_string(),
        application: app_slug.to_string(),
        environment: env_slug.to_string(),
        version: version.version,
        config: version.config.clone(),
        updated_at: version.created_at,
    };
    let topic = Topic::new(org_slug, app_slug, env_slug);
    ctx.broker.publish(&topic, response);
}
