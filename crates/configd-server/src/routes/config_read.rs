//! Public read paths: fetch the active config for a scope, by slugs or by
//! application API key.
//!
//! Both handlers are read-through: on a cache hit the stored bytes are
//! returned verbatim (no re-serialization); on a miss or cache error they
//! fall through to the store and populate the cache for next time.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use configd_cache::{key_by_api_key, key_by_slugs};
use configd_core::{ConfigResponse, Error};

use crate::context::AppContext;
use crate::error::AppError;

/// GET /config/{org}/{app}/{env}
pub async fn get_config_by_slugs(
    State(ctx): State<AppContext>,
    Path((org, app, env)): Path<(String, String, String)>,
) -> Result<Response, AppError> {
    let key = key_by_slugs(&org, &app, &env);

    let (bytes, hit) = ctx.cache.get(&key).await;
    if hit {
        if let Some(bytes) = bytes {
            return Ok(raw_json_response(bytes));
        }
    }

    let Some((_, version)) = ctx.store.get_active_config_by_slugs(org.clone(), app.clone(), env.clone()).await?
    else {
        return Err(Error::not_found("config", format!("{org}/{app}/{env}")).into());
    };

    let response = ConfigResponse {
        organization: org,
        application: app,
        environment: env,
        version: version.version,
        config: version.config,
        updated_at: version.created_at,
    };
    let bytes = serde_json::to_vec(&response).map_err(|e| Error::Internal(e.to_string()))?;
    ctx.cache.set(&key, bytes.clone()).await;
    Ok(raw_json_response(bytes))
}

/// GET /config/api/{apiKey}/{env}
pub async fn get_config_by_api_key(
    State(ctx): State<AppContext>,
    Path((api_key, env)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let key = key_by_api_key(&api_key, &env);

    let (bytes, hit) = ctx.cache.get(&key).await;
    if hit {
        if let Some(bytes) = bytes {
            return Ok(raw_json_response(bytes));
        }
    }

    let application = ctx
        .store
        .get_application_by_api_key(api_key.clone())
        .await?
        .ok_or_else(|| Error::Unauthorized("unknown api key".into()))?;
    let _ = application;

    let Some((env_id, version)) = ctx.store.get_active_config_by_api_key(api_key.clone(), env.clone()).await?
    else {
        return Err(Error::not_found("config", env.clone()).into());
    };

    let Some((org_slug, app_slug, env_slug)) = ctx.store.resolve_scope_slugs(env_id).await? else {
        return Err(Error::Internal("environment vanished after lookup".into()).into());
    };

    let response = ConfigResponse {
        organization: org_slug,
        application: app_slug,
        environment: env_slug,
        version: version.version,
        config: version.config,
        updated_at: version.created_at,
    };
    let bytes = serde_json::to_vec(&response).map_err(|e| Error::Internal(e.to_string()))?;
    ctx.cache.set(&key, bytes.clone()).await;
    Ok(raw_json_response(bytes))
}

fn raw_json_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], bytes).into_response()
}
