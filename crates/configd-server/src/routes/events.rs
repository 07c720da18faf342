//! Server-Sent Events: a long-lived push stream of the current and future
//! config for one (org, app, env) topic.
//!
//! On connect: emit `connected`, then `initial_config` if one exists (if
//! not, the stream stays open and waits -- an `EventSource` reconnect on a
//! 404 would be indistinguishable from "nothing published yet" to most
//! clients, and the latter is the common case for a brand-new environment).
//! Then subscribe to the broker and forward every `config_update`, with a
//! `: heartbeat <timestamp>` comment line on every tick to keep
//! NAT/proxy paths alive.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use chrono::Utc;
use configd_cache::key_by_slugs;
use configd_core::{ConfigResponse, Error, Topic};
use futures_core::Stream;
use serde_json::json;

use crate::context::AppContext;
use crate::error::AppError;

type EventStream = Sse<std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>>;

/// GET /events/{org}/{app}/{env}
pub async fn events_by_slugs(
    State(ctx): State<AppContext>,
    Path((org, app, env)): Path<(String, String, String)>,
) -> Result<EventStream, AppError> {
    if ctx.store.get_environment(org.clone(), app.clone(), env.clone()).await?.is_none() {
        return Err(Error::not_found("environment", format!("{org}/{app}/{env}")).into());
    }
    let topic = Topic::new(org, app, env);
    Ok(build_stream(ctx, topic))
}

/// GET /events/api/{apiKey}/{env}
pub async fn events_by_api_key(
    State(ctx): State<AppContext>,
    Path((api_key, env)): Path<(String, String)>,
) -> Result<EventStream, AppError> {
    ctx.store
        .get_application_by_api_key(api_key.clone())
        .await?
        .ok_or_else(|| Error::Unauthorized("unknown api key".into()))?;

    let environment = ctx
        .store
        .get_environment_by_api_key(api_key, env.clone())
        .await?
        .ok_or_else(|| Error::not_found("environment", env.clone()))?;

    let (org, app, env) = ctx
        .store
        .resolve_scope_slugs(environment.id)
        .await?
        .ok_or_else(|| Error::Internal("environment vanished after lookup".into()))?;

    let topic = Topic::new(org, app, env);
    Ok(build_stream(ctx, topic))
}

fn build_stream(ctx: AppContext, topic: Topic) -> EventStream {
    let heartbeat_interval = ctx.heartbeat_interval();

    let stream = async_stream::stream! {
        let connected = json!({
            "topic": topic.canonical(),
            "server_time": Utc::now().to_rfc3339(),
        });
        yield Ok(Event::default().event("connected").data(connected.to_string()));

        if let Some(initial) = fetch_active(&ctx, &topic).await {
            if let Ok(data) = serde_json::to_string(&initial) {
                yield Ok(Event::default().event("initial_config").data(data));
            }
        }

        let mut subscriber = ctx.broker.subscribe(&topic);
        let mut heartbeat = tokio::time::interval(heartbeat_interval);
        heartbeat.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                message = subscriber.recv() => {
                    match message {
                        Some(update) => {
                            if let Ok(data) = serde_json::to_string(&update) {
                                yield Ok(Event::default().event("config_update").data(data));
                            }
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    yield Ok(Event::default().comment(format!("heartbeat {}", Utc::now().to_rfc3339())));
                }
            }
        }
    };

    Sse::new(Box::pin(stream) as std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>)
}

async fn fetch_active(ctx: &AppContext, topic: &Topic) -> Option<ConfigResponse> {
    let key = key_by_slugs(&topic.org, &topic.app, &topic.env);
    let (bytes, hit) = ctx.cache.get(&key).await;
    if hit {
        if let Some(bytes) = bytes {
            if let Ok(response) = serde_json::from_slice::<ConfigResponse>(&bytes) {
                return Some(response);
            }
        }
    }

    let (_, version) = ctx
        .store
        .get_active_config_by_slugs(topic.org.clone(), topic.app.clone(), topic.env.clone())
        .await
        .ok()??;

    let response = ConfigResponse {
        organization: topic.org.clone(),
        application: topic.app.clone(),
        environment: topic.env.clone(),
        version: version.version,
        config: version.config,
        updated_at: version.created_at,
    };
    if let Ok(bytes) = serde_json::to_vec(&response) {
        ctx.cache.set(&key, bytes).await;
    }
    Some(response)
}
