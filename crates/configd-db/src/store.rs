//! The `Store`: the single entry point the server talks to for every
//! persistence operation. Wraps the query modules with transactions,
//! blocking-pool offload, and per-environment write serialization.
//!
//! Publishes and rollbacks against the *same* environment must observe each
//! other (exactly one active version, a dense version sequence); different
//! environments must not block one another. SQLite only ever allows one
//! writer process-wide, so a transaction alone would serialize every
//! environment's publishes behind every other's. Instead each environment
//! gets its own `tokio::sync::Mutex`, keyed by its canonical topic string, so
//! unrelated environments proceed concurrently and only genuinely
//! conflicting operations queue.

use std::collections::HashMap;
use std::sync::Arc;

use configd_core::{Error, EnvironmentId, Result, Topic};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::models::{
    Application, ChangeAction, ConfigChange, ConfigVersion, Environment, Organization,
};
use crate::pool::DbPool;
use crate::queries::{applications, config_changes, config_versions, environments, organizations};

/// Persistence façade over the SQLite-backed store.
pub struct Store {
    pool: DbPool,
    env_locks: SyncMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Store {
    pub fn new(pool: DbPool) -> Arc<Self> {
        Arc::new(Self {
            pool,
            env_locks: SyncMutex::new(HashMap::new()),
        })
    }

    fn lock_for(&self, topic: &Topic) -> Arc<AsyncMutex<()>> {
        let key = topic.canonical();
        let mut locks = self.env_locks.lock();
        locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    async fn run_blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&r2d2::PooledConnection<r2d2_sqlite::SqliteConnectionManager>) -> Result<T>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool
                .get()
                .map_err(|e| Error::database(format!("failed to get connection: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| Error::Internal(format!("blocking task panicked: {e}")))?
    }

    // -- organizations ------------------------------------------------

    pub async fn create_organization(&self, name: String, slug: String) -> Result<Organization> {
        self.run_blocking(move |conn| organizations::create_organization(conn, &name, &slug)).await
    }

    pub async fn get_organization(&self, slug: String) -> Result<Option<Organization>> {
        self.run_blocking(move |conn| organizations::get_organization_by_slug(conn, &slug)).await
    }

    pub async fn list_organizations(&self) -> Result<Vec<Organization>> {
        self.run_blocking(|conn| organizations::list_organizations(conn)).await
    }

    pub async fn delete_organization(&self, slug: String) -> Result<bool> {
        self.run_blocking(move |conn| organizations::delete_organization(conn, &slug)).await
    }

    // -- applications ---------------------------------------------------

    pub async fn create_application(
        &self,
        org_slug: String,
        name: String,
        slug: String,
    ) -> Result<Application> {
        self.run_blocking(move |conn| applications::create_application(conn, &org_slug, &name, &slug))
            .await
    }

    pub async fn get_application(&self, org_slug: String, app_slug: String) -> Result<Option<Application>> {
        self.run_blocking(move |conn| applications::get_application_by_slugs(conn, &org_slug, &app_slug))
            .await
    }

    pub async fn list_applications(&self, org_slug: String) -> Result<Vec<Application>> {
        self.run_blocking(move |conn| applications::list_applications(conn, &org_slug)).await
    }

    pub async fn delete_application(&self, org_slug: String, app_slug: String) -> Result<bool> {
        self.run_blocking(move |conn| applications::delete_application(conn, &org_slug, &app_slug))
            .await
    }

    // -- environments -----------------------------------------------------

    pub async fn create_environment(
        &self,
        org_slug: String,
        app_slug: String,
        name: String,
        slug: String,
    ) -> Result<Environment> {
        self.run_blocking(move |conn| {
            environments::create_environment(conn, &org_slug, &app_slug, &name, &slug)
        })
        .await
    }

    pub async fn get_environment(
        &self,
        org_slug: String,
        app_slug: String,
        env_slug: String,
    ) -> Result<Option<Environment>> {
        self.run_blocking(move |conn| {
            environments::get_environment_by_slugs(conn, &org_slug, &app_slug, &env_slug)
        })
        .await
    }

    pub async fn list_environments(&self, org_slug: String, app_slug: String) -> Result<Vec<Environment>> {
        self.run_blocking(move |conn| environments::list_environments(conn, &org_slug, &app_slug)).await
    }

    /// Resolve the (org slug, app slug, env slug) triple for an environment id.
    pub async fn resolve_scope_slugs(&self, env_id: EnvironmentId) -> Result<Option<(String, String, String)>> {
        self.run_blocking(move |conn| environments::get_scope_slugs(conn, env_id)).await
    }

    pub async fn get_environment_by_api_key(
        &self,
        api_key: String,
        env_slug: String,
    ) -> Result<Option<Environment>> {
        self.run_blocking(move |conn| environments::get_environment_by_api_key(conn, &api_key, &env_slug))
            .await
    }

    /// Look up the application that owns an API key.
    pub async fn get_application_by_api_key(&self, api_key: String) -> Result<Option<Application>> {
        self.run_blocking(move |conn| applications::get_application_by_api_key(conn, &api_key)).await
    }

    // -- config reads -----------------------------------------------------

    /// Active config for (org, app, env) slugs. `None` means the scope
    /// exists with nothing published yet, or doesn't exist at all --
    /// callers that need to distinguish those cases should check existence
    /// separately.
    pub async fn get_active_config_by_slugs(
        &self,
        org_slug: String,
        app_slug: String,
        env_slug: String,
    ) -> Result<Option<(EnvironmentId, ConfigVersion)>> {
        self.run_blocking(move |conn| {
            config_versions::get_active_config_by_slugs(conn, &org_slug, &app_slug, &env_slug)
        })
        .await
    }

    pub async fn get_active_config_by_api_key(
        &self,
        api_key: String,
        env_slug: String,
    ) -> Result<Option<(EnvironmentId, ConfigVersion)>> {
        self.run_blocking(move |conn| {
            config_versions::get_active_config_by_api_key(conn, &api_key, &env_slug)
        })
        .await
    }

    // -- publish / rollback ------------------------------------------------

    /// Publish a new config version for the (org, app, env) scope. Fails
    /// with [`Error::NotFound`] if the environment doesn't exist.
    /// Serialized per-environment: concurrent publishes to the same scope
    /// queue, publishes to different scopes run concurrently.
    pub async fn publish_config(
        &self,
        org_slug: String,
        app_slug: String,
        env_slug: String,
        config: serde_json::Value,
        created_by: String,
    ) -> Result<ConfigVersion> {
        let topic = Topic::new(org_slug.clone(), app_slug.clone(), env_slug.clone());
        let lock = self.lock_for(&topic);
        let _guard = lock.lock().await;

        self.run_blocking(move |conn| {
            let tx = conn.unchecked_transaction().map_err(|e| Error::database(e.to_string()))?;

            let env_id = resolve_env_id(&tx, &org_slug, &app_slug, &env_slug)?;
            let previous = config_versions::get_active_version(&tx, env_id)?;

            let version = config_versions::insert_published_version(&tx, env_id, &config, &created_by)?;

            let action = if previous.is_some() { ChangeAction::Update } else { ChangeAction::Create };
            config_changes::insert_change(
                &tx,
                env_id,
                previous.map(|p| p.version),
                version.version,
                action,
                &created_by,
            )?;

            tx.commit().map_err(|e| Error::database(e.to_string()))?;

            Ok(version)
        })
        .await
    }

    /// Roll back the (org, app, env) scope to a previously published
    /// version number. The rollback is recorded as a brand-new version at
    /// the head of the sequence; version numbers never reuse or rewind.
    pub async fn rollback_config(
        &self,
        org_slug: String,
        app_slug: String,
        env_slug: String,
        target_version: i64,
        created_by: String,
    ) -> Result<ConfigVersion> {
        let topic = Topic::new(org_slug.clone(), app_slug.clone(), env_slug.clone());
        let lock = self.lock_for(&topic);
        let _guard = lock.lock().await;

        self.run_blocking(move |conn| {
            let tx = conn.unchecked_transaction().map_err(|e| Error::database(e.to_string()))?;

            let env_id = resolve_env_id(&tx, &org_slug, &app_slug, &env_slug)?;
            let previous = config_versions::get_active_version(&tx, env_id)?;

            let version =
                config_versions::insert_rollback_version(&tx, env_id, target_version, &created_by)?;

            config_changes::insert_change(
                &tx,
                env_id,
                previous.map(|p| p.version),
                version.version,
                ChangeAction::Rollback,
                &created_by,
            )?;

            tx.commit().map_err(|e| Error::database(e.to_string()))?;

            Ok(version)
        })
        .await
    }

    pub async fn list_versions(
        &self,
        org_slug: String,
        app_slug: String,
        env_slug: String,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConfigVersion>> {
        self.run_blocking(move |conn| {
            let env_id = resolve_env_id(conn, &org_slug, &app_slug, &env_slug)?;
            config_versions::list_versions(conn, env_id, limit, offset)
        })
        .await
    }

    pub async fn get_change_history(
        &self,
        org_slug: String,
        app_slug: String,
        env_slug: String,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ConfigChange>> {
        self.run_blocking(move |conn| {
            let env_id = resolve_env_id(conn, &org_slug, &app_slug, &env_slug)?;
            config_changes::list_changes(conn, env_id, limit, offset)
        })
        .await
    }
}

fn resolve_env_id(
    conn: &rusqlite::Connection,
    org_slug: &str,
    app_slug: &str,
    env_slug: &str,
) -> Result<EnvironmentId> {
    environments::get_environment_by_slugs(conn, org_slug, app_slug, env_slug)?
        .map(|e| e.id)
        .ok_or_else(|| Error::not_found("environment", format!("{org_slug}/{app_slug}/{env_slug}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use serde_json::json;

    fn store() -> Arc<Store> {
        Store::new(init_memory_pool().unwrap())
    }

    async fn seed(store: &Store) {
        store.create_organization("Demo".into(), "demo-org".into()).await.unwrap();
        store.create_application("demo-org".into(), "App".into(), "app".into()).await.unwrap();
        store
            .create_environment("demo-org".into(), "app".into(), "Prod".into(), "prod".into())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn publish_then_rollback_round_trip() {
        let store = store();
        seed(&store).await;

        store
            .publish_config("demo-org".into(), "app".into(), "prod".into(), json!({"a": 1}), "alice".into())
            .await
            .unwrap();
        store
            .publish_config("demo-org".into(), "app".into(), "prod".into(), json!({"a": 2}), "alice".into())
            .await
            .unwrap();

        let (_, active) = store
            .get_active_config_by_slugs("demo-org".into(), "app".into(), "prod".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(active.version, 2);

        let rolled = store
            .rollback_config("demo-org".into(), "app".into(), "prod".into(), 1, "bob".into())
            .await
            .unwrap();
        assert_eq!(rolled.version, 3);
        assert_eq!(rolled.config, json!({"a": 1}));

        let history = store
            .get_change_history("demo-org".into(), "app".into(), "prod".into(), 10, 0)
            .await
            .unwrap();
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn publish_to_missing_environment_is_not_found() {
        let store = store();
        let err = store
            .publish_config("ghost".into(), "app".into(), "prod".into(), json!({}), "alice".into())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_publishes_to_same_environment_produce_dense_sequence() {
        let store = store();
        seed(&store).await;

        let mut handles = Vec::new();
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .publish_config(
                        "demo-org".into(),
                        "app".into(),
                        "prod".into(),
                        json!({"i": i}),
                        "alice".into(),
                    )
                    .await
                    .unwrap()
            }));
        }
        let mut versions: Vec<i64> = Vec::new();
        for h in handles {
            versions.push(h.await.unwrap().version);
        }
        versions.sort();
        assert_eq!(versions, (1..=10).collect::<Vec<_>>());

        let all = store
            .list_versions("demo-org".into(), "app".into(), "prod".into(), 20, 0)
            .await
            .unwrap();
        assert_eq!(all.iter().filter(|v| v.is_active).count(), 1);
    }

    #[tokio::test]
    async fn concurrent_publishes_to_different_environments_do_not_block() {
        let store = store();
        seed(&store).await;
        store
            .create_environment("demo-org".into(), "app".into(), "Staging".into(), "staging".into())
            .await
            .unwrap();

        let s1 = store.clone();
        let s2 = store.clone();
        let (a, b) = tokio::join!(
            s1.publish_config("demo-org".into(), "app".into(), "prod".into(), json!({"x": 1}), "a".into()),
            s2.publish_config("demo-org".into(), "app".into(), "staging".into(), json!({"x": 2}), "b".into()),
        );
        assert_eq!(a.unwrap().version, 1);
        assert_eq!(b.unwrap().version, 1);
    }
}
