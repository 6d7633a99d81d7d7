//! PostgreSQL implementation of the key-value backend.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::KeyValueStore;
use crate::config::CartConfig;
use crate::error::CartError;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_store (\
     key TEXT PRIMARY KEY, \
     value TEXT NOT NULL, \
     updated_at TIMESTAMPTZ NOT NULL DEFAULT now())";

/// PostgreSQL-backed [`KeyValueStore`] using `sqlx::PgPool`.
///
/// Values live in a single `kv_store` table keyed by the storage key.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    ///
    /// The `kv_store` table must already exist; see [`Self::ensure_schema`].
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects with the pool settings from `config` and creates the
    /// `kv_store` table if it is missing.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Persistence`] if the database is unreachable
    /// or the table cannot be created.
    pub async fn connect(config: &CartConfig) -> Result<Self, CartError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Creates the `kv_store` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`CartError::Persistence`] on database failure.
    pub async fn ensure_schema(&self) -> Result<(), CartError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for PostgresStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CartError> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CartError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
