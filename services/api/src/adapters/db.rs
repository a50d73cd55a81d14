//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `KeyValueStore` port from the `core` crate. It keeps every record as a
//! row in a single PostgreSQL table using `sqlx`.

use async_trait::async_trait;
use research_copilot_core::ports::{KeyValueStore, PortError, PortResult};
use sqlx::PgPool;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `KeyValueStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `KeyValueStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl KeyValueStore for DbAdapter {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM kv_store WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, updated_at = now()",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
