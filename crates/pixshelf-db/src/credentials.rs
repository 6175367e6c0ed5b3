//! Upstream credential persisted in the `app_config` table.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::info;

use pixshelf_core::{defaults, CredentialStore, Error, Result};

/// `CredentialStore` backed by the `app_config` key/value table.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: Pool<Postgres>,
    key: String,
}

impl PgCredentialStore {
    /// Create a store reading the default `upstream_credential` key.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            key: defaults::CREDENTIAL_CONFIG_KEY.to_string(),
        }
    }

    /// Use a different configuration key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn get_credential(&self) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM app_config WHERE key = $1")
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    async fn set_credential(&self, credential: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO app_config (key, value, updated_at) VALUES ($1, $2, NOW())
             ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()",
        )
        .bind(&self.key)
        .bind(credential)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "credentials",
            op = "set",
            key = %self.key,
            "Upstream credential updated"
        );
        Ok(())
    }
}
