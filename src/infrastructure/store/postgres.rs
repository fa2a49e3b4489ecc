//! PostgreSQL store and repository implementations
//!
//! Records are stored as JSONB documents keyed by id, with expression
//! indexes backing the equality queries. The usage-append transaction takes
//! a row-level lock on the credential (`SELECT ... FOR UPDATE`) so the
//! counter increment and the log insert commit together.

use async_trait::async_trait;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::domain::credential::{CredentialId, CredentialRecord, CredentialRepository};
use crate::domain::usage::{UsageLogEntry, UsageLogRepository};
use crate::domain::DomainError;

/// PostgreSQL store configuration
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/newsflow_gatekeeper".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Handle to a pooled PostgreSQL store with explicit lifecycle
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing connection pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pooled connection to the configured database
    pub async fn connect(config: &PostgresConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e))
            })?;

        Ok(Self::with_pool(pool))
    }

    /// Returns a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensure the tables and indexes exist.
    ///
    /// Usage log rows do not reference the credentials table; the audit
    /// trail must survive credential deletion.
    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                key UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS credentials_secret_digest_idx
                ON credentials ((data->>'secretDigest'))
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS credentials_owner_idx
                ON credentials ((data->>'ownerId'))
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS usage_log (
                key UUID PRIMARY KEY,
                data JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS usage_log_credential_idx
                ON usage_log ((data->>'credentialId'))
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| DomainError::storage(format!("Failed to ensure schema: {}", e)))?;
        }

        Ok(())
    }

    /// Close the pool; in-flight operations finish first
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, DomainError> {
    serde_json::to_value(value)
        .map_err(|e| DomainError::storage(format!("Failed to serialize record: {}", e)))
}

fn deserialize<T: serde::de::DeserializeOwned>(
    data: serde_json::Value,
) -> Result<T, DomainError> {
    serde_json::from_value(data)
        .map_err(|e| DomainError::storage(format!("Failed to deserialize record: {}", e)))
}

/// PostgreSQL implementation of `CredentialRepository`
#[derive(Debug, Clone)]
pub struct PostgresCredentialRepository {
    store: PostgresStore,
}

impl PostgresCredentialRepository {
    pub fn new(store: PostgresStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialRepository for PostgresCredentialRepository {
    async fn get(&self, id: &CredentialId) -> Result<Option<CredentialRecord>, DomainError> {
        let row = sqlx::query("SELECT data FROM credentials WHERE key = $1")
            .bind(id.as_uuid())
            .fetch_optional(self.store.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get credential: {}", e)))?;

        match row {
            Some(row) => Ok(Some(deserialize(row.get("data"))?)),
            None => Ok(None),
        }
    }

    async fn find_by_digest(
        &self,
        digest: &str,
    ) -> Result<Option<CredentialRecord>, DomainError> {
        let row = sqlx::query("SELECT data FROM credentials WHERE data->>'secretDigest' = $1")
            .bind(digest)
            .fetch_optional(self.store.pool())
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to look up digest: {}", e))
            })?;

        match row {
            Some(row) => Ok(Some(deserialize(row.get("data"))?)),
            None => Ok(None),
        }
    }

    async fn create(&self, record: CredentialRecord) -> Result<CredentialRecord, DomainError> {
        let data = serialize(&record)?;

        sqlx::query("INSERT INTO credentials (key, data) VALUES ($1, $2)")
            .bind(record.id().as_uuid())
            .bind(&data)
            .execute(self.store.pool())
            .await
            .map_err(|e| {
                if e.to_string().contains("duplicate key") {
                    DomainError::conflict(format!(
                        "Credential '{}' or its digest already exists",
                        record.id()
                    ))
                } else {
                    DomainError::storage(format!("Failed to create credential: {}", e))
                }
            })?;

        Ok(record)
    }

    async fn update(&self, record: &CredentialRecord) -> Result<CredentialRecord, DomainError> {
        let data = serialize(record)?;

        let result =
            sqlx::query("UPDATE credentials SET data = $2, updated_at = NOW() WHERE key = $1")
                .bind(record.id().as_uuid())
                .bind(&data)
                .execute(self.store.pool())
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to update credential: {}", e))
                })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Credential '{}' not found",
                record.id()
            )));
        }

        Ok(record.clone())
    }

    async fn delete(&self, id: &CredentialId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM credentials WHERE key = $1")
            .bind(id.as_uuid())
            .execute(self.store.pool())
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete credential: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<CredentialRecord>, DomainError> {
        let rows = sqlx::query("SELECT data FROM credentials WHERE data->>'ownerId' = $1")
            .bind(owner_id)
            .fetch_all(self.store.pool())
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to list credentials: {}", e))
            })?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(deserialize(row.get("data"))?);
        }

        Ok(records)
    }
}

/// PostgreSQL implementation of `UsageLogRepository`
#[derive(Debug, Clone)]
pub struct PostgresUsageLogRepository {
    store: PostgresStore,
}

impl PostgresUsageLogRepository {
    pub fn new(store: PostgresStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl UsageLogRepository for PostgresUsageLogRepository {
    async fn append(&self, entry: UsageLogEntry) -> Result<UsageLogEntry, DomainError> {
        let mut tx = self.store.pool().begin().await.map_err(|e| {
            DomainError::transaction(format!("Failed to begin transaction: {}", e))
        })?;

        // Row lock on the credential serializes concurrent appends so no
        // increment is lost.
        let row = sqlx::query("SELECT data FROM credentials WHERE key = $1 FOR UPDATE")
            .bind(entry.credential_id().as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::transaction(format!("Failed to lock credential: {}", e))
            })?;

        let Some(row) = row else {
            // Dropping the transaction rolls it back; neither write lands.
            return Err(DomainError::transaction(format!(
                "Credential '{}' not found",
                entry.credential_id()
            )));
        };

        let mut record: CredentialRecord = deserialize(row.get("data"))?;
        record.apply_usage(entry.timestamp());

        sqlx::query("UPDATE credentials SET data = $2, updated_at = NOW() WHERE key = $1")
            .bind(record.id().as_uuid())
            .bind(serialize(&record)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::transaction(format!("Failed to update counter: {}", e))
            })?;

        sqlx::query("INSERT INTO usage_log (key, data) VALUES ($1, $2)")
            .bind(entry.id().as_uuid())
            .bind(serialize(&entry)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                DomainError::transaction(format!("Failed to insert log entry: {}", e))
            })?;

        tx.commit().await.map_err(|e| {
            DomainError::transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(entry)
    }

    async fn list_for_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<Vec<UsageLogEntry>, DomainError> {
        let rows = sqlx::query("SELECT data FROM usage_log WHERE data->>'credentialId' = $1")
            .bind(credential_id.to_string())
            .fetch_all(self.store.pool())
            .await
            .map_err(|e| {
                DomainError::storage(format!("Failed to list usage entries: {}", e))
            })?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(deserialize(row.get("data"))?);
        }

        Ok(entries)
    }

    async fn count_for_credential(
        &self,
        credential_id: &CredentialId,
    ) -> Result<usize, DomainError> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM usage_log WHERE data->>'credentialId' = $1",
        )
        .bind(credential_id.to_string())
        .fetch_one(self.store.pool())
        .await
        .map_err(|e| DomainError::storage(format!("Failed to count usage entries: {}", e)))?;

        let count: i64 = row.get("count");
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_config_default() {
        let config = PostgresConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.idle_timeout_secs, 600);
    }

    #[test]
    fn test_postgres_config_builder() {
        let config = PostgresConfig::new("postgres://localhost/test")
            .with_max_connections(20)
            .with_min_connections(5)
            .with_connect_timeout(60)
            .with_idle_timeout(300);

        assert_eq!(config.url, "postgres://localhost/test");
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 5);
        assert_eq!(config.connect_timeout_secs, 60);
        assert_eq!(config.idle_timeout_secs, 300);
    }
}
