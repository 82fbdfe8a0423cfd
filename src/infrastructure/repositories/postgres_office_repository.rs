use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::domain::repositories::OfficeRepository;

const SCHEMA: &str = include_str!("../../../migrations/0001_office_snapshots.sql");

/// PostgreSQL implementation of OfficeRepository
///
/// Stores one JSONB document per office key in `office_snapshots`.
pub struct PostgresOfficeRepository {
    pool: PgPool,
    key: String,
}

impl PostgresOfficeRepository {
    /// Creates a new PostgresOfficeRepository
    ///
    /// # Arguments
    /// * `pool` - SQLx connection pool for PostgreSQL
    /// * `key` - Row key, one per office
    pub fn new(pool: PgPool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    /// Creates the snapshot table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), String> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| format!("Failed to create office_snapshots: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl OfficeRepository for PostgresOfficeRepository {
    async fn load(&self) -> Result<Option<Value>, String> {
        let blob = sqlx::query_scalar::<_, Json<Value>>(
            r#"
            SELECT blob FROM office_snapshots WHERE key = $1
            "#,
        )
        .bind(&self.key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| format!("Failed to load office snapshot: {}", e))?;

        Ok(blob.map(|Json(value)| value))
    }

    async fn save(&self, blob: &Value) -> Result<(), String> {
        sqlx::query(
            r#"
            INSERT INTO office_snapshots (key, blob, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET
                blob = EXCLUDED.blob,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&self.key)
        .bind(Json(blob))
        .execute(&self.pool)
        .await
        .map_err(|e| format!("Failed to save office snapshot: {}", e))?;

        Ok(())
    }
}
