use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

use logstore_application::SettingsRepository;
use logstore_core::{AppError, AppResult};
use logstore_domain::SettingsSnapshot;

/// PostgreSQL-backed store configuration.
#[derive(Clone)]
pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct SettingRow {
    name: String,
    value: String,
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn load_snapshot(&self) -> AppResult<SettingsSnapshot> {
        let rows = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT name, value
            FROM logstore_selective_config
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to load log store settings: {error}")))?;

        Ok(SettingsSnapshot::new(
            rows.into_iter()
                .map(|row| (row.name, row.value))
                .collect::<BTreeMap<_, _>>(),
        ))
    }

    async fn save_setting(&self, name: &str, value: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO logstore_selective_config (name, value)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Storage(format!("failed to save log store setting '{name}': {error}"))
        })?;

        Ok(())
    }
}
